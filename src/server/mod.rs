//! Request-processing pipeline: UDP listener in front, worker pool behind.

pub mod listener;
pub mod types;
pub mod worker;

pub use self::listener::Listener;
pub use self::types::{reply_skeleton, ReplyHandle, Request, UdpReply};
pub use self::worker::{build_reply, Worker, WorkerPool};
