pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod init;
pub mod logger;
pub mod queue;
pub mod resolver;
pub mod server;
pub mod stats;
