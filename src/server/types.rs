use hickory_resolver::proto::op::{Message, MessageType};
use hickory_resolver::proto::rr::RecordType;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::UdpSocket;

/// Transport handle that carries the single reply for one query.
#[async_trait::async_trait]
pub trait ReplyHandle: Send + Sync {
    fn peer(&self) -> SocketAddr;

    async fn send(&self, message: &Message) -> io::Result<()>;
}

/// Replies to a UDP client through the socket the query arrived on.
pub struct UdpReply {
    socket: Arc<UdpSocket>,
    peer: SocketAddr,
}

impl UdpReply {
    pub fn new(socket: Arc<UdpSocket>, peer: SocketAddr) -> Self {
        Self { socket, peer }
    }
}

#[async_trait::async_trait]
impl ReplyHandle for UdpReply {
    fn peer(&self) -> SocketAddr {
        self.peer
    }

    async fn send(&self, message: &Message) -> io::Result<()> {
        let bytes = message.to_vec().map_err(io::Error::other)?;
        self.socket.send_to(&bytes, self.peer).await?;
        Ok(())
    }
}

/// A pending query: consumed exactly once by exactly one worker.
pub struct Request {
    pub reply: Box<dyn ReplyHandle>,
    /// Reply skeleton for the original query, awaiting answers.
    pub message: Message,
    pub query_type: RecordType,
    pub received: Instant,
}

impl Request {
    /// Builds a request from a reply skeleton. The query type is taken from
    /// the first question; a skeleton without one yields `RecordType::Unknown(0)`.
    pub fn new(reply: Box<dyn ReplyHandle>, message: Message) -> Self {
        let query_type = message
            .queries()
            .first()
            .map(|q| q.query_type())
            .unwrap_or(RecordType::Unknown(0));
        Self {
            reply,
            message,
            query_type,
            received: Instant::now(),
        }
    }
}

/// Builds a reply skeleton for `query`: same id, opcode, flags and question.
pub fn reply_skeleton(query: &Message) -> Message {
    let mut reply = Message::new();
    reply
        .set_id(query.id())
        .set_message_type(MessageType::Response)
        .set_op_code(query.op_code())
        .set_recursion_desired(query.recursion_desired())
        .set_checking_disabled(query.checking_disabled());
    reply.add_queries(query.queries().to_vec());
    reply
}
