//! One question to one upstream over the wire, no local shortcuts.
//!
//! UDP messages are sent as-is; TCP messages carry the two-byte length
//! prefix of RFC 1035 §4.2.2. Nothing is answered from the hosts file or
//! special-use name tables, and CNAME targets are not chased.

use super::types::{DnsResolver, Upstream};
use crate::error::ResolveError;
use crate::stats::StatsCollector;
use hickory_resolver::proto::op::{Message, MessageType, OpCode, Query};
use hickory_resolver::proto::rr::{Name, Record, RecordType};
use hickory_resolver::proto::xfer::Protocol;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, UdpSocket};
use tokio::time::Instant;
use tracing::{debug, error, warn};

/// Maximum UDP DNS response size with EDNS(0)
const MAX_UDP_RESPONSE_SIZE: usize = 4096;

pub struct SingleResolver {
    pub(crate) upstream: Upstream,
    pub(crate) timeout: Duration,
    pub(crate) stats: Arc<StatsCollector>,
}

impl SingleResolver {
    async fn exchange(&self, query: &Message) -> Result<Message, ResolveError> {
        let bytes = query
            .to_vec()
            .map_err(|e| ResolveError::Transport(format!("failed to encode query: {}", e)))?;

        let response = match self.upstream.protocol {
            Protocol::Tcp => exchange_tcp(self.upstream.addr, &bytes, self.timeout).await?,
            _ => exchange_udp(self.upstream.addr, &bytes, query.id(), self.timeout).await?,
        };

        let message = Message::from_vec(&response)
            .map_err(|e| ResolveError::Transport(format!("malformed reply: {}", e)))?;
        if message.id() != query.id() {
            return Err(ResolveError::Transport(format!(
                "reply id {} does not match query id {}",
                message.id(),
                query.id()
            )));
        }
        Ok(message)
    }
}

#[async_trait::async_trait]
impl DnsResolver for SingleResolver {
    async fn resolve(
        &self,
        name: &str,
        query_type: RecordType,
    ) -> Result<(Vec<Record>, String), ResolveError> {
        let name = Name::from_ascii(name)
            .map_err(|e| ResolveError::Transport(format!("invalid name {}: {}", name, e)))?;
        let query = build_query(name.clone(), query_type);

        let start = Instant::now();
        let result = self.exchange(&query).await;
        self.stats
            .record_upstream_latency(start.elapsed().as_millis() as u64);

        match result {
            Ok(response) => {
                debug!(
                    "Upstream {} answered {} {} with {} records ({})",
                    self.upstream.url,
                    name,
                    query_type,
                    response.answers().len(),
                    response.response_code()
                );
                Ok((response.answers().to_vec(), self.upstream.url.clone()))
            }
            Err(e) => {
                error!("Upstream {} failed for {}: {}", self.upstream.url, name, e);
                Err(e)
            }
        }
    }
}

/// A recursion-desired query with a random id and a single question.
pub fn build_query(name: Name, query_type: RecordType) -> Message {
    let mut message = Message::new();
    message
        .set_id(fastrand::u16(..))
        .set_message_type(MessageType::Query)
        .set_op_code(OpCode::Query)
        .set_recursion_desired(true);
    message.add_query(Query::query(name, query_type));
    message
}

async fn exchange_udp(
    server: SocketAddr,
    bytes: &[u8],
    id: u16,
    timeout: Duration,
) -> Result<Vec<u8>, ResolveError> {
    // Bind to ephemeral port (0 = OS assigns)
    let bind_addr: SocketAddr = if server.is_ipv4() {
        SocketAddr::from(([0, 0, 0, 0], 0))
    } else {
        SocketAddr::from(([0u16; 8], 0))
    };
    let socket = UdpSocket::bind(bind_addr)
        .await
        .map_err(|e| ResolveError::Transport(format!("failed to bind UDP socket: {}", e)))?;

    socket
        .send_to(bytes, server)
        .await
        .map_err(|e| ResolveError::Transport(format!("failed to send to {}: {}", server, e)))?;

    let deadline = Instant::now() + timeout;
    let mut buf = vec![0u8; MAX_UDP_RESPONSE_SIZE];
    loop {
        let (len, from) = tokio::time::timeout_at(deadline, socket.recv_from(&mut buf))
            .await
            .map_err(|_| ResolveError::Transport(format!("request to {} timed out", server)))?
            .map_err(|e| {
                ResolveError::Transport(format!("failed to receive from {}: {}", server, e))
            })?;

        // Validate response came from expected server
        if from != server {
            warn!(expected = %server, received_from = %from, "UDP reply from unexpected source");
            continue;
        }
        if len < 2 || u16::from_be_bytes([buf[0], buf[1]]) != id {
            debug!(server = %server, "Ignoring UDP reply with mismatched id");
            continue;
        }
        buf.truncate(len);
        return Ok(buf);
    }
}

async fn exchange_tcp(
    server: SocketAddr,
    bytes: &[u8],
    timeout: Duration,
) -> Result<Vec<u8>, ResolveError> {
    let exchange = async {
        let mut stream = TcpStream::connect(server).await?;
        let len = u16::try_from(bytes.len())
            .map_err(|_| std::io::Error::other("query larger than 65535 bytes"))?;
        stream.write_all(&len.to_be_bytes()).await?;
        stream.write_all(bytes).await?;

        let mut prefix = [0u8; 2];
        stream.read_exact(&mut prefix).await?;
        let mut response = vec![0u8; u16::from_be_bytes(prefix) as usize];
        stream.read_exact(&mut response).await?;
        Ok::<_, std::io::Error>(response)
    };

    tokio::time::timeout(timeout, exchange)
        .await
        .map_err(|_| ResolveError::Transport(format!("request to {} timed out", server)))?
        .map_err(|e| ResolveError::Transport(format!("TCP exchange with {} failed: {}", server, e)))
}
