use crate::error::EnqueueError;
use crate::queue::RequestQueue;
use crate::server::types::{reply_skeleton, Request, UdpReply};
use crate::stats::StatsCollector;
use hickory_resolver::proto::op::{Message, MessageType};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Largest datagram we accept; EDNS payloads above this are truncated by the kernel.
const MAX_DATAGRAM: usize = 4096;

/// Receives UDP queries and hands them to the worker pool.
///
/// Never waits on resolution: a query either lands in the queue or is
/// dropped on the spot.
pub struct Listener {
    socket: Arc<UdpSocket>,
    queue: RequestQueue,
    stats: Arc<StatsCollector>,
}

impl Listener {
    pub fn new(socket: UdpSocket, queue: RequestQueue, stats: Arc<StatsCollector>) -> Self {
        Self {
            socket: Arc::new(socket),
            queue,
            stats,
        }
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    pub async fn run(self, shutdown: CancellationToken) {
        let mut buf = vec![0u8; MAX_DATAGRAM];
        loop {
            let (len, peer) = tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Listener shutting down");
                    return;
                }
                received = self.socket.recv_from(&mut buf) => match received {
                    Ok(received) => received,
                    Err(e) => {
                        warn!("UDP receive failed: {}", e);
                        continue;
                    }
                },
            };
            self.dispatch(&buf[..len], peer);
        }
    }

    fn dispatch(&self, datagram: &[u8], peer: SocketAddr) {
        let query = match Message::from_vec(datagram) {
            Ok(query) => query,
            Err(e) => {
                debug!("Ignoring malformed query from {}: {}", peer, e);
                return;
            }
        };
        if query.message_type() != MessageType::Query || query.queries().is_empty() {
            debug!("Ignoring non-query message from {}", peer);
            return;
        }

        self.stats.inc_queries();
        let reply = Box::new(UdpReply::new(self.socket.clone(), peer));
        match self.queue.enqueue(Request::new(reply, reply_skeleton(&query))) {
            Ok(()) => {}
            Err(EnqueueError::Full) => {
                self.stats.inc_dropped();
                debug!("Request queue full, dropping query from {}", peer);
            }
            Err(EnqueueError::Closed) => {
                self.stats.inc_dropped();
                debug!("Request queue closed, dropping query from {}", peer);
            }
        }
    }
}
