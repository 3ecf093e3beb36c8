//! Fixed pool of workers draining the request queue.
//!
//! Each worker loops: dequeue, classify, resolve (cache first, upstream on a
//! miss), build the reply and send it once. A panic while handling one
//! request is caught and only that request is lost.

use crate::cache::RecordCache;
use crate::clock::Clock;
use crate::logger::{QueryLogAction, QueryLogEntry, QueryLogger};
use crate::queue::RequestQueue;
use crate::resolver::UpstreamResolver;
use crate::server::types::Request;
use crate::stats::StatsCollector;
use futures::FutureExt;
use hickory_resolver::proto::op::Message;
use hickory_resolver::proto::rr::rdata::{A, AAAA};
use hickory_resolver::proto::rr::{Name, RData, Record, RecordType};
use std::any::Any;
use std::net::IpAddr;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Shared per-request logic; one instance serves every worker task.
pub struct Worker {
    resolver: UpstreamResolver,
    cache: RecordCache,
    clock: Arc<dyn Clock>,
    response_ttl: u32,
    stats: Arc<StatsCollector>,
    logger: Arc<QueryLogger>,
}

struct Lookup {
    addresses: Vec<IpAddr>,
    action: QueryLogAction,
    upstream: Option<String>,
}

impl Worker {
    pub fn new(
        resolver: UpstreamResolver,
        cache: RecordCache,
        clock: Arc<dyn Clock>,
        response_ttl: u32,
        stats: Arc<StatsCollector>,
        logger: Arc<QueryLogger>,
    ) -> Self {
        Self {
            resolver,
            cache,
            clock,
            response_ttl,
            stats,
            logger,
        }
    }

    /// Runs until the queue is shut down.
    pub async fn run(self: Arc<Self>, id: usize, queue: RequestQueue) {
        while let Some(request) = queue.dequeue().await {
            if let Err(panic) = AssertUnwindSafe(self.handle(request)).catch_unwind().await {
                self.stats.inc_worker_panic();
                error!(
                    worker = id,
                    "Request handling panicked: {}",
                    panic_message(panic.as_ref())
                );
            }
        }
        debug!(worker = id, "Worker stopped");
    }

    /// Processes one request. Unsupported query types get no reply at all.
    pub async fn handle(&self, request: Request) {
        let Request {
            reply,
            message,
            query_type,
            received,
        } = request;

        if !matches!(query_type, RecordType::A | RecordType::AAAA) {
            self.stats.inc_unsupported();
            debug!("Dropping unsupported {} query from {}", query_type, reply.peer());
            return;
        }

        let Some(name) = message.queries().first().map(|q| q.name().clone()) else {
            debug!("Dropping request without a question from {}", reply.peer());
            return;
        };
        let domain = name.to_string();

        let lookup = self.lookup(&domain, query_type).await;
        let response = build_reply(message, &name, &lookup.addresses, self.response_ttl);

        match reply.send(&response).await {
            Ok(()) => self.stats.inc_reply_sent(),
            Err(e) => {
                self.stats.inc_reply_failure();
                warn!("Failed to send reply for {} to {}: {}", domain, reply.peer(), e);
            }
        }

        if self.logger.is_enabled() {
            self.logger.log(QueryLogEntry {
                client_ip: reply.peer().ip().to_string(),
                domain,
                query_type: query_type.to_string(),
                action: lookup.action,
                addresses: lookup.addresses.len(),
                upstream: lookup.upstream,
                latency_ms: received.elapsed().as_millis() as u64,
            });
        }
    }

    async fn lookup(&self, domain: &str, record_type: RecordType) -> Lookup {
        let Some(records) = self.cache.for_type(record_type) else {
            return Lookup {
                addresses: Vec::new(),
                action: QueryLogAction::Failed(format!("no cache for {}", record_type)),
                upstream: None,
            };
        };

        let now = self.clock.now_secs();
        if let Some(addresses) = records.read(domain, now).await {
            self.stats.inc_cache_hit();
            return Lookup {
                addresses,
                action: QueryLogAction::Cached,
                upstream: None,
            };
        }
        self.stats.inc_cache_miss();

        match self.resolver.resolve(domain, record_type).await {
            Ok(resolved) => {
                // The reply does not wait for this write to land.
                let records = records.clone();
                let key = domain.to_string();
                let addresses = resolved.addresses.clone();
                let expires_at = now + u64::from(resolved.ttl);
                tokio::spawn(async move {
                    records.write(&key, addresses, expires_at).await;
                });

                Lookup {
                    addresses: resolved.addresses,
                    action: QueryLogAction::Forwarded,
                    upstream: Some(resolved.upstream),
                }
            }
            Err(e) => {
                self.stats.inc_upstream_failure();
                debug!("Resolution of {} {} failed: {}", domain, record_type, e);
                Lookup {
                    addresses: Vec::new(),
                    action: QueryLogAction::Failed(e.to_string()),
                    upstream: None,
                }
            }
        }
    }
}

/// Appends one answer per address to the reply skeleton and sets AA and RA.
pub fn build_reply(mut message: Message, name: &Name, addresses: &[IpAddr], ttl: u32) -> Message {
    message
        .set_authoritative(true)
        .set_recursion_available(true);
    for address in addresses {
        let rdata = match address {
            IpAddr::V4(v4) => RData::A(A(*v4)),
            IpAddr::V6(v6) => RData::AAAA(AAAA(*v6)),
        };
        message.add_answer(Record::from_rdata(name.clone(), ttl, rdata));
    }
    message
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic"
    }
}

/// The set of worker tasks. Sized once, never resized.
pub struct WorkerPool {
    queue: RequestQueue,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn spawn(count: usize, queue: RequestQueue, worker: Arc<Worker>) -> Self {
        let count = count.max(1);
        let handles = (0..count)
            .map(|id| {
                let worker = worker.clone();
                let queue = queue.clone();
                tokio::spawn(worker.run(id, queue))
            })
            .collect();
        info!("Started {} resolver workers", count);
        Self { queue, handles }
    }

    pub fn size(&self) -> usize {
        self.handles.len()
    }

    /// Signals the queue and waits for every worker to exit.
    pub async fn shutdown(self) {
        self.queue.shutdown();
        for handle in self.handles {
            if let Err(e) = handle.await {
                error!("Worker task failed: {}", e);
            }
        }
        info!("All workers stopped");
    }
}
