use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::time::{self, Duration};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Lock-free pipeline counters.
#[derive(Debug)]
pub struct StatsCollector {
    total_queries: AtomicU64,
    dropped_queries: AtomicU64,
    unsupported_queries: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    upstream_failures: AtomicU64,
    replies_sent: AtomicU64,
    reply_failures: AtomicU64,
    worker_panics: AtomicU64,

    upstream_total_ms: AtomicU64,
    upstream_count: AtomicU64,

    log_interval: Duration,
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub total_queries: u64,
    pub dropped_queries: u64,
    pub unsupported_queries: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub upstream_failures: u64,
    pub replies_sent: u64,
    pub reply_failures: u64,
    pub worker_panics: u64,
    pub upstream_queries: u64,
}

impl StatsCollector {
    pub fn new(log_interval_sec: u64) -> Arc<Self> {
        Arc::new(Self {
            total_queries: AtomicU64::new(0),
            dropped_queries: AtomicU64::new(0),
            unsupported_queries: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            cache_misses: AtomicU64::new(0),
            upstream_failures: AtomicU64::new(0),
            replies_sent: AtomicU64::new(0),
            reply_failures: AtomicU64::new(0),
            worker_panics: AtomicU64::new(0),
            upstream_total_ms: AtomicU64::new(0),
            upstream_count: AtomicU64::new(0),
            log_interval: Duration::from_secs(log_interval_sec.max(1)),
        })
    }

    /// Spawns the periodic dumper; it stops when `shutdown` fires.
    pub fn start_logger(self: &Arc<Self>, shutdown: CancellationToken) {
        let stats = self.clone();
        tokio::spawn(async move {
            let mut interval = time::interval(stats.log_interval);
            // The first tick completes immediately
            interval.tick().await;
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = interval.tick() => stats.dump_stats(),
                }
            }
        });
    }

    pub fn inc_queries(&self) {
        self.total_queries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_dropped(&self) {
        self.dropped_queries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_unsupported(&self) {
        self.unsupported_queries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_upstream_failure(&self) {
        self.upstream_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_reply_sent(&self) {
        self.replies_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_reply_failure(&self) {
        self.reply_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_worker_panic(&self) {
        self.worker_panics.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_upstream_latency(&self, ms: u64) {
        self.upstream_total_ms.fetch_add(ms, Ordering::Relaxed);
        self.upstream_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            total_queries: self.total_queries.load(Ordering::Relaxed),
            dropped_queries: self.dropped_queries.load(Ordering::Relaxed),
            unsupported_queries: self.unsupported_queries.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            upstream_failures: self.upstream_failures.load(Ordering::Relaxed),
            replies_sent: self.replies_sent.load(Ordering::Relaxed),
            reply_failures: self.reply_failures.load(Ordering::Relaxed),
            worker_panics: self.worker_panics.load(Ordering::Relaxed),
            upstream_queries: self.upstream_count.load(Ordering::Relaxed),
        }
    }

    fn dump_stats(&self) {
        let s = self.snapshot();
        let resolved = s.cache_hits + s.cache_misses;
        let upstream_avg = if s.upstream_queries > 0 {
            self.upstream_total_ms.load(Ordering::Relaxed) as f64 / s.upstream_queries as f64
        } else {
            0.0
        };

        info!(
            "STATS DUMP: Total: {}, Dropped: {}, Unsupported: {}, CacheHits: {} ({:.1}%), UpstreamFailures: {}, Replies: {} (failed {}), Panics: {}, Upstream avg: {:.1}ms",
            s.total_queries,
            s.dropped_queries,
            s.unsupported_queries,
            s.cache_hits,
            if resolved > 0 {
                (s.cache_hits as f64 / resolved as f64) * 100.0
            } else {
                0.0
            },
            s.upstream_failures,
            s.replies_sent,
            s.reply_failures,
            s.worker_panics,
            upstream_avg
        );
    }
}
