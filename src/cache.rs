//! TTL-aware address cache shared by every worker.
//!
//! Entries carry an absolute expiry (seconds since epoch). A read never
//! removes anything: an expired entry stays in the map until the next
//! successful resolution overwrites it, or until the optional reaper runs.

use crate::clock::Clock;
use hickory_resolver::proto::rr::RecordType;
use rustc_hash::FxHashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub addresses: Vec<IpAddr>,
    pub expires_at: u64,
}

/// Domain name -> cached answer set, behind one reader/writer lock.
#[derive(Clone, Default)]
pub struct RecordsList {
    records: Arc<RwLock<FxHashMap<String, CacheEntry>>>,
}

impl RecordsList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached addresses while `now <= expires_at`.
    pub async fn read(&self, domain: &str, now: u64) -> Option<Vec<IpAddr>> {
        let records = self.records.read().await;
        match records.get(domain) {
            Some(entry) if now <= entry.expires_at => Some(entry.addresses.clone()),
            _ => None,
        }
    }

    /// Inserts or overwrites the entry for `domain`. Last write wins.
    pub async fn write(&self, domain: &str, addresses: Vec<IpAddr>, expires_at: u64) {
        let mut records = self.records.write().await;
        records.insert(
            domain.to_string(),
            CacheEntry {
                addresses,
                expires_at,
            },
        );
    }

    /// Drops every entry that expired before `now`.
    pub async fn purge_expired(&self, now: u64) -> usize {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|_, entry| now <= entry.expires_at);
        before - records.len()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

/// One `RecordsList` per supported record type.
#[derive(Clone, Default)]
pub struct RecordCache {
    a: RecordsList,
    aaaa: RecordsList,
}

impl RecordCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_type(&self, record_type: RecordType) -> Option<&RecordsList> {
        match record_type {
            RecordType::A => Some(&self.a),
            RecordType::AAAA => Some(&self.aaaa),
            _ => None,
        }
    }

    pub fn a(&self) -> &RecordsList {
        &self.a
    }

    pub fn aaaa(&self) -> &RecordsList {
        &self.aaaa
    }

    pub async fn purge_expired(&self, now: u64) -> usize {
        self.a.purge_expired(now).await + self.aaaa.purge_expired(now).await
    }
}

/// Periodically purges expired entries until `shutdown` fires.
pub fn spawn_reaper(
    cache: RecordCache,
    clock: Arc<dyn Clock>,
    interval: Duration,
    shutdown: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        info!("Starting cache reaper every {:?}", interval);
        let mut ticker = tokio::time::interval(interval);
        // The first tick completes immediately
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    debug!("Cache reaper shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    let removed = cache.purge_expired(clock.now_secs()).await;
                    if removed > 0 {
                        info!(entries_removed = removed, "Cache reap cycle completed");
                    }
                }
            }
        }
    })
}
