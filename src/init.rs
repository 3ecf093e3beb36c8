//! Initialization helpers for the application startup.

use crate::cache::{self, RecordCache};
use crate::clock::Clock;
use crate::config::Config;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Sets up the tracing subscriber with the configured filters.
pub fn setup_logging(config: &Config) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let mut filter = config.logging.level.clone();

        // Suppress hickory logs unless explicitly enabled/overridden
        if !filter.contains("hickory_proto") {
            filter.push_str(",hickory_proto=off");
        }
        if !filter.contains("hickory_resolver") {
            filter.push_str(",hickory_resolver=off");
        }

        tracing_subscriber::EnvFilter::new(filter)
    });

    if config.logging.format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }
}

/// Starts the expired-entry reaper when `cache.reap_interval_sec` is set.
pub fn start_cache_reaper(
    config: &Config,
    cache: RecordCache,
    clock: Arc<dyn Clock>,
    shutdown: CancellationToken,
) -> Option<JoinHandle<()>> {
    if config.cache.reap_interval_sec == 0 {
        info!("Cache reaper disabled; expired entries are replaced on the next miss.");
        return None;
    }
    Some(cache::spawn_reaper(
        cache,
        clock,
        Duration::from_secs(config.cache.reap_interval_sec),
        shutdown,
    ))
}
