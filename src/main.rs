use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::info;

use relay_dns::cache::RecordCache;
use relay_dns::clock::{Clock, SystemClock};
use relay_dns::config::Config;
use relay_dns::init::{setup_logging, start_cache_reaper};
use relay_dns::logger::QueryLogger;
use relay_dns::queue::RequestQueue;
use relay_dns::resolver::create_resolver;
use relay_dns::server::{Listener, Worker, WorkerPool};
use relay_dns::stats::StatsCollector;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Load Config
    let config_path = std::env::args().nth(1).unwrap_or("config.toml".to_string());
    let config_exists = std::path::Path::new(&config_path).exists();
    let config = if config_exists {
        Config::load(&config_path).await?
    } else {
        Config::default()
    };

    // 2. Setup Logging
    setup_logging(&config);
    info!("Starting relay-dns...");
    if !config_exists {
        info!("Config file not found, using defaults.");
    }

    let shutdown = CancellationToken::new();

    // 3. Init Stats & Query Log
    let stats = StatsCollector::new(config.stats.log_interval_seconds);
    if config.stats.enable {
        stats.start_logger(shutdown.clone());
    }
    let logger = QueryLogger::new(config.logging.clone());

    // 4. Init Upstream Resolver
    let resolver = create_resolver(&config, stats.clone())?;

    // 5. Init Cache
    let cache = RecordCache::new();
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let _reaper = start_cache_reaper(&config, cache.clone(), clock.clone(), shutdown.clone());

    // 6. Start Workers
    let queue = RequestQueue::with_cancellation(config.workers.queue_capacity, shutdown.clone());
    let worker = Arc::new(Worker::new(
        resolver,
        cache,
        clock,
        config.response.ttl,
        stats.clone(),
        logger,
    ));
    let pool = WorkerPool::spawn(config.workers.count, queue.clone(), worker);

    // 7. Bind Listener
    let host = config
        .host
        .parse()
        .with_context(|| format!("Invalid listen host '{}'", config.host))?;
    let addr = SocketAddr::new(host, config.port);
    let socket = UdpSocket::bind(addr)
        .await
        .with_context(|| format!("Failed to bind UDP listener on {}", addr))?;
    let listener = Listener::new(socket, queue, stats);
    info!(
        "DNS Server listening on {} ({} workers, queue capacity {})",
        addr,
        pool.size(),
        config.workers.queue_capacity
    );

    // 8. Serve until Ctrl-C
    tokio::select! {
        _ = listener.run(shutdown.clone()) => {},
        _ = signal::ctrl_c() => {
            info!("Shutdown signal received.");
        }
    }

    shutdown.cancel();
    pool.shutdown().await;

    Ok(())
}
