pub mod single;
pub mod types;

use crate::config::Config;
use crate::error::ResolveError;
use crate::stats::StatsCollector;
use anyhow::{bail, Context, Result};
use hickory_resolver::proto::rr::{RData, RecordType};
use hickory_resolver::proto::xfer::Protocol;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use url::Url;

use self::single::SingleResolver;
pub use self::types::{DnsResolver, Resolved, TtlSelection, Upstream};

/// Turns upstream answers into cacheable address lists.
///
/// Only A and AAAA are implemented. Every other type is rejected before any
/// traffic leaves the process.
#[derive(Clone)]
pub struct UpstreamResolver {
    exchange: Arc<dyn DnsResolver>,
    ttl_selection: TtlSelection,
}

impl UpstreamResolver {
    pub fn new(exchange: Arc<dyn DnsResolver>, ttl_selection: TtlSelection) -> Self {
        Self {
            exchange,
            ttl_selection,
        }
    }

    pub async fn resolve(
        &self,
        domain: &str,
        record_type: RecordType,
    ) -> Result<Resolved, ResolveError> {
        if !matches!(record_type, RecordType::A | RecordType::AAAA) {
            return Err(ResolveError::NotImplemented(record_type));
        }

        let (records, upstream) = self.exchange.resolve(domain, record_type).await?;
        if records.is_empty() {
            return Err(ResolveError::NoRecords(domain.to_string()));
        }

        let mut addresses = Vec::new();
        let mut ttl: Option<u32> = None;
        for record in &records {
            let address = match (record_type, record.data()) {
                (RecordType::A, RData::A(a)) => IpAddr::V4(a.0),
                (RecordType::AAAA, RData::AAAA(aaaa)) => IpAddr::V6(aaaa.0),
                _ => continue,
            };
            addresses.push(address);
            ttl = Some(match self.ttl_selection {
                TtlSelection::Last => record.ttl(),
                TtlSelection::Min => ttl.map_or(record.ttl(), |t| t.min(record.ttl())),
            });
        }

        Ok(Resolved {
            addresses,
            ttl: ttl.unwrap_or(0),
            upstream,
        })
    }
}

/// Builds the resolver for the first configured upstream.
///
/// The remaining entries of `upstream_servers` are not consulted.
pub fn create_resolver(config: &Config, stats: Arc<StatsCollector>) -> Result<UpstreamResolver> {
    let Some(first) = config.upstream_servers.first() else {
        bail!("No upstream servers configured");
    };
    if config.upstream_servers.len() > 1 {
        warn!(
            "Only the first upstream ({}) is consulted; ignoring {} more",
            first,
            config.upstream_servers.len() - 1
        );
    }

    let upstream = create_upstream(first)?;
    let exchange = Arc::new(SingleResolver {
        upstream,
        timeout: Duration::from_millis(config.upstream_timeout_ms),
        stats,
    });
    Ok(UpstreamResolver::new(exchange, config.cache.ttl_selection))
}

fn create_upstream(upstream_url: &str) -> Result<Upstream> {
    let (addr, protocol) = parse_upstream(upstream_url)?;
    info!("Added upstream: {} ({} {:?})", upstream_url, addr, protocol);

    Ok(Upstream {
        url: upstream_url.to_string(),
        addr,
        protocol,
    })
}

/// Accepts `udp://ip[:port]`, `tcp://ip[:port]`, `ip` or `ip:port`.
/// Bare addresses are UDP; the port defaults to 53.
pub fn parse_upstream(upstream: &str) -> Result<(SocketAddr, Protocol)> {
    if let Ok(ip) = upstream.parse::<IpAddr>() {
        return Ok((SocketAddr::new(ip, 53), Protocol::Udp));
    }
    if let Ok(addr) = upstream.parse::<SocketAddr>() {
        return Ok((addr, Protocol::Udp));
    }

    let url = Url::parse(upstream).context("Failed to parse upstream URL")?;
    let protocol = match url.scheme() {
        "udp" => Protocol::Udp,
        "tcp" => Protocol::Tcp,
        other => bail!("Unsupported upstream scheme '{}' in {}", other, upstream),
    };
    let host = url.host_str().context("Upstream URL has no host")?;
    let ip: IpAddr = host
        .trim_start_matches('[')
        .trim_end_matches(']')
        .parse()
        .with_context(|| format!("Upstream host '{}' must be an IP address", host))?;

    Ok((SocketAddr::new(ip, url.port().unwrap_or(53)), protocol))
}
