use crate::error::ResolveError;
use hickory_resolver::proto::rr::{Record, RecordType};
use hickory_resolver::proto::xfer::Protocol;
use std::net::{IpAddr, SocketAddr};

/// One question, one upstream, one answer.
///
/// Returns the answer records together with the name of the upstream that
/// produced them. An upstream that answers without records yields an empty
/// list rather than an error.
#[async_trait::async_trait]
pub trait DnsResolver: Send + Sync {
    async fn resolve(
        &self,
        name: &str,
        query_type: RecordType,
    ) -> Result<(Vec<Record>, String), ResolveError>;
}

/// Where single-shot queries are sent, as configured and as parsed.
#[derive(Debug, Clone)]
pub struct Upstream {
    pub url: String,
    pub addr: SocketAddr,
    pub protocol: Protocol,
}

/// Addresses extracted from an upstream answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub addresses: Vec<IpAddr>,
    pub ttl: u32,
    pub upstream: String,
}

/// Which record's TTL decides how long an answer stays cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TtlSelection {
    /// TTL of the last matching answer record.
    #[default]
    Last,
    /// Smallest TTL across matching answer records.
    Min,
}
