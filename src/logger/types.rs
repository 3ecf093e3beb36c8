#[derive(Debug, Clone)]
pub struct QueryLogEntry {
    pub client_ip: String,
    pub domain: String,
    pub query_type: String,
    pub action: QueryLogAction,
    pub addresses: usize,
    pub upstream: Option<String>,
    pub latency_ms: u64,
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub enum QueryLogAction {
    Cached,
    Forwarded,
    /// Upstream failed; the client got an answer-less reply.
    Failed(String),
}

pub trait QueryLogSink: Send + Sync {
    fn log(&self, entry: &QueryLogEntry);
}
