use crate::config::LoggingConfig;
use crate::logger::types::{QueryLogAction, QueryLogEntry, QueryLogSink};
use tracing::info;

pub struct ConsoleLogSink {
    config: LoggingConfig,
}

impl ConsoleLogSink {
    pub fn new(config: LoggingConfig) -> Self {
        Self { config }
    }

    fn should_log(&self, action: &QueryLogAction) -> bool {
        if !self.config.enable {
            return false;
        }
        match action {
            QueryLogAction::Failed(_) => self.config.log_failures || self.config.log_all_queries,
            _ => self.config.log_all_queries,
        }
    }
}

impl QueryLogSink for ConsoleLogSink {
    fn log(&self, entry: &QueryLogEntry) {
        if !self.should_log(&entry.action) {
            return;
        }

        if self.config.format == "json" {
            info!(
                target: "dns_query",
                client = %entry.client_ip,
                domain = %entry.domain,
                r#type = %entry.query_type,
                action = ?entry.action,
                answers = entry.addresses,
                upstream = ?entry.upstream,
                lat = %entry.latency_ms
            );
        } else {
            let action_str = match &entry.action {
                QueryLogAction::Cached => "fetched from cache".to_string(),
                QueryLogAction::Forwarded => match entry.upstream {
                    Some(ref up) => format!("fetched from upstream {}", up),
                    None => "fetched from upstream".to_string(),
                },
                QueryLogAction::Failed(reason) => format!("upstream failed: {}", reason),
            };

            info!(
                "[{}] {} {} -> {} ({} answers) [{}ms]",
                entry.query_type,
                entry.client_ip,
                entry.domain,
                action_str,
                entry.addresses,
                entry.latency_ms
            );
        }
    }
}
