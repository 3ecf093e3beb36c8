use crate::resolver::TtlSelection;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use tokio::fs;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,

    /// Only the first entry is consulted.
    #[serde(default = "default_upstream_servers")]
    pub upstream_servers: Vec<String>,

    #[serde(default = "default_upstream_timeout_ms")]
    pub upstream_timeout_ms: u64,

    #[serde(default)]
    pub workers: WorkerConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub response: ResponseConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub stats: StatsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WorkerConfig {
    #[serde(default = "default_worker_count")]
    pub count: usize,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    #[serde(default)]
    pub ttl_selection: TtlSelection,
    /// 0 disables the reaper; expired entries then live until overwritten.
    #[serde(default)]
    pub reap_interval_sec: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ResponseConfig {
    /// TTL written on every answer record, independent of the cached TTL.
    #[serde(default = "default_response_ttl")]
    pub ttl: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_enable")]
    pub enable: bool,
    #[serde(default = "default_log_all_queries")]
    pub log_all_queries: bool,
    #[serde(default = "default_log_failures")]
    pub log_failures: bool,
    #[serde(default = "default_log_format")]
    pub format: String,
    #[serde(default = "default_log_level")]
    pub level: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StatsConfig {
    #[serde(default = "default_stats_enable")]
    pub enable: bool,
    #[serde(default = "default_log_interval")]
    pub log_interval_seconds: u64,
}

// Defaults
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8090
}
fn default_upstream_servers() -> Vec<String> {
    ["1.1.1.1", "8.8.8.8", "1.0.0.1", "8.8.4.4"]
        .iter()
        .map(|s| format!("udp://{}:53", s))
        .collect()
}
fn default_upstream_timeout_ms() -> u64 {
    2000
}
fn default_worker_count() -> usize {
    1000
}
fn default_queue_capacity() -> usize {
    1000
}
fn default_response_ttl() -> u32 {
    60
}
fn default_log_enable() -> bool {
    true
}
fn default_log_all_queries() -> bool {
    true
}
fn default_log_failures() -> bool {
    true
}
fn default_log_format() -> String {
    "text".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_stats_enable() -> bool {
    true
}
fn default_log_interval() -> u64 {
    300
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            upstream_servers: default_upstream_servers(),
            upstream_timeout_ms: default_upstream_timeout_ms(),
            workers: WorkerConfig::default(),
            cache: CacheConfig::default(),
            response: ResponseConfig::default(),
            logging: LoggingConfig::default(),
            stats: StatsConfig::default(),
        }
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            count: default_worker_count(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_selection: TtlSelection::default(),
            reap_interval_sec: 0,
        }
    }
}

impl Default for ResponseConfig {
    fn default() -> Self {
        Self {
            ttl: default_response_ttl(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enable: default_log_enable(),
            log_all_queries: default_log_all_queries(),
            log_failures: default_log_failures(),
            format: default_log_format(),
            level: default_log_level(),
        }
    }
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            enable: default_stats_enable(),
            log_interval_seconds: default_log_interval(),
        }
    }
}

impl Config {
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .await
            .context("Failed to read config file")?;
        Self::parse(&contents)
    }

    pub fn parse(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents).context("Failed to parse config TOML")?;
        Ok(config)
    }
}
