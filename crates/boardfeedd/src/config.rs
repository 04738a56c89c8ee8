//! Daemon configuration: TOML file, overridden by flags and environment

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use boardfeed_core::retention::{DEFAULT_RETRY_MS, LOG_CAPACITY, RETENTION_TTL};
use boardfeed_core::RetentionPolicy;
use serde::Deserialize;

use crate::Args;

pub const DEFAULT_BIND: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Contents of the `--config` file; every key is optional
#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub bind: Option<String>,
    pub port: Option<u16>,
    pub log_level: Option<String>,
    pub metrics: Option<bool>,
    pub request_timeout_ms: Option<u64>,
    pub redis: RedisSection,
    pub retention: RetentionSection,
}

#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct RedisSection {
    pub dsn: Option<String>,
}

#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct RetentionSection {
    pub capacity: Option<usize>,
    pub ttl_secs: Option<u64>,
    pub retry_ms: Option<u64>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("Invalid config file {}", path.display()))
    }
}

/// Effective settings after merging all sources
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub addr: SocketAddr,
    pub log_level: String,
    pub redis_dsn: String,
    pub metrics: bool,
    pub request_timeout: Duration,
    pub policy: RetentionPolicy,
}

impl Settings {
    /// Flags (and their env fallbacks) win over the file, the file over defaults
    pub fn resolve(args: &Args, file: FileConfig) -> Result<Self> {
        let bind = args.bind.clone().or(file.bind).unwrap_or_else(|| DEFAULT_BIND.to_string());
        let port = args.port.or(file.port).unwrap_or(DEFAULT_PORT);
        let addr: SocketAddr = format!("{}:{}", bind, port)
            .parse()
            .with_context(|| format!("Invalid bind address {}:{}", bind, port))?;

        let capacity = args.capacity.or(file.retention.capacity).unwrap_or(LOG_CAPACITY);
        if capacity == 0 {
            anyhow::bail!("Retention capacity must be at least 1");
        }
        let ttl = args
            .ttl_secs
            .or(file.retention.ttl_secs)
            .map(Duration::from_secs)
            .unwrap_or(RETENTION_TTL);
        if ttl.is_zero() {
            anyhow::bail!("Retention TTL must be at least one second");
        }
        let retry_ms = args.retry_ms.or(file.retention.retry_ms).unwrap_or(DEFAULT_RETRY_MS);

        Ok(Self {
            addr,
            log_level: args
                .log_level
                .clone()
                .or(file.log_level)
                .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
            redis_dsn: args.redis_dsn.clone().or(file.redis.dsn).unwrap_or_default(),
            metrics: !args.no_metrics && file.metrics.unwrap_or(true),
            request_timeout: Duration::from_millis(
                args.request_timeout_ms
                    .or(file.request_timeout_ms)
                    .unwrap_or(boardfeed_transport::http::DEFAULT_READ_TIMEOUT.as_millis() as u64),
            ),
            policy: RetentionPolicy::new(capacity, ttl).with_retry_ms(retry_ms),
        })
    }
}
