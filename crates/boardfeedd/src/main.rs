//! boardfeed daemon (boardfeedd)
//!
//! Serves board update polls over HTTP from the Redis instance the
//! application publishes into.
//!
//! # Usage
//!
//! ```bash
//! # Local Redis, defaults (HTTP on 8080)
//! boardfeedd --redis-dsn redis://127.0.0.1:6379
//!
//! # Unix socket, database 2
//! boardfeedd --redis-dsn "unix:///run/redis/redis.sock?db=2"
//!
//! # Shorter history, faster polling hint
//! boardfeedd --capacity 50 --retry-ms 1000
//!
//! # With configuration file
//! boardfeedd --config /etc/boardfeed/boardfeed.toml
//! ```

mod config;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use boardfeed_core::UpdateHub;
use boardfeed_storage::dsn::anonymise;
use boardfeed_storage::{ConnectionManager, RedisConnector};
use boardfeed_transport::{HttpServer, Metrics, RequestHandler};

use crate::config::{FileConfig, Settings};

/// boardfeed daemon - realtime board updates over HTTP polling
#[derive(Parser, Debug)]
#[command(name = "boardfeedd")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Bind address [default: 0.0.0.0]
    #[arg(long, env = "BOARDFEED_BIND")]
    pub bind: Option<String>,

    /// HTTP port to listen on [default: 8080]
    #[arg(long, env = "BOARDFEED_PORT")]
    pub port: Option<u16>,

    /// Configuration file path
    #[arg(short, long, env = "BOARDFEED_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error) [default: info]
    #[arg(long, env = "BOARDFEED_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Redis DSN; empty disables realtime updates
    #[arg(long, env = "BOARDFEED_REDIS_DSN")]
    pub redis_dsn: Option<String>,

    /// Envelopes kept per board [default: 200]
    #[arg(long, env = "BOARDFEED_CAPACITY")]
    pub capacity: Option<usize>,

    /// Seconds of inactivity before a board's history expires [default: 43200]
    #[arg(long, env = "BOARDFEED_TTL_SECS")]
    pub ttl_secs: Option<u64>,

    /// Poll interval hint returned to clients [default: 3000]
    #[arg(long, env = "BOARDFEED_RETRY_MS")]
    pub retry_ms: Option<u64>,

    /// Time a client gets to send its request [default: 5000]
    #[arg(long, env = "BOARDFEED_REQUEST_TIMEOUT_MS")]
    pub request_timeout_ms: Option<u64>,

    /// Do not serve /metrics
    #[arg(long)]
    pub no_metrics: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let file = match &args.config {
        Some(path) => FileConfig::load(path)?,
        None => FileConfig::default(),
    };
    let settings = Settings::resolve(&args, file)?;

    // Initialize logging
    let level = match settings.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    if let Some(path) = &args.config {
        info!(path = %path.display(), "Loaded configuration file");
    }

    // The handshake happens on first use; a bad DSN is an operator error
    let connector = RedisConnector::from_dsn(&settings.redis_dsn)
        .with_context(|| format!("Invalid Redis DSN {}", anonymise(&settings.redis_dsn)))?;
    let connect_timeout = connector.connect_timeout();
    let mut connection = ConnectionManager::new(connector);
    if let Some(timeout) = connect_timeout {
        connection = connection.with_connect_timeout(timeout);
    }
    let connection = Arc::new(connection);

    let hub = UpdateHub::new(connection.clone(), settings.policy);

    let mut handler = RequestHandler::new(hub);
    if settings.metrics {
        let metrics = Arc::new(Metrics::new().context("Failed to register metrics")?);
        handler = handler.with_metrics(metrics);
    }

    info!(
        addr = %settings.addr,
        redis = %anonymise(&settings.redis_dsn),
        capacity = settings.policy.capacity,
        ttl_secs = settings.policy.ttl.as_secs(),
        retry_ms = settings.policy.retry_ms,
        metrics = settings.metrics,
        "Starting boardfeed daemon"
    );

    let server = HttpServer::new(Arc::new(handler), settings.addr).with_read_timeout(settings.request_timeout);

    tokio::select! {
        result = server.run() => {
            result.context("HTTP server stopped")?;
        }
        signal = tokio::signal::ctrl_c() => {
            signal?;
            info!(backend = %connection.state(), "Shutting down...");
        }
    }

    Ok(())
}
