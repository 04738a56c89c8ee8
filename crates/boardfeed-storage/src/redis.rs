//! Redis backend

use crate::connection::Connector;
use crate::dsn::{anonymise, ConnectionTarget, Dsn};
use crate::{Backend, StorageError};
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{ConnectionAddr, ConnectionInfo, FromRedisValue, RedisConnectionInfo};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Default bound on a single command round trip
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(1);

/// Redis backend
///
/// Shares one multiplexed connection between all callers. Every command is
/// bounded by the operation timeout so a stalled server degrades a single
/// call instead of blocking the caller. A dropped connection is discarded
/// and reopened by the next command.
pub struct RedisBackend {
    client: redis::Client,
    conn: Mutex<Option<MultiplexedConnection>>,
    op_timeout: Duration,
}

impl RedisBackend {
    pub fn new(client: redis::Client, conn: MultiplexedConnection, op_timeout: Duration) -> Self {
        Self {
            client,
            conn: Mutex::new(Some(conn)),
            op_timeout,
        }
    }

    async fn connection(&self) -> Result<MultiplexedConnection, StorageError> {
        let mut slot = self.conn.lock().await;
        if let Some(conn) = slot.as_ref() {
            return Ok(conn.clone());
        }

        let conn = tokio::time::timeout(self.op_timeout, self.client.get_multiplexed_async_connection())
            .await
            .map_err(|_| StorageError::Timeout(self.op_timeout))?
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        debug!("Reopened Redis connection");
        *slot = Some(conn.clone());
        Ok(conn)
    }

    async fn discard_connection(&self) {
        self.conn.lock().await.take();
    }

    async fn run<T: FromRedisValue>(&self, cmd: &redis::Cmd) -> Result<T, StorageError> {
        let mut conn = self.connection().await?;
        match tokio::time::timeout(self.op_timeout, cmd.query_async::<_, T>(&mut conn)).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) if e.is_io_error() || e.is_connection_dropped() => {
                warn!(error = %e, "Redis connection lost, reconnecting on next command");
                self.discard_connection().await;
                Err(StorageError::Connection(e.to_string()))
            }
            Ok(Err(e)) => Err(StorageError::Operation(e.to_string())),
            Err(_) => Err(StorageError::Timeout(self.op_timeout)),
        }
    }
}

#[async_trait]
impl Backend for RedisBackend {
    async fn ping(&self) -> Result<(), StorageError> {
        let reply: String = self.run(&redis::cmd("PING")).await?;
        debug!(reply = %reply, "PING");
        Ok(())
    }

    async fn incr(&self, key: &str) -> Result<u64, StorageError> {
        self.run(redis::cmd("INCR").arg(key)).await
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.run(redis::cmd("GET").arg(key)).await
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StorageError> {
        self.run(redis::cmd("SET").arg(key).arg(value).arg("EX").arg(ttl_secs(ttl)))
            .await
    }

    async fn rpush(&self, key: &str, value: &str) -> Result<usize, StorageError> {
        self.run(redis::cmd("RPUSH").arg(key).arg(value)).await
    }

    async fn ltrim(&self, key: &str, start: isize, stop: isize) -> Result<(), StorageError> {
        self.run(redis::cmd("LTRIM").arg(key).arg(start).arg(stop)).await
    }

    async fn lrange(&self, key: &str, start: isize, stop: isize) -> Result<Vec<String>, StorageError> {
        self.run(redis::cmd("LRANGE").arg(key).arg(start).arg(stop)).await
    }

    async fn llen(&self, key: &str) -> Result<usize, StorageError> {
        self.run(redis::cmd("LLEN").arg(key)).await
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, StorageError> {
        self.run(redis::cmd("EXPIRE").arg(key).arg(ttl_secs(ttl))).await
    }
}

/// Redis expiries are whole seconds; never round a live TTL down to zero
fn ttl_secs(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}

/// Opens a [`RedisBackend`] from a DSN
pub struct RedisConnector {
    raw: String,
    dsn: Option<Dsn>,
    op_timeout: Duration,
}

impl RedisConnector {
    /// Parse the DSN up front. An empty DSN yields a connector that reports
    /// a configuration error on first use.
    pub fn from_dsn(raw: &str) -> Result<Self, StorageError> {
        let dsn = Dsn::parse(raw)?;
        let op_timeout = dsn
            .as_ref()
            .and_then(|d| d.read_timeout)
            .unwrap_or(DEFAULT_OPERATION_TIMEOUT);

        Ok(Self {
            raw: raw.trim().to_string(),
            dsn,
            op_timeout,
        })
    }

    /// Handshake bound requested by the DSN, if any
    pub fn connect_timeout(&self) -> Option<Duration> {
        self.dsn.as_ref().and_then(|d| d.connect_timeout)
    }

    fn connection_info(dsn: &Dsn) -> Result<ConnectionInfo, StorageError> {
        let addr = match &dsn.target {
            ConnectionTarget::Tcp { host, port } => ConnectionAddr::Tcp(host.clone(), *port),
            #[cfg(unix)]
            ConnectionTarget::Unix { path } => ConnectionAddr::Unix(path.clone()),
            #[cfg(not(unix))]
            ConnectionTarget::Unix { .. } => {
                return Err(StorageError::Configuration(
                    "unix sockets are not supported on this platform".into(),
                ))
            }
        };

        Ok(ConnectionInfo {
            addr,
            redis: RedisConnectionInfo {
                db: dsn.database,
                password: dsn.password.clone(),
                ..Default::default()
            },
        })
    }
}

#[async_trait]
impl Connector for RedisConnector {
    async fn connect(&self) -> Result<Arc<dyn Backend>, StorageError> {
        let dsn = self
            .dsn
            .as_ref()
            .ok_or_else(|| StorageError::Configuration("REDIS DSN is empty".into()))?;

        let client = redis::Client::open(Self::connection_info(dsn)?)
            .map_err(|e| StorageError::Configuration(e.to_string()))?;
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        Ok(Arc::new(RedisBackend::new(client, conn, self.op_timeout)))
    }

    fn describe(&self) -> String {
        if self.raw.is_empty() {
            "<unset>".into()
        } else {
            anonymise(&self.raw)
        }
    }
}
