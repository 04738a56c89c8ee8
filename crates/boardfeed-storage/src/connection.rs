//! Connection manager - lazy handshake with a one-way failure latch
//!
//! The first caller of [`ConnectionManager::client`] performs the handshake.
//! Success stores the backend handle for the lifetime of the process; any
//! failure (missing configuration, refused connection, handshake timeout)
//! latches the manager into [`ConnectionState::Failed`], after which every
//! caller gets [`StorageError::Unavailable`] without touching the network.
//!
//! Errors raised by individual operations after a successful handshake are
//! the caller's concern and never trip the latch.

use crate::{Backend, StorageError};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{error, info, warn};

/// Default bound on the initial handshake
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Lifecycle of the shared backend handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Uninitialized,
    Connected,
    Failed,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Uninitialized => "uninitialized",
            ConnectionState::Connected => "connected",
            ConnectionState::Failed => "failed",
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Establishes a backend connection
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a connection. Called at most once per manager.
    async fn connect(&self) -> Result<Arc<dyn Backend>, StorageError>;

    /// Loggable description of the target (credentials masked)
    fn describe(&self) -> String;
}

/// Hands out an already constructed backend
struct ReadyConnector(Arc<dyn Backend>);

#[async_trait]
impl Connector for ReadyConnector {
    async fn connect(&self) -> Result<Arc<dyn Backend>, StorageError> {
        Ok(self.0.clone())
    }

    fn describe(&self) -> String {
        "in-process".into()
    }
}

/// Stands in when no backing store is configured
struct Unconfigured;

#[async_trait]
impl Connector for Unconfigured {
    async fn connect(&self) -> Result<Arc<dyn Backend>, StorageError> {
        Err(StorageError::Configuration("no backing-store DSN configured".into()))
    }

    fn describe(&self) -> String {
        "<unset>".into()
    }
}

/// Shared backend handle with a one-way failure latch
pub struct ConnectionManager {
    connector: Box<dyn Connector>,
    connect_timeout: Duration,
    slot: OnceCell<Option<Arc<dyn Backend>>>,
}

impl ConnectionManager {
    pub fn new(connector: impl Connector + 'static) -> Self {
        Self {
            connector: Box::new(connector),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            slot: OnceCell::new(),
        }
    }

    /// Manager over a backend that needs no handshake (memory, tests)
    pub fn with_backend(backend: Arc<dyn Backend>) -> Self {
        Self::new(ReadyConnector(backend))
    }

    /// Manager with nothing to connect to; latches `Failed` on first use
    pub fn unconfigured() -> Self {
        Self::new(Unconfigured)
    }

    /// Bound the handshake (connect + ping)
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Current lifecycle state; never triggers a handshake
    pub fn state(&self) -> ConnectionState {
        match self.slot.get() {
            None => ConnectionState::Uninitialized,
            Some(Some(_)) => ConnectionState::Connected,
            Some(None) => ConnectionState::Failed,
        }
    }

    /// Get the backend, performing the handshake on first use
    pub async fn client(&self) -> Result<Arc<dyn Backend>, StorageError> {
        self.slot
            .get_or_init(|| self.handshake())
            .await
            .clone()
            .ok_or(StorageError::Unavailable)
    }

    async fn handshake(&self) -> Option<Arc<dyn Backend>> {
        let target = self.connector.describe();

        let attempt = async {
            let backend = self.connector.connect().await?;
            backend.ping().await?;
            Ok::<_, StorageError>(backend)
        };

        let result = match tokio::time::timeout(self.connect_timeout, attempt).await {
            Ok(result) => result,
            Err(_) => Err(StorageError::Timeout(self.connect_timeout)),
        };

        match result {
            Ok(backend) => {
                info!(target = %target, "Backing store connected");
                Some(backend)
            }
            Err(StorageError::Configuration(reason)) => {
                warn!(reason = %reason, "Backing store is not configured; real-time updates are disabled");
                None
            }
            Err(e) => {
                error!(target = %target, error = %e, "Unable to connect to backing store; real-time updates are disabled");
                None
            }
        }
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("target", &self.connector.describe())
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryBackend;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts connection attempts and fails every one of them
    struct Refusing {
        attempts: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Connector for Refusing {
        async fn connect(&self) -> Result<Arc<dyn Backend>, StorageError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Err(StorageError::Connection("connection refused".into()))
        }

        fn describe(&self) -> String {
            "refusing".into()
        }
    }

    /// Never answers
    struct Hanging;

    #[async_trait]
    impl Connector for Hanging {
        async fn connect(&self) -> Result<Arc<dyn Backend>, StorageError> {
            std::future::pending().await
        }

        fn describe(&self) -> String {
            "hanging".into()
        }
    }

    #[tokio::test]
    async fn test_lazy_connect() {
        let manager = ConnectionManager::with_backend(Arc::new(MemoryBackend::new()));
        assert_eq!(manager.state(), ConnectionState::Uninitialized);

        assert!(manager.client().await.is_ok());
        assert_eq!(manager.state(), ConnectionState::Connected);
    }

    #[tokio::test]
    async fn test_unconfigured_latches_failed() {
        let manager = ConnectionManager::unconfigured();

        assert!(matches!(manager.client().await, Err(StorageError::Unavailable)));
        assert_eq!(manager.state(), ConnectionState::Failed);
    }

    #[tokio::test]
    async fn test_failed_is_terminal() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let manager = ConnectionManager::new(Refusing { attempts: attempts.clone() });

        for _ in 0..5 {
            assert!(matches!(manager.client().await, Err(StorageError::Unavailable)));
        }

        assert_eq!(manager.state(), ConnectionState::Failed);
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_first_use_single_handshake() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let manager = Arc::new(ConnectionManager::new(Refusing { attempts: attempts.clone() }));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let manager = manager.clone();
                tokio::spawn(async move { manager.client().await.is_err() })
            })
            .collect();

        for handle in handles {
            assert!(handle.await.unwrap());
        }
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_handshake_timeout() {
        let manager = ConnectionManager::new(Hanging).with_connect_timeout(Duration::from_millis(20));

        assert!(matches!(manager.client().await, Err(StorageError::Unavailable)));
        assert_eq!(manager.state(), ConnectionState::Failed);
    }
}
