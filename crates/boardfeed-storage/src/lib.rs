//! boardfeed storage backends
//!
//! Provides the key-value primitives the realtime log is built on:
//! - Memory (default): volatile, expiry-aware, used embedded and in tests
//! - Redis: shared backing store for multi-instance deployments
//!
//! All backends are reached through a [`ConnectionManager`], which owns the
//! lazy handshake and the one-way failure latch.

pub mod connection;
pub mod dsn;
#[cfg(feature = "memory")]
pub mod memory;
#[cfg(feature = "redis")]
pub mod redis;

use async_trait::async_trait;
use std::time::Duration;

/// Key-value backend with Redis list/counter semantics.
///
/// List indices follow Redis conventions: negative values count from the
/// tail, `-1` being the last element. Expired keys behave as absent.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Round-trip check used during the handshake
    async fn ping(&self) -> Result<(), StorageError>;

    /// Atomically increment a counter, creating it at 1 when absent
    async fn incr(&self, key: &str) -> Result<u64, StorageError>;

    /// Read a string value
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Overwrite a string value with a time-to-live
    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StorageError>;

    /// Append to the tail of a list, returning the new length
    async fn rpush(&self, key: &str, value: &str) -> Result<usize, StorageError>;

    /// Keep only the elements in `start..=stop`
    async fn ltrim(&self, key: &str, start: isize, stop: isize) -> Result<(), StorageError>;

    /// Read the elements in `start..=stop`
    async fn lrange(&self, key: &str, start: isize, stop: isize) -> Result<Vec<String>, StorageError>;

    /// Length of a list (0 when absent)
    async fn llen(&self, key: &str) -> Result<usize, StorageError>;

    /// Set a key's time-to-live. Returns false if the key does not exist.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, StorageError>;
}

/// Storage error types
#[derive(Debug, Clone, thiserror::Error)]
pub enum StorageError {
    /// The connection latch has tripped; no network attempt was made.
    #[error("Backend unavailable")]
    Unavailable,

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Operation failed: {0}")]
    Operation(String),
}

impl StorageError {
    /// Short label used for log fields and metric labels
    pub fn kind(&self) -> &'static str {
        match self {
            StorageError::Unavailable => "unavailable",
            StorageError::Configuration(_) => "configuration",
            StorageError::Connection(_) => "connection",
            StorageError::Timeout(_) => "timeout",
            StorageError::Operation(_) => "operation",
        }
    }
}

pub use connection::{ConnectionManager, ConnectionState, Connector};
pub use dsn::{ConnectionTarget, Dsn};
#[cfg(feature = "memory")]
pub use memory::MemoryBackend;
#[cfg(feature = "redis")]
pub use self::redis::{RedisBackend, RedisConnector};
