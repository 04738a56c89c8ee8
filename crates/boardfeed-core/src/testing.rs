//! Test doubles shared by the store tests

use async_trait::async_trait;
use boardfeed_storage::{Backend, ConnectionManager, MemoryBackend, StorageError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Memory backend whose operations can be made to fail on demand,
/// standing in for a transient network fault after a good handshake.
pub struct FlakyBackend {
    inner: MemoryBackend,
    failing: AtomicBool,
}

impl FlakyBackend {
    pub fn new() -> Self {
        Self {
            inner: MemoryBackend::new(),
            failing: AtomicBool::new(false),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), StorageError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(StorageError::Operation("connection reset by peer".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Backend for FlakyBackend {
    async fn ping(&self) -> Result<(), StorageError> {
        self.inner.ping().await
    }

    async fn incr(&self, key: &str) -> Result<u64, StorageError> {
        self.check()?;
        self.inner.incr(key).await
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.check()?;
        self.inner.get(key).await
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StorageError> {
        self.check()?;
        self.inner.set_ex(key, value, ttl).await
    }

    async fn rpush(&self, key: &str, value: &str) -> Result<usize, StorageError> {
        self.check()?;
        self.inner.rpush(key, value).await
    }

    async fn ltrim(&self, key: &str, start: isize, stop: isize) -> Result<(), StorageError> {
        self.check()?;
        self.inner.ltrim(key, start, stop).await
    }

    async fn lrange(&self, key: &str, start: isize, stop: isize) -> Result<Vec<String>, StorageError> {
        self.check()?;
        self.inner.lrange(key, start, stop).await
    }

    async fn llen(&self, key: &str) -> Result<usize, StorageError> {
        self.check()?;
        self.inner.llen(key).await
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, StorageError> {
        self.check()?;
        self.inner.expire(key, ttl).await
    }
}

/// A connected manager over a fresh memory backend, plus the backend itself
pub fn memory_connection() -> (Arc<ConnectionManager>, Arc<MemoryBackend>) {
    let backend = Arc::new(MemoryBackend::new());
    let manager = Arc::new(ConnectionManager::with_backend(backend.clone()));
    (manager, backend)
}

pub fn flaky_connection() -> (Arc<ConnectionManager>, Arc<FlakyBackend>) {
    let backend = Arc::new(FlakyBackend::new());
    let manager = Arc::new(ConnectionManager::with_backend(backend.clone()));
    (manager, backend)
}
