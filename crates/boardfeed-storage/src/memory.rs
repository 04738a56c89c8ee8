//! In-memory backend

use crate::{Backend, StorageError};
use async_trait::async_trait;
use dashmap::mapref::one::RefMut;
use dashmap::DashMap;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
enum Value {
    Str(String),
    List(VecDeque<String>),
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn new(value: Value) -> Self {
        Self { value, expires_at: None }
    }

    fn is_expired(&self) -> bool {
        self.expires_at.map_or(false, |at| Instant::now() >= at)
    }
}

/// In-memory backend
///
/// Mirrors the subset of Redis semantics the realtime log relies on,
/// including lazy key expiry. Each operation holds the shard lock of its
/// key, so `incr` is atomic across concurrent callers.
pub struct MemoryBackend {
    data: DashMap<String, Entry>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self { data: DashMap::new() }
    }

    /// Remaining time-to-live of a live key, `None` if absent or persistent
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let entry = self.data.get(key).filter(|e| !e.is_expired())?;
        entry
            .expires_at
            .map(|at| at.saturating_duration_since(Instant::now()))
    }

    /// Number of live keys
    pub fn key_count(&self) -> usize {
        self.data.iter().filter(|e| !e.value().is_expired()).count()
    }

    /// Exclusive access to a live entry, replacing an expired one with `default()`
    fn slot(&self, key: &str, default: impl Fn() -> Value) -> RefMut<'_, String, Entry> {
        let mut entry = self
            .data
            .entry(key.to_string())
            .or_insert_with(|| Entry::new(default()));
        if entry.is_expired() {
            *entry = Entry::new(default());
        }
        entry
    }

    fn with_list<T>(
        &self,
        key: &str,
        f: impl FnOnce(&VecDeque<String>) -> T,
    ) -> Result<Option<T>, StorageError> {
        match self.data.get(key).filter(|e| !e.is_expired()) {
            Some(entry) => match &entry.value {
                Value::List(list) => Ok(Some(f(list))),
                Value::Str(_) => Err(wrong_type(key)),
            },
            None => Ok(None),
        }
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn ping(&self) -> Result<(), StorageError> {
        Ok(())
    }

    async fn incr(&self, key: &str) -> Result<u64, StorageError> {
        let mut entry = self.slot(key, || Value::Str("0".into()));
        match &mut entry.value {
            Value::Str(raw) => {
                let current: u64 = raw.parse().map_err(|_| {
                    StorageError::Operation(format!("value at {} is not an integer", key))
                })?;
                let next = current.checked_add(1).ok_or_else(|| {
                    StorageError::Operation(format!("increment at {} would overflow", key))
                })?;
                *raw = next.to_string();
                Ok(next)
            }
            Value::List(_) => Err(wrong_type(key)),
        }
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        match self.data.get(key).filter(|e| !e.is_expired()) {
            Some(entry) => match &entry.value {
                Value::Str(raw) => Ok(Some(raw.clone())),
                Value::List(_) => Err(wrong_type(key)),
            },
            None => Ok(None),
        }
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StorageError> {
        let entry = Entry {
            value: Value::Str(value.to_string()),
            expires_at: Some(Instant::now() + ttl),
        };
        self.data.insert(key.to_string(), entry);
        Ok(())
    }

    async fn rpush(&self, key: &str, value: &str) -> Result<usize, StorageError> {
        let mut entry = self.slot(key, || Value::List(VecDeque::new()));
        match &mut entry.value {
            Value::List(list) => {
                list.push_back(value.to_string());
                Ok(list.len())
            }
            Value::Str(_) => Err(wrong_type(key)),
        }
    }

    async fn ltrim(&self, key: &str, start: isize, stop: isize) -> Result<(), StorageError> {
        let emptied = {
            let Some(mut entry) = self.data.get_mut(key).filter(|e| !e.is_expired()) else {
                return Ok(());
            };
            match &mut entry.value {
                Value::List(list) => {
                    match range_bounds(list.len(), start, stop) {
                        Some((from, to)) => {
                            list.truncate(to + 1);
                            list.drain(..from);
                        }
                        None => list.clear(),
                    }
                    list.is_empty()
                }
                Value::Str(_) => return Err(wrong_type(key)),
            }
        };
        // Redis drops a list key once it is empty; a concurrent push keeps it
        if emptied {
            self.data.remove_if(key, |_, entry| holds_empty_list(entry));
        }
        Ok(())
    }

    async fn lrange(&self, key: &str, start: isize, stop: isize) -> Result<Vec<String>, StorageError> {
        let items = self.with_list(key, |list| match range_bounds(list.len(), start, stop) {
            Some((from, to)) => list.range(from..=to).cloned().collect(),
            None => Vec::new(),
        })?;
        Ok(items.unwrap_or_default())
    }

    async fn llen(&self, key: &str) -> Result<usize, StorageError> {
        Ok(self.with_list(key, |list| list.len())?.unwrap_or(0))
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, StorageError> {
        match self.data.get_mut(key).filter(|e| !e.is_expired()) {
            Some(mut entry) => {
                entry.expires_at = Some(Instant::now() + ttl);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

fn holds_empty_list(entry: &Entry) -> bool {
    matches!(&entry.value, Value::List(list) if list.is_empty())
}

fn wrong_type(key: &str) -> StorageError {
    StorageError::Operation(format!(
        "WRONGTYPE operation against key {} holding the wrong kind of value",
        key
    ))
}

/// Resolve Redis-style inclusive indices into concrete positions
fn range_bounds(len: usize, start: isize, stop: isize) -> Option<(usize, usize)> {
    if len == 0 {
        return None;
    }
    let len = len as isize;
    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };

    if start > stop || start >= len || stop < 0 {
        return None;
    }
    Some((start as usize, stop as usize))
}
