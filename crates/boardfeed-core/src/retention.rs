//! Retention and polling defaults

use std::time::Duration;

/// Maximum envelopes kept per board
pub const LOG_CAPACITY: usize = 200;

/// Inactivity window after which a board's keys expire (12 hours)
pub const RETENTION_TTL: Duration = Duration::from_secs(43_200);

/// Poll interval hint returned to clients
pub const DEFAULT_RETRY_MS: u64 = 3_000;

/// How much history a board keeps and how often clients should poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    pub capacity: usize,
    pub ttl: Duration,
    pub retry_ms: u64,
}

impl RetentionPolicy {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            capacity: capacity.max(1),
            ttl,
            retry_ms: DEFAULT_RETRY_MS,
        }
    }

    pub fn with_retry_ms(mut self, retry_ms: u64) -> Self {
        self.retry_ms = retry_ms;
        self
    }
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self::new(LOG_CAPACITY, RETENTION_TTL)
    }
}
