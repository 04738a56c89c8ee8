//! Client-side polling cursor

use boardfeed_core::{Envelope, UpdateBatch};
use boardfeed_core::retention::DEFAULT_RETRY_MS;
use std::time::Duration;
use tracing::debug;

/// What a polling client remembers between calls.
///
/// Start without a cursor to receive only the latest event, then send the
/// returned `latestId` on every following poll. A server-side series that
/// restarted after expiry sits below the cursor and stays invisible until it
/// overtakes it; the cursor does not try to detect that.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollCursor {
    since: Option<u64>,
    retry_ms: u64,
}

impl PollCursor {
    pub fn new() -> Self {
        Self {
            since: None,
            retry_ms: DEFAULT_RETRY_MS,
        }
    }

    /// Resume from a cursor saved earlier
    pub fn resume(since: u64) -> Self {
        Self {
            since: Some(since),
            ..Self::new()
        }
    }

    pub fn since(&self) -> Option<u64> {
        self.since
    }

    /// Delay the server asked for before the next poll
    pub fn retry(&self) -> Duration {
        Duration::from_millis(self.retry_ms)
    }

    /// Take in a poll result and return the events not seen before, oldest first
    pub fn apply(&mut self, batch: UpdateBatch) -> Vec<Envelope> {
        let since = self.since;
        let mut fresh: Vec<Envelope> = batch
            .events
            .into_iter()
            .filter(|envelope| since.map_or(true, |cursor| envelope.sequence_id > cursor))
            .collect();
        fresh.sort_by_key(|envelope| envelope.sequence_id);

        let newest = fresh.last().map(|envelope| envelope.sequence_id);
        self.since = [since, batch.latest_id, newest].into_iter().flatten().max();
        self.retry_ms = batch.retry;

        debug!(since = ?since, cursor = ?self.since, fresh = fresh.len(), "Applied poll result");
        fresh
    }
}

impl Default for PollCursor {
    fn default() -> Self {
        Self::new()
    }
}
