//! Bounded, expiring per-board event log

use crate::board::BoardId;
use crate::envelope::{Envelope, PendingEnvelope, UpdateBatch};
use crate::error::{Error, Result};
use crate::keys;
use crate::retention::RetentionPolicy;
use crate::sequence::SequenceCounter;
use boardfeed_storage::ConnectionManager;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Per-board ordered log of envelopes.
///
/// Each board owns one list in the backing store, capped at
/// `policy.capacity` entries (oldest evicted first) and expiring after
/// `policy.ttl` without writes. The store only offers position-based range
/// reads, so a cursor fetch reads the whole bounded list and filters by id.
#[derive(Debug)]
pub struct EventLog {
    connection: Arc<ConnectionManager>,
    counter: SequenceCounter,
    policy: RetentionPolicy,
}

impl EventLog {
    pub fn new(connection: Arc<ConnectionManager>, policy: RetentionPolicy) -> Self {
        Self {
            counter: SequenceCounter::new(connection.clone()),
            connection,
            policy,
        }
    }

    pub fn policy(&self) -> &RetentionPolicy {
        &self.policy
    }

    pub fn counter(&self) -> &SequenceCounter {
        &self.counter
    }

    /// Assign the next id and append the envelope.
    ///
    /// The steps (increment, push, trim, expire) are separate round trips;
    /// a concurrent fetch may briefly see more than `capacity` entries.
    pub async fn append(&self, board: BoardId, pending: PendingEnvelope) -> Result<Envelope> {
        let client = self.connection.client().await?;

        let sequence_id = self.counter.next(board).await?;
        let envelope = pending.into_envelope(board, sequence_id, Utc::now());
        let encoded = serde_json::to_string(&envelope).map_err(|e| Error::Serialization(e.to_string()))?;

        let key = keys::events(board);
        let capacity = self.policy.capacity as isize;

        client.rpush(&key, &encoded).await?;
        client.ltrim(&key, -capacity, -1).await?;
        client.expire(&key, self.policy.ttl).await?;
        self.counter.touch(board, self.policy.ttl).await?;

        debug!(board = %board, id = sequence_id, event = %envelope.event_name, "Recorded board update");
        Ok(envelope)
    }

    /// Envelopes newer than `since`, plus the cursor for the next poll.
    ///
    /// Without a cursor only the most recent envelope is returned. Never
    /// fails: store problems yield an empty batch that keeps the cursor.
    pub async fn fetch(&self, board: BoardId, since: Option<u64>) -> UpdateBatch {
        match self.try_fetch(board, since).await {
            Ok(batch) => batch,
            Err(e) => {
                if !e.is_unavailable() {
                    error!(board = %board, error = %e, "Failed to fetch board updates");
                }
                UpdateBatch::degraded(since, self.policy.retry_ms)
            }
        }
    }

    async fn try_fetch(&self, board: BoardId, since: Option<u64>) -> Result<UpdateBatch> {
        let client = self.connection.client().await?;
        let key = keys::events(board);

        let raw = match since {
            None => client.lrange(&key, -1, -1).await?,
            Some(_) => client.lrange(&key, 0, -1).await?,
        };

        let mut events: Vec<Envelope> = raw
            .iter()
            .filter_map(|record| decode(board, record))
            .filter(|envelope| since.map_or(true, |cursor| envelope.sequence_id > cursor))
            .collect();

        // Concurrent appends can push out of id order
        events.sort_by_key(|envelope| envelope.sequence_id);

        let newest = match events.last() {
            Some(envelope) => Some(envelope.sequence_id),
            None => self.counter.current(board).await?,
        };

        let latest_id = match (newest, since) {
            (Some(newest), Some(cursor)) => Some(newest.max(cursor)),
            (newest, cursor) => newest.or(cursor),
        };

        Ok(UpdateBatch {
            events,
            latest_id,
            retry: self.policy.retry_ms,
        })
    }

    /// Number of envelopes currently stored for the board
    pub async fn len(&self, board: BoardId) -> Result<usize> {
        let client = self.connection.client().await?;
        Ok(client.llen(&keys::events(board)).await?)
    }
}

fn decode(board: BoardId, record: &str) -> Option<Envelope> {
    match serde_json::from_str(record) {
        Ok(envelope) => Some(envelope),
        Err(e) => {
            warn!(board = %board, error = %e, "Skipping malformed board update record");
            None
        }
    }
}
