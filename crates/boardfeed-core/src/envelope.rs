//! Notification records and fetch results

use crate::board::{BoardId, Snapshot};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Event-specific data, opaque to the core
pub type EventPayload = serde_json::Map<String, serde_json::Value>;

/// One notification record in a board's event series.
///
/// Serialized as
/// `{"id", "event", "boardId", "payload", "snapshot"?, "createdAt"}`,
/// which is both the stored form and the wire form handed to pollers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    #[serde(rename = "id")]
    pub sequence_id: u64,
    #[serde(rename = "event")]
    pub event_name: String,
    pub board_id: BoardId,
    #[serde(default)]
    pub payload: EventPayload,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<Snapshot>,
    pub created_at: DateTime<Utc>,
}

/// An envelope before the log has assigned it a sequence id
#[derive(Debug, Clone, PartialEq)]
pub struct PendingEnvelope {
    pub event_name: String,
    pub payload: EventPayload,
    pub snapshot: Option<Snapshot>,
}

impl PendingEnvelope {
    pub fn new(event_name: impl Into<String>, payload: EventPayload) -> Self {
        Self {
            event_name: event_name.into(),
            payload,
            snapshot: None,
        }
    }

    pub fn with_snapshot(mut self, snapshot: Snapshot) -> Self {
        self.snapshot = Some(snapshot);
        self
    }

    /// Seal the envelope; it is never mutated afterwards
    pub fn into_envelope(self, board_id: BoardId, sequence_id: u64, created_at: DateTime<Utc>) -> Envelope {
        Envelope {
            sequence_id,
            event_name: self.event_name,
            board_id,
            payload: self.payload,
            snapshot: self.snapshot,
            created_at,
        }
    }
}

/// Result of a cursor fetch, also the body of a poll response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBatch {
    /// Envelopes newer than the cursor, ascending by id
    pub events: Vec<Envelope>,
    /// Cursor to send on the next poll
    pub latest_id: Option<u64>,
    /// Suggested delay before the next poll, in milliseconds
    pub retry: u64,
}

impl UpdateBatch {
    /// The answer given when the store cannot be consulted
    pub fn degraded(since: Option<u64>, retry: u64) -> Self {
        Self {
            events: Vec::new(),
            latest_id: since,
            retry,
        }
    }
}
