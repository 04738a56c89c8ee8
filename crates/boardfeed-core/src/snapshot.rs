//! Latest-snapshot cache, one slot per board

use crate::board::{BoardId, Snapshot};
use crate::error::{Error, Result};
use crate::keys;
use boardfeed_storage::ConnectionManager;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, warn};

/// Holds the most recently published snapshot of each board.
///
/// Lives next to the event log but is not trimmed with it: a board whose
/// log has rolled over still serves its last snapshot until the slot's own
/// TTL runs out.
#[derive(Debug)]
pub struct SnapshotCache {
    connection: Arc<ConnectionManager>,
    ttl: Duration,
}

impl SnapshotCache {
    pub fn new(connection: Arc<ConnectionManager>, ttl: Duration) -> Self {
        Self { connection, ttl }
    }

    /// Overwrite the board's snapshot and restart its TTL
    pub async fn put(&self, board: BoardId, snapshot: &Snapshot) -> Result<()> {
        let encoded = serde_json::to_string(snapshot).map_err(|e| Error::Serialization(e.to_string()))?;
        let client = self.connection.client().await?;
        client.set_ex(&keys::snapshot(board), &encoded, self.ttl).await?;
        Ok(())
    }

    /// Latest snapshot, or `None` if absent, expired or unreadable
    pub async fn get(&self, board: BoardId) -> Option<Snapshot> {
        match self.try_get(board).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                if !e.is_unavailable() {
                    error!(board = %board, error = %e, "Failed to read board snapshot");
                }
                None
            }
        }
    }

    async fn try_get(&self, board: BoardId) -> Result<Option<Snapshot>> {
        let client = self.connection.client().await?;
        let Some(encoded) = client.get(&keys::snapshot(board)).await? else {
            return Ok(None);
        };

        match serde_json::from_str(&encoded) {
            Ok(snapshot) => Ok(Some(snapshot)),
            Err(e) => {
                warn!(board = %board, error = %e, "Discarding malformed board snapshot");
                Ok(None)
            }
        }
    }
}
