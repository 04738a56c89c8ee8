//! Update hub - wires the stores around one connection

use crate::board::{BoardId, Snapshot};
use crate::envelope::UpdateBatch;
use crate::event_log::EventLog;
use crate::publisher::UpdatePublisher;
use crate::retention::RetentionPolicy;
use crate::snapshot::SnapshotCache;
use boardfeed_storage::{ConnectionManager, ConnectionState};
use std::sync::Arc;

/// Owns the event log and snapshot cache of one process.
///
/// Both stores share a single [`ConnectionManager`], so a failed handshake
/// disables the write path and the read path together.
#[derive(Debug, Clone)]
pub struct UpdateHub {
    connection: Arc<ConnectionManager>,
    log: Arc<EventLog>,
    snapshots: Arc<SnapshotCache>,
}

impl UpdateHub {
    pub fn new(connection: Arc<ConnectionManager>, policy: RetentionPolicy) -> Self {
        Self {
            log: Arc::new(EventLog::new(connection.clone(), policy)),
            snapshots: Arc::new(SnapshotCache::new(connection.clone(), policy.ttl)),
            connection,
        }
    }

    /// A publisher writing into this hub's stores
    pub fn publisher(&self) -> UpdatePublisher {
        UpdatePublisher::new(self.log.clone(), self.snapshots.clone())
    }

    /// Cursor fetch, see [`EventLog::fetch`]
    pub async fn updates(&self, board: BoardId, since: Option<u64>) -> UpdateBatch {
        self.log.fetch(board, since).await
    }

    pub async fn snapshot(&self, board: BoardId) -> Option<Snapshot> {
        self.snapshots.get(board).await
    }

    pub fn log(&self) -> &Arc<EventLog> {
        &self.log
    }

    pub fn snapshots(&self) -> &Arc<SnapshotCache> {
        &self.snapshots
    }

    pub fn connection(&self) -> &Arc<ConnectionManager> {
        &self.connection
    }

    pub fn policy(&self) -> &RetentionPolicy {
        self.log.policy()
    }

    pub fn state(&self) -> ConnectionState {
        self.connection.state()
    }
}
