//! Best-effort publishing of board mutations

use crate::board::{BoardId, BoardState};
use crate::envelope::{Envelope, EventPayload, PendingEnvelope};
use crate::error::{Error, Result};
use crate::event_log::EventLog;
use crate::snapshot::SnapshotCache;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error};

/// Whether a publish carries the board's full snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SnapshotMode {
    #[default]
    Attach,
    Omit,
}

/// Side channel for publish outcomes.
///
/// Publishing never reports failure to its caller, so this is the only
/// place besides the log where a dropped event becomes visible.
pub trait PublishObserver: Send + Sync {
    fn recorded(&self, _envelope: &Envelope) {}

    fn failed(&self, _board: BoardId, _event: &str, _error: &Error) {}
}

/// Turns domain mutations into envelopes.
///
/// Called from the domain layer after every board change. A publish that
/// cannot reach the store is dropped: pollers simply miss it.
pub struct UpdatePublisher {
    log: Arc<EventLog>,
    snapshots: Arc<SnapshotCache>,
    observers: Vec<Arc<dyn PublishObserver>>,
}

impl UpdatePublisher {
    pub fn new(log: Arc<EventLog>, snapshots: Arc<SnapshotCache>) -> Self {
        Self {
            log,
            snapshots,
            observers: Vec::new(),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn PublishObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Record an event with a freshly computed snapshot attached
    pub async fn publish<B, C>(&self, board: &B, event: &str, context: &C)
    where
        B: BoardState + ?Sized,
        C: Serialize + ?Sized,
    {
        self.publish_with(board, event, context, SnapshotMode::Attach).await
    }

    pub async fn publish_with<B, C>(&self, board: &B, event: &str, context: &C, mode: SnapshotMode)
    where
        B: BoardState + ?Sized,
        C: Serialize + ?Sized,
    {
        let board_id = board.board_id();

        match self.try_publish(board, event, context, mode).await {
            Ok(envelope) => {
                for observer in &self.observers {
                    observer.recorded(&envelope);
                }
            }
            Err(e) => {
                if e.is_unavailable() {
                    debug!(board = %board_id, event = event, "Update store unavailable, dropping event");
                } else {
                    error!(board = %board_id, event = event, error = %e, "Failed to publish board update");
                }
                for observer in &self.observers {
                    observer.failed(board_id, event, &e);
                }
            }
        }
    }

    /// The publish path with its failure left visible
    pub async fn try_publish<B, C>(&self, board: &B, event: &str, context: &C, mode: SnapshotMode) -> Result<Envelope>
    where
        B: BoardState + ?Sized,
        C: Serialize + ?Sized,
    {
        let payload = to_payload(context)?;
        let mut pending = PendingEnvelope::new(event, payload);

        if mode == SnapshotMode::Attach {
            pending = pending.with_snapshot(board.snapshot()?);
        }

        let board_id = board.board_id();
        let envelope = self.log.append(board_id, pending).await?;

        if let Some(snapshot) = &envelope.snapshot {
            self.snapshots.put(board_id, snapshot).await?;
        }

        Ok(envelope)
    }
}

impl std::fmt::Debug for UpdatePublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdatePublisher")
            .field("log", &self.log)
            .field("observers", &self.observers.len())
            .finish()
    }
}

fn to_payload<C: Serialize + ?Sized>(context: &C) -> Result<EventPayload> {
    match serde_json::to_value(context) {
        Ok(serde_json::Value::Object(map)) => Ok(map),
        Ok(other) => Err(Error::Serialization(format!(
            "event context must be a JSON object, got {}",
            json_type(&other)
        ))),
        Err(e) => Err(Error::Serialization(e.to_string())),
    }
}

fn json_type(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{BoardRef, Snapshot};
    use crate::envelope::UpdateBatch;
    use crate::retention::{RetentionPolicy, RETENTION_TTL};
    use crate::testing::{flaky_connection, memory_connection};
    use boardfeed_storage::ConnectionManager;
    use serde_json::json;
    use std::collections::HashSet;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        recorded: Mutex<Vec<u64>>,
        failed: Mutex<Vec<(BoardId, String, &'static str)>>,
    }

    impl PublishObserver for Recorder {
        fn recorded(&self, envelope: &Envelope) {
            self.recorded.lock().unwrap().push(envelope.sequence_id);
        }

        fn failed(&self, board: BoardId, event: &str, error: &Error) {
            self.failed.lock().unwrap().push((board, event.to_string(), error.kind()));
        }
    }

    struct BrokenBoard;

    impl BoardState for BrokenBoard {
        fn board_id(&self) -> BoardId {
            BoardId::new(5)
        }

        fn snapshot(&self) -> Result<Snapshot> {
            Err(Error::Snapshot("column list not loaded".into()))
        }
    }

    fn publisher_over(connection: Arc<ConnectionManager>) -> (UpdatePublisher, Arc<EventLog>, Arc<SnapshotCache>) {
        let log = Arc::new(EventLog::new(connection.clone(), RetentionPolicy::default()));
        let snapshots = Arc::new(SnapshotCache::new(connection, RETENTION_TTL));
        (UpdatePublisher::new(log.clone(), snapshots.clone()), log, snapshots)
    }

    #[tokio::test]
    async fn test_publish_records_payload_and_snapshot() {
        let (connection, _) = memory_connection();
        let (publisher, log, snapshots) = publisher_over(connection);

        let state = json!({ "name": "Sprint", "columns": [{ "id": 3 }] });
        let board = BoardRef::new(BoardId::new(42), &state);

        publisher.publish(&board, "card.created", &json!({ "cardId": 17 })).await;

        let batch = log.fetch(BoardId::new(42), None).await;
        let envelope = &batch.events[0];
        assert_eq!(envelope.sequence_id, 1);
        assert_eq!(envelope.event_name, "card.created");
        assert_eq!(envelope.payload["cardId"], 17);
        assert_eq!(envelope.snapshot.as_ref().map(Snapshot::as_value), Some(&state));
        assert_eq!(snapshots.get(BoardId::new(42)).await, Some(Snapshot::new(state)));
    }

    #[tokio::test]
    async fn test_failed_store_never_reaches_caller() {
        let (publisher, log, _) = publisher_over(Arc::new(ConnectionManager::unconfigured()));
        let recorder = Arc::new(Recorder::default());
        let publisher = publisher.with_observer(recorder.clone());

        let state = json!({});
        let board = BoardRef::new(BoardId::new(1), &state);
        publisher.publish(&board, "x", &json!({})).await;

        assert_eq!(log.fetch(BoardId::new(1), Some(5)).await, UpdateBatch::degraded(Some(5), 3000));
        assert_eq!(
            recorder.failed.lock().unwrap().as_slice(),
            &[(BoardId::new(1), "x".to_string(), "unavailable")]
        );
    }

    #[tokio::test]
    async fn test_last_snapshot_wins_not_last_event() {
        let (connection, _) = memory_connection();
        let (publisher, log, snapshots) = publisher_over(connection);
        let board_id = BoardId::new(42);

        let sprint = json!({ "name": "Sprint" });
        publisher.publish(&BoardRef::new(board_id, &sprint), "board.renamed", &json!({})).await;

        let renamed = json!({ "name": "Sprint 2" });
        publisher
            .publish_with(&BoardRef::new(board_id, &renamed), "card.moved", &json!({}), SnapshotMode::Omit)
            .await;

        let batch = log.fetch(board_id, Some(1)).await;
        assert_eq!(batch.events[0].snapshot, None);
        assert_eq!(snapshots.get(board_id).await, Some(Snapshot::new(sprint)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_publishers_get_unique_ids() {
        let (connection, _) = memory_connection();
        let (publisher, log, _) = publisher_over(connection);
        let publisher = Arc::new(publisher);
        let board_id = BoardId::new(9);

        let handles: Vec<_> = (0..6)
            .map(|worker| {
                let publisher = publisher.clone();
                tokio::spawn(async move {
                    let state = json!({ "worker": worker });
                    for i in 0..20 {
                        publisher
                            .publish(&BoardRef::new(board_id, &state), "card.updated", &json!({ "i": i }))
                            .await;
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap();
        }

        let batch = log.fetch(board_id, Some(0)).await;
        let ids: Vec<u64> = batch.events.iter().map(|e| e.sequence_id).collect();
        let unique: HashSet<u64> = ids.iter().copied().collect();

        assert_eq!(ids, (1..=120).collect::<Vec<_>>());
        assert_eq!(unique.len(), 120);
        assert_eq!(batch.latest_id, Some(120));
    }

    #[tokio::test]
    async fn test_snapshot_failure_drops_event() {
        let (connection, _) = memory_connection();
        let (publisher, log, _) = publisher_over(connection);
        let recorder = Arc::new(Recorder::default());
        let publisher = publisher.with_observer(recorder.clone());

        publisher.publish(&BrokenBoard, "card.created", &json!({})).await;

        assert_eq!(log.len(BoardId::new(5)).await.unwrap(), 0);
        assert_eq!(recorder.failed.lock().unwrap()[0].2, "snapshot");

        // Without a snapshot the board is never asked for one
        publisher
            .publish_with(&BrokenBoard, "card.created", &json!({}), SnapshotMode::Omit)
            .await;
        assert_eq!(log.len(BoardId::new(5)).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_context_must_be_an_object() {
        let (connection, _) = memory_connection();
        let (publisher, log, _) = publisher_over(connection);
        let state = json!({});
        let board = BoardRef::new(BoardId::new(2), &state);

        let err = publisher
            .try_publish(&board, "card.created", &vec![1, 2, 3], SnapshotMode::Attach)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Serialization(_)));

        publisher.publish(&board, "card.created", "just a string").await;
        assert_eq!(log.len(BoardId::new(2)).await.unwrap(), 0);

        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct CardMoved {
            card_id: u64,
            to_column: u64,
        }

        let envelope = publisher
            .try_publish(&board, "card.moved", &CardMoved { card_id: 4, to_column: 2 }, SnapshotMode::Omit)
            .await
            .unwrap();
        assert_eq!(envelope.payload["toColumn"], 2);
    }

    #[tokio::test]
    async fn test_transient_failure_then_recovery() {
        let (connection, backend) = flaky_connection();
        let (publisher, log, _) = publisher_over(connection);
        let recorder = Arc::new(Recorder::default());
        let publisher = publisher.with_observer(recorder.clone());

        let state = json!({ "name": "Sprint" });
        let board = BoardRef::new(BoardId::new(8), &state);

        backend.set_failing(true);
        publisher.publish(&board, "card.created", &json!({})).await;
        backend.set_failing(false);
        publisher.publish(&board, "card.created", &json!({})).await;

        assert_eq!(recorder.failed.lock().unwrap()[0].2, "operation");
        assert_eq!(recorder.recorded.lock().unwrap().as_slice(), &[1]);
        assert_eq!(log.fetch(BoardId::new(8), None).await.latest_id, Some(1));
    }
}
