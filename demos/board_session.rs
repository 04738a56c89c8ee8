//! Board Session Example
//!
//! Publishes a few board mutations into an in-memory store and follows them
//! with a polling cursor, the way a browser tab would.
//!
//! Run with: cargo run --example board_session

use std::sync::Arc;

use serde::Serialize;
use serde_json::json;

use boardfeed_core::{BoardId, BoardState, Envelope, Error, PublishObserver, RetentionPolicy, Snapshot, UpdateHub};
use boardfeed_protocol::PollCursor;
use boardfeed_storage::{ConnectionManager, MemoryBackend};

#[derive(Serialize)]
struct Column {
    id: u64,
    title: String,
    cards: Vec<String>,
}

#[derive(Serialize)]
struct Board {
    #[serde(skip)]
    id: BoardId,
    name: String,
    columns: Vec<Column>,
}

impl BoardState for Board {
    fn board_id(&self) -> BoardId {
        self.id
    }

    fn snapshot(&self) -> boardfeed_core::Result<Snapshot> {
        Snapshot::from_serializable(self)
    }
}

/// Prints what the publisher did with each event
struct Echo;

impl PublishObserver for Echo {
    fn recorded(&self, envelope: &Envelope) {
        println!("  published #{} {}", envelope.sequence_id, envelope.event_name);
    }

    fn failed(&self, board: BoardId, event: &str, error: &Error) {
        println!("  dropped {} on board {} ({})", event, board, error.kind());
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    println!("boardfeed Board Session Example\n");

    println!("=== Embedded Mode ===\n");
    embedded_example().await?;

    println!("\n=== Store Unavailable ===\n");
    unavailable_example().await;

    Ok(())
}

async fn embedded_example() -> Result<(), Box<dyn std::error::Error>> {
    let connection = Arc::new(ConnectionManager::with_backend(Arc::new(MemoryBackend::new())));
    let hub = UpdateHub::new(connection, RetentionPolicy::default());
    let publisher = hub.publisher().with_observer(Arc::new(Echo));

    let mut board = Board {
        id: BoardId::new(42),
        name: "Sprint".into(),
        columns: vec![Column {
            id: 1,
            title: "To do".into(),
            cards: Vec::new(),
        }],
    };

    publisher.publish(&board, "board.created", &json!({})).await;

    // A tab opens the board and asks for the latest event only
    let mut cursor = PollCursor::new();
    let fresh = cursor.apply(hub.updates(board.id, cursor.since()).await);
    println!("\nFirst poll: {} event(s), cursor {:?}", fresh.len(), cursor.since());

    board.columns[0].cards.push("Write release notes".into());
    publisher
        .publish(&board, "card.created", &json!({ "columnId": 1, "title": "Write release notes" }))
        .await;

    board.columns.push(Column {
        id: 2,
        title: "Done".into(),
        cards: Vec::new(),
    });
    publisher
        .publish(&board, "column.created", &json!({ "columnId": 2 }))
        .await;

    let fresh = cursor.apply(hub.updates(board.id, cursor.since()).await);
    println!("\nNext poll:");
    for envelope in &fresh {
        println!("  #{} {} {}", envelope.sequence_id, envelope.event_name, serde_json::Value::Object(envelope.payload.clone()));
    }
    println!("  cursor {:?}, retry in {:?}", cursor.since(), cursor.retry());

    if let Some(snapshot) = hub.snapshot(board.id).await {
        println!("\nCached snapshot: {}", snapshot.as_value());
    }

    Ok(())
}

async fn unavailable_example() {
    // No DSN: the first use latches the connection as failed
    let hub = UpdateHub::new(Arc::new(ConnectionManager::unconfigured()), RetentionPolicy::default());
    let publisher = hub.publisher().with_observer(Arc::new(Echo));

    let board = Board {
        id: BoardId::new(7),
        name: "Offline".into(),
        columns: Vec::new(),
    };

    publisher.publish(&board, "card.moved", &json!({ "cardId": 3 })).await;

    let batch = hub.updates(board.id, Some(5)).await;
    println!("  backend {}, poll answered {}", hub.state(), serde_json::to_string(&batch).unwrap_or_default());
}
