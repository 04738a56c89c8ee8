//! Per-board sequence counter

use crate::board::BoardId;
use crate::error::{Error, Result};
use crate::keys;
use boardfeed_storage::ConnectionManager;
use std::sync::Arc;
use std::time::Duration;

/// Hands out strictly increasing ids per board.
///
/// Backed by an atomic increment on the store, so concurrent writers in
/// any number of processes never receive the same id while the counter key
/// lives. Once the key expires the next id is 1 again: a cursor issued
/// before the reset can sit above the new series and will not notice it.
#[derive(Debug, Clone)]
pub struct SequenceCounter {
    connection: Arc<ConnectionManager>,
}

impl SequenceCounter {
    pub fn new(connection: Arc<ConnectionManager>) -> Self {
        Self { connection }
    }

    /// Next id for the board
    pub async fn next(&self, board: BoardId) -> Result<u64> {
        let client = self.connection.client().await?;
        Ok(client.incr(&keys::sequence(board)).await?)
    }

    /// Last id handed out, without consuming one
    pub async fn current(&self, board: BoardId) -> Result<Option<u64>> {
        let client = self.connection.client().await?;
        match client.get(&keys::sequence(board)).await? {
            Some(raw) => raw
                .parse()
                .map(Some)
                .map_err(|_| Error::MalformedRecord(format!("sequence for board {}: {:?}", board, raw))),
            None => Ok(None),
        }
    }

    /// Align the counter's expiry with the rest of the board's keys
    pub async fn touch(&self, board: BoardId, ttl: Duration) -> Result<bool> {
        let client = self.connection.client().await?;
        Ok(client.expire(&keys::sequence(board), ttl).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::memory_connection;
    use boardfeed_storage::Backend;
    use std::collections::HashSet;

    #[tokio::test]
    async fn test_next_is_strictly_increasing() {
        let (connection, _) = memory_connection();
        let counter = SequenceCounter::new(connection);
        let board = BoardId::new(1);

        let mut last = 0;
        for _ in 0..20 {
            let id = counter.next(board).await.unwrap();
            assert!(id > last);
            last = id;
        }
        assert_eq!(counter.current(board).await.unwrap(), Some(20));
    }

    #[tokio::test]
    async fn test_boards_are_independent() {
        let (connection, _) = memory_connection();
        let counter = SequenceCounter::new(connection);

        assert_eq!(counter.next(BoardId::new(1)).await.unwrap(), 1);
        assert_eq!(counter.next(BoardId::new(1)).await.unwrap(), 2);
        assert_eq!(counter.next(BoardId::new(2)).await.unwrap(), 1);
        assert_eq!(counter.current(BoardId::new(3)).await.unwrap(), None);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_callers_never_collide() {
        let (connection, _) = memory_connection();
        let counter = SequenceCounter::new(connection);
        let board = BoardId::new(9);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let counter = counter.clone();
                tokio::spawn(async move {
                    let mut ids = Vec::new();
                    for _ in 0..50 {
                        ids.push(counter.next(board).await.unwrap());
                    }
                    ids
                })
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.await.unwrap() {
                assert!(seen.insert(id), "duplicate id {}", id);
            }
        }
        assert_eq!(seen.len(), 400);
        assert_eq!(seen.iter().max(), Some(&400));
    }

    #[tokio::test]
    async fn test_expired_counter_starts_new_series() {
        let (connection, _) = memory_connection();
        let counter = SequenceCounter::new(connection);
        let board = BoardId::new(5);

        counter.next(board).await.unwrap();
        counter.next(board).await.unwrap();
        assert!(counter.touch(board, Duration::from_millis(1)).await.unwrap());

        std::thread::sleep(Duration::from_millis(10));

        assert_eq!(counter.current(board).await.unwrap(), None);
        assert_eq!(counter.next(board).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_garbage_counter_is_malformed() {
        let (connection, backend) = memory_connection();
        let counter = SequenceCounter::new(connection);
        let board = BoardId::new(3);

        backend
            .set_ex(&keys::sequence(board), "not-a-number", Duration::from_secs(60))
            .await
            .unwrap();

        assert!(matches!(counter.current(board).await, Err(Error::MalformedRecord(_))));
    }

    #[tokio::test]
    async fn test_unavailable_store() {
        let counter = SequenceCounter::new(Arc::new(ConnectionManager::unconfigured()));

        let err = counter.next(BoardId::new(1)).await.unwrap_err();
        assert!(err.is_unavailable());
    }
}
