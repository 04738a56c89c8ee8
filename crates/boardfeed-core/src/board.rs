//! Board identity and snapshot types

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Board identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BoardId(u64);

impl BoardId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl From<u64> for BoardId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl FromStr for BoardId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        s.parse().map(Self)
    }
}

impl std::fmt::Display for BoardId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Full serialized board state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot(serde_json::Value);

impl Snapshot {
    pub fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    /// Serialize any board model into a snapshot
    pub fn from_serializable<T: Serialize + ?Sized>(state: &T) -> Result<Self> {
        serde_json::to_value(state)
            .map(Self)
            .map_err(|e| Error::Snapshot(e.to_string()))
    }

    pub fn as_value(&self) -> &serde_json::Value {
        &self.0
    }

    pub fn into_value(self) -> serde_json::Value {
        self.0
    }
}

impl From<serde_json::Value> for Snapshot {
    fn from(value: serde_json::Value) -> Self {
        Self(value)
    }
}

/// What the publisher needs to know about a board.
///
/// Implemented by the domain layer; the core never looks inside a board
/// beyond its id and its serialized form.
pub trait BoardState {
    fn board_id(&self) -> BoardId;

    /// Compute a fresh full serialization of the board
    fn snapshot(&self) -> Result<Snapshot>;
}

/// Adapts any serializable board model to [`BoardState`]
#[derive(Debug)]
pub struct BoardRef<'a, T: ?Sized> {
    id: BoardId,
    state: &'a T,
}

impl<'a, T: ?Sized> BoardRef<'a, T> {
    pub fn new(id: BoardId, state: &'a T) -> Self {
        Self { id, state }
    }
}

impl<T: Serialize + ?Sized> BoardState for BoardRef<'_, T> {
    fn board_id(&self) -> BoardId {
        self.id
    }

    fn snapshot(&self) -> Result<Snapshot> {
        Snapshot::from_serializable(self.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_board_id_parse() {
        assert_eq!("42".parse::<BoardId>().unwrap(), BoardId::new(42));
        assert!("board-42".parse::<BoardId>().is_err());
        assert!("-1".parse::<BoardId>().is_err());
    }

    #[test]
    fn test_board_ref_snapshot() {
        let state = json!({ "name": "Sprint", "columns": [] });
        let board = BoardRef::new(BoardId::new(7), &state);

        assert_eq!(board.board_id(), BoardId::new(7));
        assert_eq!(board.snapshot().unwrap().as_value(), &state);
    }

    #[test]
    fn test_snapshot_serializes_transparently() {
        let snapshot = Snapshot::new(json!({ "name": "Sprint" }));
        assert_eq!(serde_json::to_string(&snapshot).unwrap(), r#"{"name":"Sprint"}"#);
    }
}
