//! Per-board key layout in the backing store

use crate::board::BoardId;

/// Bounded list of encoded envelopes
pub fn events(board: BoardId) -> String {
    format!("board:{}:events", board)
}

/// Sequence counter
pub fn sequence(board: BoardId) -> String {
    format!("board:{}:seq", board)
}

/// Latest snapshot slot
pub fn snapshot(board: BoardId) -> String {
    format!("board:{}:snapshot", board)
}
