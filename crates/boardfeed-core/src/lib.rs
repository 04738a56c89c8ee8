//! boardfeed core - per-board update distribution
//!
//! This crate provides the write and read paths of the realtime feed:
//! - Monotonic per-board sequence ids
//! - A bounded, expiring event log with cursor-based fetch
//! - A single-slot snapshot cache per board
//! - A best-effort publisher that never fails its caller

pub mod board;
pub mod envelope;
pub mod error;
pub mod event_log;
pub mod hub;
pub mod keys;
pub mod publisher;
pub mod retention;
pub mod sequence;
pub mod snapshot;

#[cfg(test)]
pub(crate) mod testing;

pub use board::{BoardId, BoardRef, BoardState, Snapshot};
pub use envelope::{Envelope, EventPayload, PendingEnvelope, UpdateBatch};
pub use error::{Error, Result};
pub use event_log::EventLog;
pub use hub::UpdateHub;
pub use publisher::{PublishObserver, SnapshotMode, UpdatePublisher};
pub use retention::RetentionPolicy;
pub use sequence::SequenceCounter;
pub use snapshot::SnapshotCache;
