//! Error types for boardfeed core

use boardfeed_storage::StorageError;
use thiserror::Error;

/// Core error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Board snapshot failed: {0}")]
    Snapshot(String),

    #[error("Malformed stored record: {0}")]
    MalformedRecord(String),
}

impl Error {
    /// Short label used for log fields and metric labels
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Storage(e) => e.kind(),
            Error::Serialization(_) => "serialization",
            Error::Snapshot(_) => "snapshot",
            Error::MalformedRecord(_) => "malformed",
        }
    }

    /// The connection latch has tripped; the failure was already reported once
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Error::Storage(StorageError::Unavailable))
    }
}

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, Error>;
