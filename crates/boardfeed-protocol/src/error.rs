//! Protocol error types

use thiserror::Error;

/// Protocol-specific errors
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Method not allowed: {0}")]
    MethodNotAllowed(String),

    #[error("Message too large: {size} > {max}")]
    MessageTooLarge { size: usize, max: usize },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Invalid JSON: {0}")]
    InvalidJson(String),
}

impl ProtocolError {
    /// HTTP status a server answers this error with
    pub fn status(&self) -> u16 {
        match self {
            ProtocolError::MalformedRequest(_) | ProtocolError::InvalidArgument(_) => 400,
            ProtocolError::NotFound(_) => 404,
            ProtocolError::MethodNotAllowed(_) => 405,
            ProtocolError::MessageTooLarge { .. } => 431,
            ProtocolError::MalformedResponse(_) | ProtocolError::InvalidJson(_) => 502,
        }
    }
}

/// Result type for protocol operations
pub type ProtocolResult<T> = Result<T, ProtocolError>;
