//! Error types for the sync engine.

use thiserror::Error;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors that can occur while handling a client request.
///
/// Validation and storage failures abort the handler without a broadcast
/// and without closing the connection; protocol failures (unparseable
/// frames) are handled upstream by the connection layer.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Storage error.
    #[error("storage error: {0}")]
    Storage(#[from] folio_storage::StorageError),

    /// Serialization error while encoding an outbound event.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Payload failed shape or referential validation.
    #[error("validation error: {0}")]
    Validation(String),
}

impl EngineError {
    /// Shorthand for a validation failure.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}
