//! Error types for audit operations.

use thiserror::Error;

/// Errors produced by audit sinks and the emitter.
#[derive(Debug, Error)]
pub enum AuditError {
    /// The event could not be serialized to JSON.
    #[error("event serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The sink could not persist the event.
    #[error("sink write failed: {0}")]
    SinkWrite(String),
}

/// Result type for audit operations.
pub type AuditResult<T> = Result<T, AuditError>;
