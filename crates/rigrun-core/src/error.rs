//! Error types for core operations.

use thiserror::Error;

/// Errors produced by core types and the atomic writer.
#[derive(Debug, Error)]
pub enum CoreError {
    /// An atomic write failed at some stage.
    #[error("atomic write of {path} failed during {stage}: {source}")]
    AtomicWrite {
        /// Target path of the write.
        path: String,
        /// Stage that failed (create, write, sync, rename, dir-sync).
        stage: &'static str,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A string could not be parsed as a [`Tier`](crate::Tier).
    #[error("unknown tier '{0}'")]
    UnknownTier(String),

    /// A string could not be parsed as a classification level.
    #[error("unknown classification level '{0}'")]
    UnknownClassification(String),

    /// The rigrun home directory could not be resolved.
    #[error("home directory resolution failed: {0}")]
    HomeResolution(String),
}

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;
