//! Error types for lockout operations.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors produced by the lockout manager.
#[derive(Debug, Error)]
pub enum LockoutError {
    /// The identifier is locked out.
    #[error("identifier is locked{}", lock_suffix(.until))]
    Locked {
        /// When the lock expires; `None` for instant-lockout policies.
        until: Option<DateTime<Utc>>,
    },

    /// The manager is in paranoid mode; all access is refused until an
    /// operator clears it with an audited reason.
    #[error("paranoid mode active; operations refused")]
    ParanoidMode,

    /// On-disk state failed integrity verification.
    #[error("lockout state integrity check failed: {0}")]
    Integrity(String),

    /// The state key could not be created or read. Fatal for the
    /// subsystem; no fallback key exists.
    #[error("lockout state key unavailable: {0}")]
    KeyUnavailable(String),

    /// State (de)serialization failed.
    #[error("lockout state encoding failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// State file I/O failed.
    #[error("lockout state I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// An atomic write failed.
    #[error(transparent)]
    AtomicWrite(#[from] rigrun_core::CoreError),
}

fn lock_suffix(until: &Option<DateTime<Utc>>) -> String {
    until
        .map(|t| format!(" until {}", t.to_rfc3339()))
        .unwrap_or_default()
}

/// Result type for lockout operations.
pub type LockoutResult<T> = Result<T, LockoutError>;
