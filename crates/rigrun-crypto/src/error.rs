//! Error types for crypto operations.

use thiserror::Error;

/// Errors produced by state keys and the HMAC codec.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// A sealed blob failed integrity verification.
    #[error("integrity check failed: {0}")]
    IntegrityCheckFailed(String),

    /// A key file had the wrong length.
    #[error("invalid key length: expected {expected} bytes, got {actual}")]
    InvalidKeyLength {
        /// Expected byte count.
        expected: usize,
        /// Actual byte count.
        actual: usize,
    },

    /// The OS random source could not produce key material.
    ///
    /// This is fatal for the owning subsystem; no fallback key exists.
    #[error("random source failed: {0}")]
    RandomSourceFailed(String),

    /// I/O failure while reading or writing key material.
    #[error("key I/O failed: {0}")]
    IoError(String),
}

/// Result type for crypto operations.
pub type CryptoResult<T> = Result<T, CryptoError>;
