//! Error types for boundary operations.

use thiserror::Error;

/// Errors produced by the boundary protector and policy store.
#[derive(Debug, Error)]
pub enum BoundaryError {
    /// The protector refused an outbound connection.
    #[error("boundary blocked {host}:{port}: {reason}")]
    Blocked {
        /// Destination host.
        host: String,
        /// Destination port.
        port: u16,
        /// Machine-readable reason (`host_not_allowed`, `host_blocked`,
        /// `port_not_allowed`).
        reason: &'static str,
    },

    /// No policy key is configured (or it is shorter than 32 bytes).
    ///
    /// Without a key, signing and verification both fail and the built-in
    /// default-deny policy stays in force.
    #[error("policy key not configured: {0}")]
    PolicyKeyNotConfigured(String),

    /// The policy file failed signature verification.
    #[error("policy tamper detected: {0}")]
    TamperDetected(String),

    /// A request URL had no parseable host.
    #[error("request URL has no host: {0}")]
    MissingHost(String),

    /// The underlying HTTP client failed.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// A request URL could not be parsed.
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Policy file I/O failed.
    #[error("policy I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// Policy (de)serialization failed.
    #[error("policy encoding failed: {0}")]
    Json(#[from] serde_json::Error),

    /// Key handling or signing failed.
    #[error(transparent)]
    Crypto(#[from] rigrun_crypto::CryptoError),

    /// An atomic write failed.
    #[error(transparent)]
    AtomicWrite(#[from] rigrun_core::CoreError),
}

/// Result type for boundary operations.
pub type BoundaryResult<T> = Result<T, BoundaryError>;
