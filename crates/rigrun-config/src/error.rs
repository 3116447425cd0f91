//! Error types for configuration operations.

use thiserror::Error;

/// Errors produced by loading, validating, or saving configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A field failed validation.
    #[error("invalid config: {field}: {message}")]
    ValidationError {
        /// Dotted path of the offending field.
        field: String,
        /// Human-readable description of the problem.
        message: String,
    },

    /// The config file could not be read or written.
    #[error("config I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// The config file could not be parsed as TOML.
    #[error("config TOML parse failed: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// The config could not be serialized to TOML.
    #[error("config TOML encode failed: {0}")]
    TomlEncode(#[from] toml::ser::Error),

    /// The config file could not be parsed as JSON.
    #[error("config JSON parse failed: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// An atomic write failed.
    #[error(transparent)]
    AtomicWrite(#[from] rigrun_core::CoreError),
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
