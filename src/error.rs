//! Error types for corpus-bundler
//!
//! One crate-wide error enum with contextual variants for each failure
//! domain: configuration, record source, object storage, the TSV sink,
//! and local I/O.

use thiserror::Error;

/// Result type alias for corpus-bundler operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for corpus-bundler
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "export.pause_watermark")
        key: Option<String>,
    },

    /// Record source (database) error
    #[error("source error: {0}")]
    Source(#[from] sqlx::Error),

    /// Object storage error for a specific key
    #[error("storage error for '{key}': {reason}")]
    Storage {
        /// The object key the operation was addressing
        key: String,
        /// Why the operation failed (status code, timeout, truncated body, ...)
        reason: String,
    },

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TSV sink error
    #[error("sink error: {0}")]
    Sink(#[from] csv::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Locale bundling (archive creation or upload) error
    #[error("bundle error: {0}")]
    Bundle(String),

    /// Requested resource not found
    #[error("not found: {0}")]
    NotFound(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}
