//! Core error type.
//!
//! Adapter crates map their foreign errors into `CoreError`. None of these
//! ever reach the host page: the pipeline logs them and carries on.

use thiserror::Error;

/// Core layer error.
#[derive(Debug, Error)]
pub enum CoreError {
    /// JSON serialization or parsing failed
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Bad configuration value or file
    #[error("config error: {0}")]
    Config(String),

    /// Field validation failed
    #[error("validation failed for {field}: {message}")]
    Validation {
        /// Name of the rejected field
        field: String,
        /// Reason
        message: String,
    },

    /// Network error (connect failure, timeout)
    #[error("network error: {0}")]
    Network(String),

    /// An outbound channel refused or failed a payload
    #[error("{channel} transport failed: {message}")]
    Transport {
        /// Channel name ("beacon", "http", "sink")
        channel: String,
        /// Failure detail
        message: String,
    },

    /// The host lacks a capability the operation needs
    #[error("unsupported environment: {0}")]
    Unsupported(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Unexpected internal state
    #[error("internal error: {0}")]
    Internal(String),
}
