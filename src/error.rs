//! Error types for the conversation backend

use thiserror::Error;

/// Result type alias for backend operations
pub type Result<T> = std::result::Result<T, ServiceError>;

#[derive(Error, Debug)]
pub enum ServiceError {

    // =============================
    // Domain Errors
    // =============================

    /// A conversation or message id did not resolve. Surfaced to the
    /// caller as-is, never retried.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Malformed input, rejected before it reaches the core.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The external completion provider failed. Kept distinct from
    /// NotFound so callers can tell "bad input" from "provider down".
    #[error("Completion provider error: {0}")]
    Provider(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Unknown error: {0}")]
    Unknown(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
