//! Error types for the Dalitz amplitude workspace

use thiserror::Error;

/// Workspace error type
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Malformed external input (piecewise-wave tables, event files).
    ///
    /// Fatal to model construction: no partial model is ever returned.
    #[error("Parse error: {0}")]
    Parse(String),

    /// The density integral over the physical region is zero or not finite.
    #[error("Degenerate normalization: {0}")]
    DegenerateNormalization(String),

    /// Invalid configuration or argument
    #[error("Validation error: {0}")]
    Validation(String),

    /// Computation error
    #[error("Computation error: {0}")]
    Computation(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
