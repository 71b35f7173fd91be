//! Common error types for qsync

use thiserror::Error;

/// Common result type for qsync operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the qsync crates
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored row payload could not be encoded or decoded
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested sheet, row or column not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Header list and row values have different lengths
    #[error("Schema mismatch: {headers} headers but {values} values")]
    SchemaMismatch { headers: usize, values: usize },
}
