//! Error types for qsync-engine
//!
//! Pipeline errors abort a single row's run and are caught at the handler
//! boundary; they never abort sibling rows. Store failures are not errors at
//! this level: they are folded into per-target outcomes by the dispatcher.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Failure of one row's pipeline run
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Header and value arrays have different lengths
    #[error("Schema mismatch: {headers} headers but {values} values")]
    SchemaMismatch { headers: usize, values: usize },

    /// A column the pipeline must write to is absent from the table
    #[error("Missing column: {0}")]
    MissingColumn(String),

    /// Table read/write failure
    #[error("Table error: {0}")]
    Table(qsync_common::Error),

    /// Anything else, e.g. a panicked row task
    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

impl From<qsync_common::Error> for PipelineError {
    fn from(err: qsync_common::Error) -> Self {
        match err {
            qsync_common::Error::SchemaMismatch { headers, values } => {
                PipelineError::SchemaMismatch { headers, values }
            }
            other => PipelineError::Table(other),
        }
    }
}

pub type PipelineResult<T> = std::result::Result<T, PipelineError>;

/// HTTP adapter error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Event worker is not running (503)
    #[error("Worker unavailable: {0}")]
    Unavailable(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, "UNAVAILABLE", msg),
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;
