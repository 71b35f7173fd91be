//! HTTP adapter
//!
//! Converts native edit notifications from the hosting environment into
//! [`RowChanged`] messages for the serial worker, and exposes the manual
//! resync operations. A change event may carry the new cell `value`, in which
//! case the worker writes it before handling the event.

use crate::error::{ApiError, ApiResult};
use crate::worker::{WorkerError, WorkerHandle};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use qsync_common::{CellValue, RowChanged};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Instant;
use tower_http::trace::TraceLayer;
use tracing::debug;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub worker: WorkerHandle,
    pub startup_time: Instant,
}

impl AppState {
    pub fn new(worker: WorkerHandle) -> Self {
        Self {
            worker,
            startup_time: Instant::now(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub module: String,
    pub version: String,
    pub uptime_seconds: u64,
}

/// Body of `POST /events/row-changed`
#[derive(Debug, Deserialize)]
pub struct RowChangedRequest {
    #[serde(flatten)]
    pub event: RowChanged,
    /// Scalar to write into the edited cell; absent or null means the host
    /// already holds the value. Send `""` to clear a cell.
    #[serde(default)]
    pub value: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct AcceptedResponse {
    pub queued: bool,
}

#[derive(Debug, Serialize)]
pub struct SummaryResponse {
    pub message: String,
}

impl From<WorkerError> for ApiError {
    fn from(err: WorkerError) -> Self {
        ApiError::Unavailable(err.to_string())
    }
}

/// GET /health
async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        module: "qsync".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.startup_time.elapsed().as_secs(),
    })
}

/// POST /events/row-changed
///
/// Queues the event and returns 202; handling happens on the worker.
async fn row_changed(
    State(state): State<AppState>,
    Json(request): Json<RowChangedRequest>,
) -> ApiResult<(StatusCode, Json<AcceptedResponse>)> {
    let RowChangedRequest { event, value } = request;
    if event.column.trim().is_empty() {
        return Err(ApiError::BadRequest("column must not be empty".to_string()));
    }
    let value = value
        .map(|v| {
            CellValue::from_json(&v)
                .ok_or_else(|| ApiError::BadRequest("value must be a string, number or boolean".to_string()))
        })
        .transpose()?;
    debug!(
        sheet = %event.sheet,
        row = event.row,
        column = %event.column,
        with_value = value.is_some(),
        "Change event received"
    );
    match value {
        Some(value) => state.worker.submit_edit(event, value).await?,
        None => state.worker.submit(event).await?,
    }
    Ok((StatusCode::ACCEPTED, Json(AcceptedResponse { queued: true })))
}

/// POST /resync/row/:row
async fn resync_row(
    State(state): State<AppState>,
    Path(row): Path<u32>,
) -> ApiResult<Json<SummaryResponse>> {
    let message = state.worker.resync_row(row).await?;
    Ok(Json(SummaryResponse { message }))
}

/// POST /resync
async fn resync_all(State(state): State<AppState>) -> ApiResult<Json<SummaryResponse>> {
    let message = state.worker.resync_all().await?;
    Ok(Json(SummaryResponse { message }))
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/events/row-changed", post(row_changed))
        .route("/resync/row/:row", post(resync_row))
        .route("/resync", post(resync_all))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
