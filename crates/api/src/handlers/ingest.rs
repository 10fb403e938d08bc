//! Handlers for the `/ingest` resource.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use rundown_ingest::{IngestChange, IngestStats};

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

/// POST /api/v1/ingest
///
/// Queues the change and returns 202 before it is applied.
pub async fn enqueue(
    State(state): State<AppState>,
    Json(change): Json<IngestChange>,
) -> AppResult<StatusCode> {
    tracing::debug!(change = change.label(), "Ingest change received");
    state.ingest.enqueue(change)?;
    Ok(StatusCode::ACCEPTED)
}

/// GET /api/v1/ingest/stats
pub async fn stats(State(state): State<AppState>) -> Json<DataResponse<IngestStats>> {
    Json(DataResponse {
        data: state.ingest.stats(),
    })
}
