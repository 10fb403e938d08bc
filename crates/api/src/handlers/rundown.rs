//! Handlers for the `/rundowns` resource: catalogue queries and the
//! operator-facing playout transitions.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use rundown_core::model::{CursorOwner, Part, Piece, Rundown, RundownSummary};
use rundown_core::timeline::Timeline;
use rundown_playout::InsertMode;
use serde::Deserialize;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

/// Body of `PUT /rundowns/{id}/next`.
#[derive(Debug, Deserialize)]
pub struct SetNextRequest {
    pub segment_id: String,
    pub part_id: String,
}

/// Where an ad-lib goes, from the `mode` query parameter.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdlibMode {
    OnAir,
    #[default]
    Next,
}

impl From<AdlibMode> for InsertMode {
    fn from(mode: AdlibMode) -> Self {
        match mode {
            AdlibMode::OnAir => InsertMode::OnAir,
            AdlibMode::Next => InsertMode::Next,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AdlibQuery {
    #[serde(default)]
    pub mode: AdlibMode,
}

/// GET /api/v1/rundowns
pub async fn list(State(state): State<AppState>) -> AppResult<Json<DataResponse<Vec<RundownSummary>>>> {
    let rundowns = state.machine.list().await?;
    Ok(Json(DataResponse { data: rundowns }))
}

/// GET /api/v1/rundowns/{id}
pub async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<DataResponse<Rundown>>> {
    let rundown = state.machine.get(&id).await?;
    Ok(Json(DataResponse { data: rundown }))
}

/// DELETE /api/v1/rundowns/{id}
///
/// Returns 409 while the Rundown is active.
pub async fn delete(State(state): State<AppState>, Path(id): Path<String>) -> AppResult<StatusCode> {
    state.machine.delete_rundown(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/rundowns/{id}/timeline
pub async fn timeline(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<DataResponse<Timeline>>> {
    let timeline = state.machine.timeline(&id).await?;
    Ok(Json(DataResponse { data: timeline }))
}

/// POST /api/v1/rundowns/{id}/activate
///
/// Returns 409 if any Rundown is already active.
pub async fn activate(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<DataResponse<Rundown>>> {
    let rundown = state.machine.activate(&id).await?;
    Ok(Json(DataResponse { data: rundown }))
}

/// POST /api/v1/rundowns/{id}/deactivate
pub async fn deactivate(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<DataResponse<Rundown>>> {
    let rundown = state.machine.deactivate(&id).await?;
    Ok(Json(DataResponse { data: rundown }))
}

/// POST /api/v1/rundowns/{id}/take
pub async fn take(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<DataResponse<Rundown>>> {
    let rundown = state.machine.take_next(&id).await?;
    Ok(Json(DataResponse { data: rundown }))
}

/// POST /api/v1/rundowns/{id}/reset
pub async fn reset(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<DataResponse<Rundown>>> {
    let rundown = state.machine.reset(&id).await?;
    Ok(Json(DataResponse { data: rundown }))
}

/// PUT /api/v1/rundowns/{id}/next
///
/// The cursor is recorded as operator-owned.
pub async fn set_next(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<SetNextRequest>,
) -> AppResult<Json<DataResponse<Rundown>>> {
    let rundown = state
        .machine
        .set_next(&id, &body.segment_id, &body.part_id, CursorOwner::External)
        .await?;
    Ok(Json(DataResponse { data: rundown }))
}

/// POST /api/v1/rundowns/{id}/adlib/parts?mode=on_air|next
pub async fn insert_part(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<AdlibQuery>,
    Json(part): Json<Part>,
) -> AppResult<(StatusCode, Json<DataResponse<Rundown>>)> {
    let rundown = state.machine.insert_part(&id, part, query.mode.into()).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: rundown })))
}

/// POST /api/v1/rundowns/{id}/adlib/pieces?mode=on_air|next
pub async fn insert_piece(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<AdlibQuery>,
    Json(piece): Json<Piece>,
) -> AppResult<(StatusCode, Json<DataResponse<Rundown>>)> {
    let rundown = state.machine.insert_piece(&id, piece, query.mode.into()).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: rundown })))
}
