//! Route definitions for the `/ingest` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::ingest;
use crate::state::AppState;

/// ```text
/// POST /         -> enqueue
/// GET  /stats    -> stats
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(ingest::enqueue))
        .route("/stats", get(ingest::stats))
}
