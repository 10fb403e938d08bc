//! Route definitions for the `/rundowns` resource.

use axum::routing::{get, post, put};
use axum::Router;

use crate::handlers::rundown;
use crate::state::AppState;

/// Routes mounted at `/rundowns`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(rundown::list))
        .route("/{id}", get(rundown::get_by_id).delete(rundown::delete))
        .route("/{id}/timeline", get(rundown::timeline))
        .route("/{id}/activate", post(rundown::activate))
        .route("/{id}/deactivate", post(rundown::deactivate))
        .route("/{id}/take", post(rundown::take))
        .route("/{id}/reset", post(rundown::reset))
        .route("/{id}/next", put(rundown::set_next))
        .route("/{id}/adlib/parts", post(rundown::insert_part))
        .route("/{id}/adlib/pieces", post(rundown::insert_piece))
}
