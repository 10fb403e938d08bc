pub mod health;
pub mod ingest;
pub mod rundown;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /rundowns                          list
/// /rundowns/{id}                     get, delete
/// /rundowns/{id}/timeline            latest timeline
/// /rundowns/{id}/activate            activate (POST)
/// /rundowns/{id}/deactivate          deactivate (POST)
/// /rundowns/{id}/take                take next (POST)
/// /rundowns/{id}/reset               reset (POST)
/// /rundowns/{id}/next                set next (PUT)
/// /rundowns/{id}/adlib/parts         insert ad-lib part (POST, ?mode=on_air|next)
/// /rundowns/{id}/adlib/pieces        insert ad-lib piece (POST, ?mode=on_air|next)
///
/// /ingest                            enqueue change (POST)
/// /ingest/stats                      queue counters
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/rundowns", rundown::router())
        .nest("/ingest", ingest::router())
}
