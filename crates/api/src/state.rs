use std::sync::Arc;

use rundown_ingest::IngestQueue;
use rundown_playout::RundownStateMachine;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable: everything inside is behind an `Arc` or is a handle.
#[derive(Clone)]
pub struct AppState {
    /// PostgreSQL pool, when the server runs against a database.
    pub pool: Option<rundown_db::DbPool>,
    pub config: Arc<ServerConfig>,
    pub machine: Arc<RundownStateMachine>,
    pub ingest: IngestQueue,
}
