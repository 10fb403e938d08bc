use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use rundown_db::memory::InMemoryStore;
use rundown_db::pg::PgStore;
use rundown_events::{EventBus, EventPersistence};
use rundown_ingest::{IngestConfig, IngestQueue};
use rundown_playout::{Collaborators, RundownLocks, RundownStateMachine};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rundown_api::config::ServerConfig;
use rundown_api::router::build_app_router;
use rundown_api::state::AppState;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "rundown_api=debug,rundown_playout=debug,rundown_ingest=debug,tower_http=debug"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    let ingest_config = IngestConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Event bus ---
    let event_bus = Arc::new(EventBus::default());

    // --- Storage ---
    let mut persistence_handle = None;
    let (pool, collaborators) = match std::env::var("DATABASE_URL") {
        Ok(database_url) => {
            let pool = rundown_db::create_pool(&database_url)
                .await
                .expect("Failed to connect to database");
            tracing::info!("Database connection pool created");

            rundown_db::health_check(&pool)
                .await
                .expect("Database health check failed");

            rundown_db::run_migrations(&pool)
                .await
                .expect("Failed to run database migrations");
            tracing::info!("Database migrations applied");

            persistence_handle = Some(tokio::spawn(EventPersistence::run(
                pool.clone(),
                event_bus.subscribe(),
            )));

            let store = Arc::new(PgStore::new(pool.clone()));
            (Some(pool), Collaborators::with_store(store, Arc::clone(&event_bus)))
        }
        Err(_) => {
            tracing::warn!("DATABASE_URL not set, rundowns are kept in memory only");
            let store = Arc::new(InMemoryStore::new());
            (None, Collaborators::with_store(store, Arc::clone(&event_bus)))
        }
    };

    // --- Playout and ingest ---
    let machine = RundownStateMachine::new(collaborators, Arc::new(RundownLocks::new()));
    let ingest_cancel = CancellationToken::new();
    let (ingest, ingest_handle) =
        IngestQueue::spawn(Arc::clone(&machine), ingest_config, ingest_cancel.clone());

    // --- App state ---
    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        machine,
        ingest,
    };
    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");
    let grace = Duration::from_secs(config.shutdown_timeout_secs);

    ingest_cancel.cancel();
    let _ = tokio::time::timeout(grace, ingest_handle).await;
    tracing::info!("Ingest worker stopped");

    // The bus closes once the state machine and this handle are gone, which
    // lets persistence drain and exit.
    drop(event_bus);
    if let Some(handle) = persistence_handle {
        let _ = tokio::time::timeout(grace, handle).await;
        tracing::info!("Event persistence shut down");
    }

    tracing::info!("Graceful shutdown complete");
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
