#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use rundown_core::model::{Part, Rundown, Segment};
use rundown_db::memory::InMemoryStore;
use rundown_db::repositories::RundownRepository;
use rundown_events::EventBus;
use rundown_ingest::{IngestConfig, IngestQueue};
use rundown_playout::{Collaborators, RundownLocks, RundownStateMachine};
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use rundown_api::config::ServerConfig;
use rundown_api::router::build_app_router;
use rundown_api::state::AppState;

/// Build a test `ServerConfig` with the development CORS origin.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 1,
    }
}

/// The application under test together with handles to its internals.
pub struct TestApp {
    pub router: Router,
    pub store: Arc<InMemoryStore>,
    pub state: AppState,
    cancel: CancellationToken,
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Build the full application router over an in-memory store, with the
/// same middleware stack the binary uses.
pub fn build_test_app() -> TestApp {
    let config = test_config();
    let store = Arc::new(InMemoryStore::new());
    let machine = RundownStateMachine::new(
        Collaborators::with_store(store.clone(), Arc::new(EventBus::default())),
        Arc::new(RundownLocks::new()),
    );
    let cancel = CancellationToken::new();
    let (ingest, _handle) = IngestQueue::spawn(machine.clone(), IngestConfig::default(), cancel.clone());

    let state = AppState {
        pool: None,
        config: Arc::new(config.clone()),
        machine,
        ingest,
    };
    TestApp {
        router: build_app_router(state.clone(), &config),
        store,
        state,
        cancel,
    }
}

/// Three parts over two segments.
pub fn show(id: &str) -> Rundown {
    Rundown::new(id, "Morning Show")
        .with_segment(
            Segment::new(format!("{id}-s1"), id, 1.0)
                .with_part(Part::new(format!("{id}-p1"), "", 1.0))
                .with_part(Part::new(format!("{id}-p2"), "", 2.0)),
        )
        .with_segment(
            Segment::new(format!("{id}-s2"), id, 2.0)
                .with_part(Part::new(format!("{id}-p3"), "", 1.0)),
        )
}

pub async fn seed(app: &TestApp, rundown: Rundown) {
    app.store.create(&rundown).await.unwrap();
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn send(app: &TestApp, request: Request<Body>) -> Response<Body> {
    app.router.clone().oneshot(request).await.unwrap()
}

pub async fn get(app: &TestApp, uri: &str) -> Response<Body> {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    send(app, request).await
}

pub async fn delete(app: &TestApp, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method("DELETE")
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

pub async fn post(app: &TestApp, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

pub async fn post_json(app: &TestApp, uri: &str, body: serde_json::Value) -> Response<Body> {
    json_request(app, "POST", uri, body).await
}

pub async fn put_json(app: &TestApp, uri: &str, body: serde_json::Value) -> Response<Body> {
    json_request(app, "PUT", uri, body).await
}

async fn json_request(
    app: &TestApp,
    method: &str,
    uri: &str,
    body: serde_json::Value,
) -> Response<Body> {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
