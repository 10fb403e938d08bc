//! Tests for `AppError` → HTTP response mapping. They call `IntoResponse`
//! directly, without a router.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use http_body_util::BodyExt;
use rundown_api::error::AppError;
use rundown_core::error::CoreError;

async fn error_to_response(err: AppError) -> (StatusCode, serde_json::Value) {
    let response = err.into_response();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    (status, json)
}

#[tokio::test]
async fn not_found_returns_404() {
    let (status, json) = error_to_response(CoreError::not_found("Part", "p1").into()).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "NOT_FOUND");
    assert_eq!(json["error"], "Part with id p1 not found");
}

#[tokio::test]
async fn already_exists_returns_409() {
    let (status, json) =
        error_to_response(CoreError::already_exists("Segment", "s1").into()).await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["code"], "ALREADY_EXISTS");
}

#[tokio::test]
async fn already_active_names_the_active_rundown() {
    let err = CoreError::AlreadyActive {
        rundown_id: "evening".into(),
    };
    let (status, json) = error_to_response(err.into()).await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["code"], "ALREADY_ACTIVE");
    assert_eq!(json["error"], "Rundown evening is already active");
}

#[tokio::test]
async fn invalid_state_returns_409() {
    let err = CoreError::InvalidState("rundown show is not active".into());
    let (status, json) = error_to_response(err.into()).await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["code"], "INVALID_STATE");
    assert_eq!(json["error"], "rundown show is not active");
}

#[tokio::test]
async fn validation_returns_400() {
    let err = CoreError::Validation("rank 1 is already taken".into());
    let (status, json) = error_to_response(err.into()).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn unsupported_returns_501() {
    let err = CoreError::UnsupportedOperation("lookup by part id".into());
    let (status, _) = error_to_response(err.into()).await;

    assert_eq!(status, StatusCode::NOT_IMPLEMENTED);
}

#[tokio::test]
async fn internal_error_is_sanitized() {
    let err = CoreError::Internal("connection string postgres://secret".into());
    let (status, json) = error_to_response(err.into()).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["code"], "INTERNAL_ERROR");
    assert!(!json.to_string().contains("secret"));
}

#[tokio::test]
async fn bad_request_returns_400() {
    let (status, json) = error_to_response(AppError::BadRequest("bad mode".into())).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "BAD_REQUEST");
    assert_eq!(json["error"], "bad mode");
}
