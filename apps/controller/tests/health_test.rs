//! Integration tests for the plain HTTP endpoints

mod common;

use axum::{body::Body, http::Request, http::StatusCode, Router};
use thermo_controller::{Config, ConnectionManager, ControllerSynchronizer, HistoryStore};
use tower::ServiceExt;

fn create_test_app() -> Router {
    let sync = ControllerSynchronizer::new(&Config::default(), ConnectionManager::new());
    thermo_controller::router(sync, HistoryStore::new())
}

async fn get(app: Router, uri: &str) -> axum::response::Response {
    app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

#[tokio::test]
async fn test_root_endpoint() {
    let response = get(create_test_app(), "/").await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&body[..], thermo_controller::BANNER.as_bytes());
}

#[tokio::test]
async fn test_simple_health_check() {
    let response = get(create_test_app(), "/health").await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&body[..], b"OK");
}

#[tokio::test]
async fn test_liveness_reports_connections() {
    let response = get(create_test_app(), "/health/live").await;
    assert_eq!(response.status(), StatusCode::OK);

    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(content_type.contains("application/json"));

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "alive");
    assert!(json["version"].is_string());
    assert_eq!(json["clients"], 0);
}

#[tokio::test]
async fn test_nonexistent_route_returns_404() {
    let response = get(create_test_app(), "/nonexistent").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_ws_requires_upgrade() {
    let response = get(create_test_app(), "/ws").await;
    assert!(response.status().is_client_error());
}
