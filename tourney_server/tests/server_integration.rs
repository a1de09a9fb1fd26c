//! Integration tests for the HTTP surface of the server.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use std::sync::Arc;
use tourney_engine::broadcast::{BroadcastHub, HubHandle};
use tourney_engine::db::MemoryStore;
use tourney_engine::tournament::TournamentManager;
use tourney_server::api::{AppState, create_router};
use tower::ServiceExt; // For `oneshot` method

fn create_test_app() -> (axum::Router, HubHandle) {
    let hub = BroadcastHub::spawn(64);
    let manager = TournamentManager::new(Arc::new(MemoryStore::new()), hub.clone());
    (create_router(AppState::new(manager, 8)), hub)
}

async fn get_json(app: axum::Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&body).unwrap())
}

// ============================================================================
// Health Check Tests
// ============================================================================

#[tokio::test]
async fn test_health_check_endpoint() {
    let (app, _hub) = create_test_app();

    let (status, body) = get_json(app, "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["database"], true);
    assert_eq!(body["broadcast"], true);
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn test_health_check_reports_stopped_hub() {
    let (app, hub) = create_test_app();
    hub.shutdown().await;

    let (status, body) = get_json(app, "/health").await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "unhealthy");
    assert_eq!(body["broadcast"], false);
}

#[tokio::test]
async fn test_websocket_route_requires_upgrade() {
    let (app, _hub) = create_test_app();

    let request = Request::builder()
        .uri("/ws/tournaments/1")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert!(response.status().is_client_error());
}

#[tokio::test]
async fn test_unknown_route() {
    let (app, _hub) = create_test_app();

    let request = Request::builder()
        .uri("/api/tables")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
