//! HTTP/WebSocket surface of the tournament server.
//!
//! # Endpoints
//!
//! - `GET /health` - Server health status
//! - `GET /ws/tournaments/{tournament_id}` - Live bracket updates for one tournament
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tourney_engine::broadcast::BroadcastHub;
//! use tourney_engine::db::MemoryStore;
//! use tourney_engine::tournament::TournamentManager;
//! use tourney_server::api::{AppState, create_router};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let hub = BroadcastHub::spawn(1024);
//! let manager = TournamentManager::new(Arc::new(MemoryStore::new()), hub);
//! let app = create_router(AppState::new(manager, 32));
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # CORS
//!
//! CORS is configured permissively; viewers are read-only.

pub mod websocket;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::get,
};
use serde_json::json;
use tourney_engine::db::TournamentStore;
use tourney_engine::tournament::TournamentManager;
use tower_http::cors::CorsLayer;

/// Application state shared across all HTTP handlers and WebSocket connections.
///
/// Cloned per request; the manager is `Arc`-backed.
pub struct AppState<S: TournamentStore> {
    pub manager: TournamentManager<S>,
    /// Outbound queue length per viewer before it is dropped as too slow
    pub viewer_queue_capacity: usize,
}

impl<S: TournamentStore> AppState<S> {
    pub fn new(manager: TournamentManager<S>, viewer_queue_capacity: usize) -> Self {
        Self {
            manager,
            viewer_queue_capacity,
        }
    }
}

impl<S: TournamentStore> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            manager: self.manager.clone(),
            viewer_queue_capacity: self.viewer_queue_capacity,
        }
    }
}

/// Create the API router.
///
/// ```text
/// GET  /health                              - Health check
/// GET  /ws/tournaments/{tournament_id}      - Viewer websocket
/// ```
pub fn create_router<S: TournamentStore>(state: AppState<S>) -> Router {
    Router::new()
        .route("/health", get(health_check::<S>))
        .route(
            "/ws/tournaments/{tournament_id}",
            get(websocket::websocket_handler::<S>),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Health check endpoint for monitoring and load balancers.
///
/// Checks that the store answers and the broadcast hub loop is alive.
/// Returns `200 OK` if both are, `503 Service Unavailable` otherwise.
///
/// # Example
///
/// ```bash
/// curl http://localhost:6969/health
/// # {"status":"healthy","database":true,"broadcast":true,"timestamp":"2026-10-15T10:30:00Z"}
/// ```
async fn health_check<S: TournamentStore>(State(state): State<AppState<S>>) -> impl IntoResponse {
    let db_healthy = match state.manager.store().health_check().await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "Store health check failed");
            false
        }
    };

    // Any room id works; only whether the hub answers matters
    let hub_healthy = state.manager.hub().room_size(0).await.is_some();

    let overall_healthy = db_healthy && hub_healthy;
    let status_code = if overall_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = json!({
        "status": if overall_healthy { "healthy" } else { "unhealthy" },
        "version": env!("CARGO_PKG_VERSION"),
        "database": db_healthy,
        "broadcast": hub_healthy,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });

    (status_code, Json(response))
}
