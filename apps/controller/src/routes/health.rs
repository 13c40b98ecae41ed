//! Health check HTTP route handlers
//!
//! - `GET /health` - Simple liveness check (returns 200 OK)
//! - `GET /health/live` - Liveness check with connection count

use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};

use crate::websocket::ControllerSynchronizer;

/// Shared state for health check handlers
#[derive(Clone)]
pub struct HealthState {
    pub sync: ControllerSynchronizer,
}

impl HealthState {
    pub fn new(sync: ControllerSynchronizer) -> Self {
        Self { sync }
    }
}

/// Create health check router
pub fn health_router(state: HealthState) -> Router {
    Router::new()
        .route("/", get(simple_health))
        .route("/live", get(liveness))
        .with_state(state)
}

/// Simple health check - always returns OK if the server is running
async fn simple_health() -> &'static str {
    "OK"
}

/// Liveness check
///
/// Reports the number of connected viewers alongside the version. Never
/// touches the sensor, so a failing check does not flap the process.
async fn liveness(State(state): State<HealthState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "alive",
        "version": env!("CARGO_PKG_VERSION"),
        "clients": state.sync.connections().connection_count(),
    }))
}
