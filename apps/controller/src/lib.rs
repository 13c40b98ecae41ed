//! Thermostat controller library
//!
//! Exposes the router and background services so integration tests can run
//! a real controller on a loopback port.

pub mod config;
pub mod error;
pub mod routes;
pub mod services;
pub mod websocket;

pub use config::Config;
pub use error::{ApiError, ApiResult, CommandError, ErrorResponse, StateError};
pub use services::HistoryStore;
pub use websocket::{ConnectionManager, ControllerSynchronizer};

use axum::{extract::Extension, routing::get, Router};
use tower_http::trace::TraceLayer;

use routes::{health_router, history_router, HealthState};

/// Banner served at `/`
pub const BANNER: &str = "Thermostat controller";

/// Build the controller's HTTP and WebSocket routes
pub fn router(sync: ControllerSynchronizer, history: HistoryStore) -> Router {
    Router::new()
        .route("/", get(root))
        // WebSocket sync channel
        .route("/ws", get(websocket::ws_handler))
        // Nested health routes: /health, /health/live
        .nest("/health", health_router(HealthState::new(sync.clone())))
        // Chart backfill: /data, /data/:since
        .nest("/data", history_router(history))
        .layer(Extension(sync))
        .layer(TraceLayer::new_for_http())
}

async fn root() -> &'static str {
    BANNER
}
