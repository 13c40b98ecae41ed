//! HTTP route handlers for the thermostat controller
//!
//! - Health check endpoints
//! - Chart backfill endpoints

pub mod health;
pub mod history;

pub use health::{health_router, HealthState};
pub use history::history_router;
