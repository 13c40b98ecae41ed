//! Chart backfill endpoints
//!
//! - `GET /data` - every buffered reading, oldest first
//! - `GET /data/:since` - readings strictly newer than `since` (Unix seconds)

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use thermo_protocol::HistoryRecord;

use crate::error::{ApiError, ApiResult};
use crate::services::HistoryStore;

/// Create the history router
pub fn history_router(store: HistoryStore) -> Router {
    Router::new()
        .route("/", get(all_records))
        .route("/:since", get(records_since))
        .with_state(store)
}

async fn all_records(State(store): State<HistoryStore>) -> Json<Vec<HistoryRecord>> {
    Json(store.all())
}

async fn records_since(
    State(store): State<HistoryStore>,
    Path(since): Path<String>,
) -> ApiResult<Json<Vec<HistoryRecord>>> {
    let since = parse_since(&since)?;
    Ok(Json(store.since(since)))
}

fn parse_since(raw: &str) -> ApiResult<f64> {
    match raw.trim().parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        Ok(_) => Err(ApiError::InvalidParam {
            name: "since",
            reason: "must be a finite number".to_string(),
        }),
        Err(e) => Err(ApiError::InvalidParam {
            name: "since",
            reason: e.to_string(),
        }),
    }
}
