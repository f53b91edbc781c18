//! Liveness probe.

use crate::state::AppState;
use axum::{routing::get, Json, Router};
use serde_json::json;

pub fn router() -> Router<AppState> {
    Router::new().route("/healthy", get(healthy))
}

/// Returns 200 once the server is accepting connections. The probe sits
/// outside the guard chain on purpose.
async fn healthy() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}
