use axum::{extract::State, Json};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::app::AppState;

/// GET /health: liveness probe, returns pipeline state and job metadata.
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "commit": env!("LAPSE_GIT_SHA"),
        "running": state.lifecycle.is_running(),
        "jobs": state.lifecycle.jobs(),
    }))
}
