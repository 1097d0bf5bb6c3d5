//! Capture control endpoints: POST /start_screenshot, POST /stop_screenshot
//!
//! Both are idempotent and always succeed; they only flip scheduler state and
//! return immediately. Capture work happens later on the scheduler's timeline.
//!
//! Response: `{"message": "Screenshot taking started"}`

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::app::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageReply {
    pub message: String,
}

/// POST /start_screenshot: create or resume the capture and cleanup jobs.
pub async fn start_screenshot(State(state): State<Arc<AppState>>) -> Json<MessageReply> {
    Json(MessageReply {
        message: state.lifecycle.start().to_string(),
    })
}

/// POST /stop_screenshot: pause both jobs.
pub async fn stop_screenshot(State(state): State<Arc<AppState>>) -> Json<MessageReply> {
    Json(MessageReply {
        message: state.lifecycle.stop().to_string(),
    })
}
