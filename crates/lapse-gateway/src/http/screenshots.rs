//! Capture listing endpoint: GET /screenshots
//!
//! Read-through to the remote store; nothing is cached.
//!
//! Response: `{"photo_urls": ["https://...", ...]}`
//! Error:    `{"error": "..."}` with 502 (store failed) or 503 (not configured)

use axum::{extract::State, http::StatusCode, Json};
use lapse_pipeline::UploadError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

use crate::app::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct ScreenshotList {
    pub photo_urls: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorReply {
    pub error: String,
}

/// GET /screenshots: every locator stored under the capture folder.
pub async fn list_screenshots(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ScreenshotList>, (StatusCode, Json<ErrorReply>)> {
    match state.capture.list_captures().await {
        Ok(photo_urls) => Ok(Json(ScreenshotList { photo_urls })),
        Err(e) => {
            warn!(error = %e, "GET /screenshots failed");
            let status = match e {
                UploadError::NotConfigured => StatusCode::SERVICE_UNAVAILABLE,
                _ => StatusCode::BAD_GATEWAY,
            };
            Err((
                status,
                Json(ErrorReply {
                    error: e.to_string(),
                }),
            ))
        }
    }
}
