use axum::{
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use lapse_core::config::LapseConfig;
use lapse_pipeline::{CaptureTask, LifecycleController};
use std::sync::Arc;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};

/// Central shared state, passed as Arc<AppState> to all Axum handlers.
pub struct AppState {
    pub config: LapseConfig,
    pub lifecycle: LifecycleController,
    /// Also bound to the capture job; handlers only use it for listing.
    pub capture: Arc<CaptureTask>,
}

impl AppState {
    pub fn new(
        config: LapseConfig,
        lifecycle: LifecycleController,
        capture: Arc<CaptureTask>,
    ) -> Self {
        Self {
            config,
            lifecycle,
            capture,
        }
    }
}

/// Assemble the full Axum router.
///
/// Fails only when the configured CORS origin is not a valid header value.
pub fn build_router(state: Arc<AppState>) -> anyhow::Result<Router> {
    let cors = cors_layer(&state.config.gateway.cors_origin)?;

    Ok(Router::new()
        .route("/health", get(crate::http::health::health_handler))
        .route(
            "/start_screenshot",
            post(crate::http::control::start_screenshot),
        )
        .route(
            "/stop_screenshot",
            post(crate::http::control::stop_screenshot),
        )
        .route(
            "/screenshots",
            get(crate::http::screenshots::list_screenshots),
        )
        .with_state(state)
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http()))
}

/// One allowed browser origin, credentials on, any method and header.
fn cors_layer(origin: &str) -> anyhow::Result<CorsLayer> {
    let origin: HeaderValue = origin
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid cors_origin {origin:?}: {e}"))?;
    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::exact(origin))
        .allow_credentials(true)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request()))
}
