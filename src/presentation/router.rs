use crate::presentation::app_state::AppState;
use crate::presentation::handlers::{
    disconnect, get_status, health_check, set_indicator, stream_status, submit_frame,
};
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Large enough for a 1920x1080 RGBA frame.
const MAX_FRAME_BYTES: usize = 16 * 1024 * 1024;

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(health_check))
        .route("/status", get(get_status))
        .route("/status/stream", get(stream_status))
        .route(
            "/frames",
            post(submit_frame).layer(DefaultBodyLimit::max(MAX_FRAME_BYTES)),
        )
        .route("/indicator", post(set_indicator))
        .route("/disconnect", post(disconnect))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
