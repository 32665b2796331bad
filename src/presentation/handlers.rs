// HTTP request handlers
use crate::application::frame_loop::FrameOutcome;
use crate::application::pilot_service::LoopStatus;
use crate::domain::control::{Decision, IndicatorCommand};
use crate::domain::frame::{Frame, TextOverlay};
use crate::presentation::app_state::AppState;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    Json,
};
use bytes::Bytes;
use futures::stream::Stream;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_stream::wrappers::WatchStream;

#[derive(Deserialize)]
pub struct FrameQuery {
    pub width: u32,
    pub height: u32,
}

#[derive(Deserialize)]
pub struct IndicatorRequest {
    pub direction: i32,
}

/// What the display layer needs to draw over the frame it sent.
#[derive(Debug, Serialize)]
pub struct FrameResponse {
    pub width: u32,
    pub height: u32,
    pub label: String,
    pub decision: Option<Decision>,
    pub connected: bool,
    pub overlays: Vec<TextOverlay>,
}

impl From<FrameOutcome> for FrameResponse {
    fn from(outcome: FrameOutcome) -> Self {
        Self {
            width: outcome.annotated.frame.width,
            height: outcome.annotated.frame.height,
            label: outcome.label,
            decision: outcome.decision,
            connected: outcome.connected,
            overlays: outcome.annotated.overlays,
        }
    }
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<LoopStatus> {
    Json(state.pilot.status())
}

/// Push a status snapshot whenever it changes
pub async fn stream_status(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let stream = WatchStream::new(state.pilot.subscribe())
        .map(|status| Event::default().event("status").json_data(status));
    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// Run one raw RGBA frame through the control loop
pub async fn submit_frame(
    State(state): State<Arc<AppState>>,
    Query(query): Query<FrameQuery>,
    body: Bytes,
) -> Response {
    let frame = match Frame::new(query.width, query.height, body) {
        Ok(frame) => frame,
        Err(e) => return (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
    };

    match state.pilot.submit_frame(frame).await {
        Ok(outcome) => Json(FrameResponse::from(outcome)).into_response(),
        Err(e) => {
            tracing::error!("Dropping frame: {}", e);
            (StatusCode::SERVICE_UNAVAILABLE, e.to_string()).into_response()
        }
    }
}

pub async fn set_indicator(
    State(state): State<Arc<AppState>>,
    Json(request): Json<IndicatorRequest>,
) -> StatusCode {
    if !(-1..=1).contains(&request.direction) {
        return StatusCode::UNPROCESSABLE_ENTITY;
    }
    match state.pilot.indicate(IndicatorCommand::new(request.direction)).await {
        Ok(()) => StatusCode::ACCEPTED,
        Err(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

pub async fn disconnect(State(state): State<Arc<AppState>>) -> StatusCode {
    match state.pilot.disconnect().await {
        Ok(()) => StatusCode::ACCEPTED,
        Err(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}
