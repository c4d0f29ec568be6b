//! Relay to the real-time detection companion.
//!
//! Companion failures surface as `502 Bad Gateway`.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use sightline_core::realtime::{CompanionStatus, Detection, FeedbackReply, FrameSnapshot};
use utoipa::OpenApi;

use crate::error::ServerError;
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(start, stop, frame, feedback),
    components(schemas(CompanionStatus, Detection, FrameSnapshot, FeedbackReply))
)]
pub struct RealtimeApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/realtime/start", get(start))
        .route("/realtime/stop", get(stop))
        .route("/realtime/frame", get(frame))
        .route("/realtime/feedback", post(feedback))
}

#[utoipa::path(
    get,
    path = "/v1/realtime/start",
    tag = "realtime",
    responses(
        (status = 200, description = "Companion status", body = CompanionStatus),
        (status = 502, description = "Companion unreachable"),
    )
)]
pub async fn start(State(state): State<Arc<AppState>>) -> Result<Json<CompanionStatus>, ServerError> {
    Ok(Json(state.realtime.start().await?))
}

#[utoipa::path(
    get,
    path = "/v1/realtime/stop",
    tag = "realtime",
    responses(
        (status = 200, description = "Companion status", body = CompanionStatus),
        (status = 502, description = "Companion unreachable"),
    )
)]
pub async fn stop(State(state): State<Arc<AppState>>) -> Result<Json<CompanionStatus>, ServerError> {
    Ok(Json(state.realtime.stop().await?))
}

#[utoipa::path(
    get,
    path = "/v1/realtime/frame",
    tag = "realtime",
    responses(
        (status = 200, description = "Latest frame and detections", body = FrameSnapshot),
        (status = 502, description = "Companion unreachable"),
    )
)]
pub async fn frame(State(state): State<Arc<AppState>>) -> Result<Json<FrameSnapshot>, ServerError> {
    Ok(Json(state.realtime.frame().await?))
}

#[utoipa::path(
    post,
    path = "/v1/realtime/feedback",
    tag = "realtime",
    responses(
        (status = 200, description = "Feedback on the current frame", body = FeedbackReply),
        (status = 502, description = "Companion unreachable"),
    )
)]
pub async fn feedback(State(state): State<Arc<AppState>>) -> Result<Json<FeedbackReply>, ServerError> {
    Ok(Json(state.realtime.request_feedback().await?))
}
