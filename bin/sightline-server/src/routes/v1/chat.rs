use std::sync::Arc;

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::HeaderMap;
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use sightline_core::services::ChatOutcome;
use sightline_core::views::View;
use utoipa::OpenApi;

use crate::error::ServerError;
use crate::routes::v1::{is_fresh, json_with_etag, not_modified};
use crate::schemas::v1::chat::{ChatRequest, MessageResponse};
use crate::state::AppState;

/// Maximum accepted chat message length, in bytes.
const MAX_MESSAGE_BYTES: usize = 16 * 1024;

#[derive(OpenApi)]
#[openapi(
    paths(send_message, list_messages),
    components(schemas(ChatRequest, ChatOutcome, MessageResponse))
)]
pub struct ChatApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/chat", post(send_message))
        .route("/chat/messages", get(list_messages))
}

#[utoipa::path(
    post,
    path = "/v1/chat",
    tag = "chat",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "Assistant reply, or the apology on failure", body = ChatOutcome),
        (status = 400, description = "Empty, oversized or malformed message"),
    )
)]
pub async fn send_message(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatOutcome>, ServerError> {
    let Json(req) = payload?;
    if req.message.trim().is_empty() {
        return Err(ServerError::BadRequest("message must not be empty".into()));
    }
    if req.message.len() > MAX_MESSAGE_BYTES {
        return Err(ServerError::BadRequest(format!(
            "message too large ({} bytes); maximum is {MAX_MESSAGE_BYTES} bytes",
            req.message.len()
        )));
    }
    Ok(Json(state.chat.handle(&req.message).await))
}

#[utoipa::path(
    get,
    path = "/v1/chat/messages",
    tag = "chat",
    responses(
        (status = 200, description = "Transcript, oldest first", body = Vec<MessageResponse>),
        (status = 304, description = "Transcript unchanged since the given ETag"),
    )
)]
pub async fn list_messages(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let etag = state.views.etag(View::Chat);
    if is_fresh(&headers, &etag) {
        return not_modified(&etag);
    }
    let messages: Vec<MessageResponse> = state
        .chat
        .history()
        .await
        .iter()
        .map(MessageResponse::from)
        .collect();
    json_with_etag(&etag, messages)
}
