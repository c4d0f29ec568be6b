//! Unified server error type.
//!
//! Handlers that can fail on request shape return `Result<T, ServerError>`,
//! which implements [`axum::response::IntoResponse`] so errors become a
//! JSON-body HTTP response with an appropriate status code. Service outcomes
//! (upload, describe, chat) are not errors: they are 200 responses that carry
//! their own `success` flag.
//!
//! Internal and upstream details are logged but never returned to the caller.

use axum::extract::multipart::MultipartError;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use sightline_core::CoreError;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum ServerError {
    /// The caller referenced a resource that does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The caller sent an invalid or malformed request.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The request body exceeded the configured size limit.
    #[error("payload too large: {0}")]
    PayloadTooLarge(String),

    /// A service we proxy to (the real-time companion) failed.
    #[error("upstream unavailable: {0}")]
    Upstream(String),

    /// An unclassified internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, client_message) = match &self {
            ServerError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
            ServerError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
            ServerError::PayloadTooLarge(m) => (StatusCode::PAYLOAD_TOO_LARGE, m.clone()),
            ServerError::Upstream(m) => {
                error!(error = %m, "upstream error");
                (
                    StatusCode::BAD_GATEWAY,
                    "upstream service unavailable".to_owned(),
                )
            }
            ServerError::Internal(m) => {
                error!(message = %m, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_owned(),
                )
            }
        };
        (status, Json(json!({ "error": client_message }))).into_response()
    }
}

impl From<CoreError> for ServerError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::NotFound(id) => ServerError::NotFound(format!("image {id} not found")),
            CoreError::Validation(m) => ServerError::BadRequest(m),
            CoreError::Upstream(m) => ServerError::Upstream(m),
            other => ServerError::Internal(other.to_string()),
        }
    }
}

impl From<MultipartError> for ServerError {
    fn from(e: MultipartError) -> Self {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ServerError::PayloadTooLarge(e.body_text())
        } else {
            ServerError::BadRequest(format!("invalid multipart body: {}", e.body_text()))
        }
    }
}

impl From<JsonRejection> for ServerError {
    fn from(e: JsonRejection) -> Self {
        ServerError::BadRequest(e.body_text())
    }
}
