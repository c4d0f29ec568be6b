pub mod chat;
pub mod images;
pub mod realtime;

use crate::state::AppState;
use utoipa::OpenApi;

use axum::Router;
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use std::sync::Arc;

/// Routes nested under `/v1`.
pub fn router(max_upload_bytes: usize) -> Router<Arc<AppState>> {
    Router::new()
        .merge(images::router(max_upload_bytes))
        .merge(chat::router())
        .merge(realtime::router())
}

#[derive(OpenApi)]
#[openapi()]
pub struct V1Api;

pub fn api_docs() -> utoipa::openapi::OpenApi {
    let mut doc = V1Api::openapi();
    doc.merge(images::ImagesApi::openapi());
    doc.merge(chat::ChatApi::openapi());
    doc.merge(realtime::RealtimeApi::openapi());
    doc
}

// ── Conditional GET ──────────────────────────────────────────────────────────

/// `true` when the request's `If-None-Match` already names `etag`.
pub(crate) fn is_fresh(headers: &HeaderMap, etag: &str) -> bool {
    headers
        .get_all(header::IF_NONE_MATCH)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(str::trim)
        .any(|tag| tag == "*" || tag == etag || tag.strip_prefix("W/") == Some(etag))
}

/// `304 Not Modified` carrying the current tag.
pub(crate) fn not_modified(etag: &str) -> Response {
    tagged(StatusCode::NOT_MODIFIED.into_response(), etag)
}

/// `200` JSON body carrying the revision it was rendered at.
pub(crate) fn json_with_etag<T: Serialize>(etag: &str, body: T) -> Response {
    tagged(Json(body).into_response(), etag)
}

fn tagged(mut response: Response, etag: &str) -> Response {
    if let Ok(value) = HeaderValue::from_str(etag) {
        response.headers_mut().insert(header::ETAG, value);
    }
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    response
}

#[cfg(test)]
mod test {
    use super::*;

    fn with_if_none_match(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::IF_NONE_MATCH, HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn matches_exact_weak_and_listed_tags() {
        let tag = "\"gallery-1f-3\"";
        assert!(is_fresh(&with_if_none_match("\"gallery-1f-3\""), tag));
        assert!(is_fresh(&with_if_none_match("W/\"gallery-1f-3\""), tag));
        assert!(is_fresh(&with_if_none_match("\"chat-1f-0\", \"gallery-1f-3\""), tag));
        assert!(is_fresh(&with_if_none_match("*"), tag));
    }

    #[test]
    fn stale_or_missing_tags_are_not_fresh() {
        let tag = "\"gallery-1f-3\"";
        assert!(!is_fresh(&with_if_none_match("\"gallery-1f-2\""), tag));
        assert!(!is_fresh(&HeaderMap::new(), tag));
    }

    #[test]
    fn not_modified_carries_the_tag() {
        let resp = not_modified("\"chat-1-4\"");
        assert_eq!(resp.status(), StatusCode::NOT_MODIFIED);
        assert_eq!(resp.headers()[header::ETAG], "\"chat-1-4\"");
    }
}
