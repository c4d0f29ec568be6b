use crate::state::AppState;
use axum::{
    body::{Body, Bytes, HttpBody},
    extract::{Request, State},
    http::{HeaderMap, HeaderValue, header},
    middleware::Next,
    response::Response,
};
use http_body_util::{BodyExt, Limited};
use std::sync::Arc;
use std::time::Instant;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

pub static X_TRACE_ID: &str = "x-trace-id";

/// JSON bodies up to this size are logged verbatim at debug level.
const MAX_LOGGED_BODY: usize = 1024;

/// Tag every request with an `x-trace-id` and log its start and finish
/// inside an `http_request` span.
///
/// A valid UUID in the incoming header is reused; anything else is replaced.
pub async fn trace_middleware(
    State(_state): State<Arc<AppState>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let start_time = Instant::now();

    let trace_id = req
        .headers()
        .get(X_TRACE_ID)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| Uuid::parse_str(s).ok())
        .unwrap_or_else(Uuid::new_v4);

    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let span = info_span!(
        "http_request",
        trace_id = %trace_id,
        method = %method,
        path = %path,
    );

    async move {
        info!("→ request started");
        let header_value = HeaderValue::from_str(&trace_id.to_string()).ok();

        let (parts, body) = req.into_parts();
        let body = log_json_body("request", &parts.headers, body).await;
        let mut req = Request::from_parts(parts, body);
        if let Some(v) = header_value.clone() {
            req.headers_mut().insert(X_TRACE_ID, v);
        }

        let response = next.run(req).await;

        let (parts, body) = response.into_parts();
        let body = log_json_body("response", &parts.headers, body).await;
        let mut response = Response::from_parts(parts, body);
        if let Some(v) = header_value {
            response.headers_mut().insert(X_TRACE_ID, v);
        }

        info!(
            status = response.status().as_u16(),
            latency_ms = start_time.elapsed().as_millis(),
            "← response finished"
        );

        response
    }
    .instrument(span)
    .await
}

/// Buffer and log small JSON bodies. Anything else (multipart uploads,
/// static images, large or unsized JSON) streams through untouched.
async fn log_json_body(direction: &str, headers: &HeaderMap, body: Body) -> Body {
    let size = body.size_hint().upper();
    if !is_json(headers) {
        return body;
    }
    if !fits_log(size) {
        debug!(direction, size = ?size, "json body [skipped]");
        return body;
    }

    let bytes = match Limited::new(body, MAX_LOGGED_BODY).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            warn!(direction, error = %e, "failed to buffer body");
            Bytes::new()
        }
    };
    if let Ok(text) = std::str::from_utf8(&bytes) {
        debug!(direction, body = text, "json body");
    }

    Body::from(bytes)
}

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.contains("application/json"))
}

/// Only bodies whose length is known up front and small enough are buffered.
fn fits_log(upper_bound: Option<u64>) -> bool {
    upper_bound.is_some_and(|n| n <= MAX_LOGGED_BODY as u64)
}
