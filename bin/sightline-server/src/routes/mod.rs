//! Axum router construction.
//!
//! [`build`] assembles the complete application router, including:
//! - Middleware layers (CORS, per-request trace-ID injection)
//! - Optional Swagger UI / OpenAPI document endpoint (disable with `SIGHTLINE_ENABLE_SWAGGER=false`)
//! - Health / heartbeat route
//! - `/v1` image, chat and real-time routes
//! - Static serving of uploaded photos under `/uploads`

pub mod doc;
mod health;
mod v1;

use axum::{Router, middleware};
use crate::middleware::{cors, trace};
use crate::state::AppState;
use sightline_core::services::upload::UPLOAD_URL_PREFIX;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::services::ServeDir;
use utoipa_swagger_ui::SwaggerUi;

/// Build the complete Axum [`Router`] for the application.
pub fn build(state: Arc<AppState>) -> Router {
    let api_router = Router::new()
        .merge(health::router())
        .nest("/v1", v1::router(state.config.max_upload_bytes))
        .nest_service(UPLOAD_URL_PREFIX, ServeDir::new(&state.config.upload_dir));

    let mut app = Router::new().merge(api_router);

    if state.config.enable_swagger {
        app = app.merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", doc::get_docs()));
    }

    app.layer(ServiceBuilder::new().layer(cors::cors_layer(state.clone())))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            trace::trace_middleware,
        ))
        .with_state(state)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::Config;
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use sightline_core::entities::SqliteStore;
    use sightline_core::services::chat::APOLOGY;
    use std::time::Duration;
    use tower::ServiceExt;

    const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDRfake";
    const BOUNDARY: &str = "sightline-test-boundary";

    struct Harness {
        app: Router,
        uploads: tempfile::TempDir,
    }

    /// Router over an in-memory store. The API key is blank, so every
    /// generation call fails fast without touching the network.
    async fn harness() -> Harness {
        let uploads = tempfile::tempdir().unwrap();
        let mut config = Config::from_env();
        config.upload_dir = uploads.path().to_path_buf();
        config.openai_api_key = String::new();
        config.enable_swagger = false;
        config.cors_allowed_origins = None;
        config.realtime_url = "http://127.0.0.1:9".into();
        config.upstream_timeout = Duration::from_secs(2);
        config.max_upload_bytes = 1024 * 1024;

        let store = SqliteStore::in_memory().await.unwrap();
        let state = Arc::new(AppState::with_store(config, store).unwrap());
        Harness {
            app: build(state),
            uploads,
        }
    }

    async fn send(app: &Router, req: Request<Body>) -> axum::response::Response {
        app.clone().oneshot(req).await.unwrap()
    }

    async fn body_json(resp: axum::response::Response) -> Value {
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::get(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn multipart(field: &str, file_name: &str, bytes: &[u8]) -> Request<Body> {
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\n\
                 Content-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
        Request::post("/v1/images")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn health_is_ok_and_carries_trace_id() {
        let h = harness().await;
        let resp = send(&h.app, get("/health")).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(resp.headers().contains_key(trace::X_TRACE_ID));
        assert_eq!(body_json(resp).await["status"], "ok");
    }

    #[tokio::test]
    async fn failed_chat_turn_replies_with_apology_and_is_recorded() {
        let h = harness().await;

        let resp = send(&h.app, post_json("/v1/chat", json!({ "message": "hello there" }))).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let outcome = body_json(resp).await;
        assert_eq!(outcome["success"], false);
        assert_eq!(outcome["message"], APOLOGY);

        let resp = send(&h.app, get("/v1/chat/messages")).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let messages = body_json(resp).await;
        let roles: Vec<&str> = messages
            .as_array()
            .unwrap()
            .iter()
            .map(|m| m["role"].as_str().unwrap())
            .collect();
        assert_eq!(roles, ["user", "assistant"]);
        assert_eq!(messages[0]["content"], "hello there");
    }

    #[tokio::test]
    async fn chat_history_honours_if_none_match() {
        let h = harness().await;

        let first = send(&h.app, get("/v1/chat/messages")).await;
        let etag = first.headers()[header::ETAG].to_str().unwrap().to_owned();

        let cached = Request::get("/v1/chat/messages")
            .header(header::IF_NONE_MATCH, &etag)
            .body(Body::empty())
            .unwrap();
        assert_eq!(send(&h.app, cached).await.status(), StatusCode::NOT_MODIFIED);

        send(&h.app, post_json("/v1/chat", json!({ "message": "anything new?" }))).await;

        let revalidate = Request::get("/v1/chat/messages")
            .header(header::IF_NONE_MATCH, &etag)
            .body(Body::empty())
            .unwrap();
        let resp = send(&h.app, revalidate).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_ne!(resp.headers()[header::ETAG].to_str().unwrap(), etag);
    }

    #[tokio::test]
    async fn malformed_chat_requests_are_rejected() {
        let h = harness().await;

        let blank = send(&h.app, post_json("/v1/chat", json!({ "message": "   " }))).await;
        assert_eq!(blank.status(), StatusCode::BAD_REQUEST);

        let wrong_shape = send(&h.app, post_json("/v1/chat", json!({ "text": "hi" }))).await;
        assert_eq!(wrong_shape.status(), StatusCode::BAD_REQUEST);

        let not_json = Request::post("/v1/chat")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{"))
            .unwrap();
        assert_eq!(send(&h.app, not_json).await.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn upload_stores_file_even_when_description_fails() {
        let h = harness().await;

        let resp = send(&h.app, multipart("image", "shot.png", PNG_BYTES)).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let outcome = body_json(resp).await;
        assert_eq!(outcome["success"], true);
        assert!(outcome["description_error"].is_string());
        let id = outcome["image_id"].as_str().unwrap().to_owned();

        let resp = send(&h.app, get("/v1/images")).await;
        assert!(resp.headers().contains_key(header::ETAG));
        let images = body_json(resp).await;
        assert_eq!(images.as_array().unwrap().len(), 1);
        assert_eq!(images[0]["id"], id.as_str());
        assert_eq!(images[0]["processed"], false);

        let url = images[0]["url"].as_str().unwrap();
        assert!(url.starts_with("/uploads/") && url.ends_with(".png"));
        let file_name = url.trim_start_matches("/uploads/");
        assert!(h.uploads.path().join(file_name).exists());

        let served = send(&h.app, get(url)).await;
        assert_eq!(served.status(), StatusCode::OK);
        let bytes = served.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(bytes.as_ref(), PNG_BYTES);
    }

    #[tokio::test]
    async fn non_image_upload_reports_failure() {
        let h = harness().await;
        let resp = send(&h.app, multipart("image", "notes.txt", b"plain text")).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let outcome = body_json(resp).await;
        assert_eq!(outcome["success"], false);
        assert_eq!(outcome["error"], "Failed to upload image");
    }

    #[tokio::test]
    async fn oversized_upload_is_payload_too_large() {
        let h = harness().await;
        let mut bytes = PNG_BYTES.to_vec();
        bytes.resize(2 * 1024 * 1024, 0);

        let resp = send(&h.app, multipart("image", "big.png", &bytes)).await;
        assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert!(body_json(resp).await["error"].is_string());
        assert_eq!(std::fs::read_dir(h.uploads.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn upload_without_image_field_is_bad_request() {
        let h = harness().await;
        let resp = send(&h.app, multipart("photo", "shot.png", PNG_BYTES)).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn describing_unknown_image_reports_failure() {
        let h = harness().await;
        let resp = send(&h.app, Request::post("/v1/images/missing/describe").body(Body::empty()).unwrap()).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let outcome = body_json(resp).await;
        assert_eq!(outcome["success"], false);
        assert!(outcome["error"].as_str().unwrap().starts_with("Failed to describe image"));
    }

    #[tokio::test]
    async fn unreachable_companion_is_bad_gateway() {
        let h = harness().await;
        let resp = send(&h.app, get("/v1/realtime/frame")).await;
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn openapi_lists_every_route() {
        let doc = doc::get_docs();
        for path in [
            "/health",
            "/v1/images",
            "/v1/images/{id}/describe",
            "/v1/chat",
            "/v1/chat/messages",
            "/v1/realtime/start",
            "/v1/realtime/stop",
            "/v1/realtime/frame",
            "/v1/realtime/feedback",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
