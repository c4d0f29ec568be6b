use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::HeaderMap;
use axum::response::Response;
use axum::routing::post;
use axum::{Json, Router};
use sightline_core::services::gallery;
use sightline_core::services::{DescribeOutcome, UploadOutcome};
use sightline_core::views::View;
use tracing::debug;
use utoipa::OpenApi;

use crate::error::ServerError;
use crate::routes::v1::{is_fresh, json_with_etag, not_modified};
use crate::schemas::v1::images::{ImageResponse, UploadForm};
use crate::state::AppState;

/// Multipart field carrying the photo.
const IMAGE_FIELD: &str = "image";

#[derive(OpenApi)]
#[openapi(
    paths(upload_image, list_images, describe_image),
    components(schemas(ImageResponse, UploadForm, UploadOutcome, DescribeOutcome))
)]
pub struct ImagesApi;

pub fn router(max_upload_bytes: usize) -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/images",
            post(upload_image)
                .get(list_images)
                .layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .route("/images/{id}/describe", post(describe_image))
}

#[utoipa::path(
    post,
    path = "/v1/images",
    tag = "images",
    request_body(content = UploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Upload outcome, `success` may be false", body = UploadOutcome),
        (status = 400, description = "Missing `image` field or malformed multipart body"),
        (status = 413, description = "Body exceeds the upload limit"),
    )
)]
pub async fn upload_image(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<UploadOutcome>, ServerError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(IMAGE_FIELD) {
            debug!(name = ?field.name(), "ignoring multipart field");
            continue;
        }
        let file_name = field.file_name().map(str::to_owned);
        let bytes = field.bytes().await?;
        let outcome = state.uploader.upload(file_name.as_deref(), &bytes).await;
        return Ok(Json(outcome));
    }
    Err(ServerError::BadRequest(format!(
        "multipart field `{IMAGE_FIELD}` is required"
    )))
}

#[utoipa::path(
    get,
    path = "/v1/images",
    tag = "images",
    responses(
        (status = 200, description = "All images, newest first", body = Vec<ImageResponse>),
        (status = 304, description = "Gallery unchanged since the given ETag"),
    )
)]
pub async fn list_images(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    // Read the tag before the rows so a concurrent write can only make it stale.
    let etag = state.views.etag(View::Gallery);
    if is_fresh(&headers, &etag) {
        return not_modified(&etag);
    }
    let images: Vec<ImageResponse> = gallery::list_images(state.store.as_ref())
        .await
        .iter()
        .map(ImageResponse::from)
        .collect();
    json_with_etag(&etag, images)
}

#[utoipa::path(
    post,
    path = "/v1/images/{id}/describe",
    tag = "images",
    params(("id" = String, Path, description = "Image id")),
    responses(
        (status = 200, description = "Describe outcome, `success` may be false", body = DescribeOutcome),
    )
)]
pub async fn describe_image(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Json<DescribeOutcome> {
    Json(state.describer.describe(&id).await)
}
