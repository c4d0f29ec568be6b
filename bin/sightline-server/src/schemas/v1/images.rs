use serde::{Deserialize, Serialize};
use sightline_core::entities::ImageRecord;
use utoipa::ToSchema;

/// One gallery entry. At most one of `description` and `delta` is set.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ImageResponse {
    pub id: String,
    /// Public path the photo is served from, e.g. `/uploads/<uuid>.jpg`.
    pub url: String,
    pub description: Option<String>,
    pub delta: Option<String>,
    pub processed: bool,
    pub created_at: String,
}

impl From<&ImageRecord> for ImageResponse {
    fn from(record: &ImageRecord) -> Self {
        Self {
            id: record.id.clone(),
            url: record.url.clone(),
            description: record.description.clone(),
            delta: record.delta.clone(),
            processed: record.is_processed(),
            created_at: record.created_at.to_rfc3339(),
        }
    }
}

/// Multipart body of `POST /v1/images`.
#[derive(Debug, ToSchema)]
#[allow(dead_code)]
pub struct UploadForm {
    /// The photo; JPEG or PNG.
    #[schema(value_type = String, format = Binary)]
    pub image: Vec<u8>,
}
