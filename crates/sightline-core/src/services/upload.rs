//! Upload pipeline: validate, store the file, insert the record, describe.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entities::{ImageRecord, ImageStore};
use crate::error::CoreError;
use crate::generation::Generate;
use crate::services::describe::DescriptionService;
use crate::views::{View, ViewRevisions};

/// Extension used when the uploaded file name has none.
pub const DEFAULT_EXTENSION: &str = "jpg";
/// Public URL prefix under which uploaded files are served.
pub const UPLOAD_URL_PREFIX: &str = "/uploads";

/// Result of [`UploadService::upload`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct UploadOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_id: Option<String>,
    /// Why the upload itself failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// The upload succeeded but the description step did not.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description_error: Option<String>,
}

pub struct UploadService<S, G> {
    store: Arc<S>,
    describer: Arc<DescriptionService<S, G>>,
    views: Arc<ViewRevisions>,
    upload_dir: PathBuf,
}

impl<S: ImageStore, G: Generate> UploadService<S, G> {
    pub fn new(
        store: Arc<S>,
        describer: Arc<DescriptionService<S, G>>,
        views: Arc<ViewRevisions>,
        upload_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            store,
            describer,
            views,
            upload_dir: upload_dir.into(),
        }
    }

    /// Store `bytes` and describe it synchronously.
    ///
    /// The upload counts as successful once the file and record exist; a
    /// failed description is reported in `description_error` and can be
    /// retried through the describe operation.
    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    pub async fn upload(&self, file_name: Option<&str>, bytes: &[u8]) -> UploadOutcome {
        let record = match self.store_file(file_name, bytes).await {
            Ok(record) => record,
            Err(e) => {
                error!(error = %e, "upload failed");
                return UploadOutcome {
                    success: false,
                    image_id: None,
                    error: Some("Failed to upload image".to_owned()),
                    description_error: None,
                };
            }
        };
        info!(image_id = %record.id, url = %record.url, "image stored");

        let described = self.describer.describe(&record.id).await;
        self.views.invalidate(View::Gallery);

        UploadOutcome {
            success: true,
            image_id: Some(record.id),
            error: None,
            description_error: described.error,
        }
    }

    async fn store_file(&self, file_name: Option<&str>, bytes: &[u8]) -> Result<ImageRecord, CoreError> {
        validate_payload(bytes)?;

        tokio::fs::create_dir_all(&self.upload_dir).await?;
        let stored_name = format!("{}.{}", Uuid::new_v4(), extension_of(file_name));
        let path = self.upload_dir.join(&stored_name);
        tokio::fs::write(&path, bytes).await?;

        let url = format!("{UPLOAD_URL_PREFIX}/{stored_name}");
        match self.store.create_image(&url).await {
            Ok(record) => Ok(record),
            Err(e) => {
                // Do not leave an orphaned file behind.
                if let Err(rm) = tokio::fs::remove_file(&path).await {
                    warn!(path = %path.display(), error = %rm, "failed to remove orphaned upload");
                }
                Err(e.into())
            }
        }
    }
}

fn validate_payload(bytes: &[u8]) -> Result<(), CoreError> {
    if bytes.is_empty() {
        return Err(CoreError::Validation("No file uploaded".to_owned()));
    }
    image::guess_format(bytes)
        .map(|_| ())
        .map_err(|_| CoreError::Validation("payload is not a recognised image".to_owned()))
}

/// Lower-cased extension of the uploaded file name, or [`DEFAULT_EXTENSION`]
/// when it is missing or not plain alphanumerics.
pub fn extension_of(file_name: Option<&str>) -> String {
    file_name
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty() && ext.len() <= 8 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(str::to_ascii_lowercase)
        .unwrap_or_else(|| DEFAULT_EXTENSION.to_owned())
}
