use tracing::error;

use crate::entities::{ImageRecord, ImageStore};

/// Every image, newest first. Store failures are logged and yield an empty
/// gallery rather than an error page.
pub async fn list_images<S: ImageStore>(store: &S) -> Vec<ImageRecord> {
    store.list_images().await.unwrap_or_else(|e| {
        error!(error = %e, "failed to list images");
        Vec::new()
    })
}
