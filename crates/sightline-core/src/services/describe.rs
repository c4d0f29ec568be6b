//! Image description / delta pipeline.
//!
//! The first image in the sequence gets a standalone description. Every later
//! image is described relative to its predecessor (the record with the latest
//! `created_at` strictly before its own) and the result lands in `delta`.
//!
//! The predecessor is looked up at call time, not stored. Two uploads
//! described concurrently can therefore observe each other in either order,
//! and re-describing an image calls the model again and overwrites the
//! previous text.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, instrument};
use utoipa::ToSchema;

use crate::entities::{ImageAnalysis, ImageRecord, ImageStore};
use crate::error::CoreError;
use crate::generation::{CompletionRequest, ContentPart, Generate, ImagePayload, PromptMessage};
use crate::views::{View, ViewRevisions};

pub const DESCRIBE_PROMPT: &str = "Describe this image in detail.";
pub const DELTA_PROMPT: &str = "Describe the difference between these two images. \
    The first image is the previous one, the second is the current one.";
/// Stored when the model answers with no text.
pub const NO_DESCRIPTION: &str = "No description available";

/// Result of [`DescriptionService::describe`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct DescribeOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DescribeOutcome {
    fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    fn failed(e: &CoreError) -> Self {
        Self {
            success: false,
            error: Some(format!("Failed to describe image: {e}")),
        }
    }
}

pub struct DescriptionService<S, G> {
    store: Arc<S>,
    generator: Arc<G>,
    views: Arc<ViewRevisions>,
    upload_dir: PathBuf,
    max_tokens: u32,
}

impl<S: ImageStore, G: Generate> DescriptionService<S, G> {
    pub fn new(
        store: Arc<S>,
        generator: Arc<G>,
        views: Arc<ViewRevisions>,
        upload_dir: impl Into<PathBuf>,
        max_tokens: u32,
    ) -> Self {
        Self {
            store,
            generator,
            views,
            upload_dir: upload_dir.into(),
            max_tokens,
        }
    }

    /// Describe `image_id`, writing `description` or `delta`.
    ///
    /// Never fails: problems are logged and reported in the outcome, and the
    /// record is left untouched.
    #[instrument(skip(self))]
    pub async fn describe(&self, image_id: &str) -> DescribeOutcome {
        match self.try_describe(image_id).await {
            Ok(analysis) => {
                self.views.invalidate(View::Gallery);
                info!(kind = analysis.kind(), chars = analysis.text().len(), "image described");
                DescribeOutcome::ok()
            }
            Err(e) => {
                error!(error = %e, "image description failed");
                DescribeOutcome::failed(&e)
            }
        }
    }

    async fn try_describe(&self, image_id: &str) -> Result<ImageAnalysis, CoreError> {
        let image = self
            .store
            .get_image(image_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(image_id.to_owned()))?;

        let previous = self.store.previous_image(image.created_at).await?;

        let current = self.load(&image).await?;
        let request = match &previous {
            None => self.single_request(current),
            Some(prev) => {
                let before = self.load(prev).await?;
                self.delta_request(before, current)
            }
        };

        let text = self
            .generator
            .complete(request)
            .await?
            .unwrap_or_else(|| NO_DESCRIPTION.to_owned());

        let analysis = match previous {
            None => ImageAnalysis::Description(text),
            Some(_) => ImageAnalysis::Delta(text),
        };

        if !self.store.set_analysis(&image.id, &analysis).await? {
            return Err(CoreError::NotFound(image.id));
        }
        Ok(analysis)
    }

    fn single_request(&self, current: ImagePayload) -> CompletionRequest {
        CompletionRequest {
            messages: vec![PromptMessage::user(vec![
                ContentPart::Text(DESCRIBE_PROMPT.to_owned()),
                ContentPart::Image(current),
            ])],
            max_tokens: self.max_tokens,
        }
    }

    fn delta_request(&self, previous: ImagePayload, current: ImagePayload) -> CompletionRequest {
        CompletionRequest {
            messages: vec![PromptMessage::user(vec![
                ContentPart::Text(DELTA_PROMPT.to_owned()),
                ContentPart::Image(previous),
                ContentPart::Image(current),
            ])],
            max_tokens: self.max_tokens,
        }
    }

    async fn load(&self, image: &ImageRecord) -> Result<ImagePayload, CoreError> {
        let path = resolve_upload_path(&self.upload_dir, &image.url)?;
        let bytes = tokio::fs::read(&path).await?;
        Ok(ImagePayload::sniff(bytes))
    }
}

/// Map a stored `/uploads/<file>` URL to a path under `upload_dir`. Only the
/// final component is used, so a crafted URL cannot escape the directory.
pub fn resolve_upload_path(upload_dir: &Path, url: &str) -> Result<PathBuf, CoreError> {
    let name = Path::new(url).file_name().ok_or_else(|| {
        CoreError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("image url has no file name: {url}"),
        ))
    })?;
    Ok(upload_dir.join(name))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::entities::SqliteStore;
    use crate::generation::{GenerationError, PromptRole};
    use crate::testing::{write_file, FakeGenerator, JPEG_BYTES, PNG_BYTES};

    struct Fixture {
        store: Arc<SqliteStore>,
        generator: Arc<FakeGenerator>,
        views: Arc<ViewRevisions>,
        dir: tempfile::TempDir,
        service: DescriptionService<SqliteStore, FakeGenerator>,
    }

    async fn fixture(generator: FakeGenerator) -> Fixture {
        let store = Arc::new(SqliteStore::in_memory().await.unwrap());
        let generator = Arc::new(generator);
        let views = Arc::new(ViewRevisions::new());
        let dir = tempfile::tempdir().unwrap();
        let service = DescriptionService::new(
            Arc::clone(&store),
            Arc::clone(&generator),
            Arc::clone(&views),
            dir.path(),
            500,
        );
        Fixture {
            store,
            generator,
            views,
            dir,
            service,
        }
    }

    impl Fixture {
        async fn add(&self, name: &str, bytes: &[u8]) -> ImageRecord {
            write_file(self.dir.path(), name, bytes);
            self.store.create_image(&format!("/uploads/{name}")).await.unwrap()
        }

        async fn reload(&self, id: &str) -> ImageRecord {
            self.store.get_image(id).await.unwrap().unwrap()
        }
    }

    #[tokio::test]
    async fn first_image_gets_description() {
        let f = fixture(FakeGenerator::new().reply(Ok(Some("a desk with a mug".into())))).await;
        let a = f.add("a.png", PNG_BYTES).await;

        let outcome = f.service.describe(&a.id).await;
        assert_eq!(outcome, DescribeOutcome { success: true, error: None });

        let a = f.reload(&a.id).await;
        assert_eq!(a.description.as_deref(), Some("a desk with a mug"));
        assert_eq!(a.delta, None);

        let requests = f.generator.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].max_tokens, 500);
        let msg = &requests[0].messages[0];
        assert_eq!(msg.role, PromptRole::User);
        assert_eq!(msg.text(), DESCRIBE_PROMPT);
        let images: Vec<_> = msg.images().collect();
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].mime, "image/png");
    }

    #[tokio::test]
    async fn later_image_gets_delta_with_previous_first() {
        let f = fixture(FakeGenerator::new()).await;
        let a = f.add("a.png", PNG_BYTES).await;
        let b = f.add("b.jpg", JPEG_BYTES).await;
        assert!(f.service.describe(&a.id).await.success);
        let a_after_first = f.reload(&a.id).await;

        let generator = &f.generator;
        assert!(f.service.describe(&b.id).await.success);

        let b = f.reload(&b.id).await;
        assert_eq!(b.description, None);
        assert_eq!(b.delta.as_deref(), Some("generated #2"));
        assert_eq!(f.reload(&a.id).await, a_after_first, "predecessor must be untouched");

        let requests = generator.requests();
        let msg = &requests[1].messages[0];
        assert_eq!(msg.text(), DELTA_PROMPT);
        let images: Vec<_> = msg.images().collect();
        assert_eq!(images[0].bytes, PNG_BYTES, "previous image comes first");
        assert_eq!(images[1].bytes, JPEG_BYTES);
    }

    #[tokio::test]
    async fn predecessor_is_resolved_even_if_it_was_never_described() {
        let f = fixture(FakeGenerator::new()).await;
        let _a = f.add("a.png", PNG_BYTES).await;
        let b = f.add("b.png", PNG_BYTES).await;

        assert!(f.service.describe(&b.id).await.success);
        let b = f.reload(&b.id).await;
        assert!(b.delta.is_some() && b.description.is_none());
    }

    #[tokio::test]
    async fn empty_model_output_uses_fallback_text() {
        let f = fixture(FakeGenerator::new().reply(Ok(None))).await;
        let a = f.add("a.png", PNG_BYTES).await;

        assert!(f.service.describe(&a.id).await.success);
        assert_eq!(f.reload(&a.id).await.description.as_deref(), Some(NO_DESCRIPTION));
    }

    #[tokio::test]
    async fn missing_image_is_reported_not_raised() {
        let f = fixture(FakeGenerator::new()).await;
        let outcome = f.service.describe("does-not-exist").await;
        assert!(!outcome.success);
        assert_eq!(
            outcome.error.as_deref(),
            Some("Failed to describe image: image not found: does-not-exist")
        );
        assert!(f.generator.requests().is_empty());
    }

    #[tokio::test]
    async fn missing_file_leaves_record_untouched() {
        let f = fixture(FakeGenerator::new()).await;
        let a = f.store.create_image("/uploads/gone.jpg").await.unwrap();
        let revision = f.views.revision(View::Gallery);

        let outcome = f.service.describe(&a.id).await;
        assert!(!outcome.success);
        assert!(outcome.error.unwrap().starts_with("Failed to describe image: I/O error"));
        assert!(!f.reload(&a.id).await.is_processed());
        assert_eq!(f.views.revision(View::Gallery), revision);
    }

    #[tokio::test]
    async fn upstream_failure_leaves_record_untouched() {
        let f = fixture(FakeGenerator::new().reply(Err(GenerationError::Status {
            status: 500,
            body: "boom".into(),
        })))
        .await;
        let a = f.add("a.png", PNG_BYTES).await;

        let outcome = f.service.describe(&a.id).await;
        assert!(!outcome.success);
        assert!(outcome.error.unwrap().contains("upstream error"));
        assert!(!f.reload(&a.id).await.is_processed());
    }

    #[tokio::test]
    async fn describing_twice_calls_upstream_twice_and_overwrites() {
        let f = fixture(
            FakeGenerator::new()
                .reply(Ok(Some("first take".into())))
                .reply(Ok(Some("second take".into()))),
        )
        .await;
        let a = f.add("a.png", PNG_BYTES).await;

        assert!(f.service.describe(&a.id).await.success);
        assert!(f.service.describe(&a.id).await.success);

        assert_eq!(f.generator.requests().len(), 2);
        assert_eq!(f.reload(&a.id).await.description.as_deref(), Some("second take"));
    }

    #[tokio::test]
    async fn success_invalidates_gallery() {
        let f = fixture(FakeGenerator::new()).await;
        let a = f.add("a.png", PNG_BYTES).await;
        let before = f.views.revision(View::Gallery);
        f.service.describe(&a.id).await;
        assert_eq!(f.views.revision(View::Gallery), before + 1);
    }

    #[test]
    fn upload_path_uses_only_the_file_name() {
        let dir = Path::new("/srv/uploads");
        assert_eq!(
            resolve_upload_path(dir, "/uploads/abc.jpg").unwrap(),
            dir.join("abc.jpg")
        );
        assert_eq!(
            resolve_upload_path(dir, "/uploads/../../etc/passwd").unwrap(),
            dir.join("passwd")
        );
        assert!(resolve_upload_path(dir, "/").is_err());
    }
}
