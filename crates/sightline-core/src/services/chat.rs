//! Chat tool router.
//!
//! Each user turn is persisted, classified, optionally grounded with a
//! read-only image query ("tool data"), and answered by the text model. The
//! transcript never shows a blank or raw-error assistant turn: any failure on
//! the way is replaced by [`APOLOGY`].

use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;

use crate::entities::{ChatMessage, ChatRole, ChatStore, ImageRecord, ImageStore};
use crate::error::CoreError;
use crate::generation::{CompletionRequest, ContentPart, Generate, PromptMessage};
use crate::services::intent::{Intent, IntentClassifier, KeywordClassifier};
use crate::views::{View, ViewRevisions};

pub const APOLOGY: &str = "Sorry, I encountered an error while processing your request.";

pub const SYSTEM_PROMPT: &str = "You are the assistant of an AI camera app. \
The user takes photos over time. The first photo is stored with a description; \
every later photo is stored with a delta describing what changed since the photo before it. \
You have two read-only tools: recent_changes returns the most recent N photos, \
and full_history returns an overview of every photo. \
When tool data is attached to the user's message, base your answer on it and \
say so if it does not contain what the user asked about. \
Otherwise answer conversationally and suggest asking about recent changes or a summary.";

/// Full-history tool output is capped at this many blocks.
pub const HISTORY_PREVIEW: usize = 5;

/// Result of [`ChatRouter::handle`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ChatOutcome {
    pub success: bool,
    /// The assistant turn as persisted.
    pub message: String,
}

pub struct ChatRouter<S, G, C = KeywordClassifier> {
    store: Arc<S>,
    generator: Arc<G>,
    classifier: C,
    views: Arc<ViewRevisions>,
    max_tokens: u32,
}

impl<S, G> ChatRouter<S, G, KeywordClassifier>
where
    S: ImageStore + ChatStore,
    G: Generate,
{
    pub fn new(store: Arc<S>, generator: Arc<G>, views: Arc<ViewRevisions>, max_tokens: u32) -> Self {
        Self::with_classifier(store, generator, KeywordClassifier, views, max_tokens)
    }
}

impl<S, G, C> ChatRouter<S, G, C>
where
    S: ImageStore + ChatStore,
    G: Generate,
    C: IntentClassifier,
{
    pub fn with_classifier(
        store: Arc<S>,
        generator: Arc<G>,
        classifier: C,
        views: Arc<ViewRevisions>,
        max_tokens: u32,
    ) -> Self {
        Self {
            store,
            generator,
            classifier,
            views,
            max_tokens,
        }
    }

    /// Answer one user turn. Both turns are persisted before returning.
    #[instrument(skip_all, fields(len = user_text.len()))]
    pub async fn handle(&self, user_text: &str) -> ChatOutcome {
        if let Err(e) = self.store.append_message(ChatRole::User, user_text).await {
            error!(error = %e, "failed to persist user turn");
            self.record_reply(APOLOGY).await;
            return ChatOutcome {
                success: false,
                message: APOLOGY.to_owned(),
            };
        }

        let intent = self.classifier.classify(user_text);
        let (success, reply) = match self.reply(user_text, intent).await {
            Ok(text) => (true, text),
            Err(e) => {
                warn!(intent = intent.name(), error = %e, "chat turn failed; replying with apology");
                (false, APOLOGY.to_owned())
            }
        };

        let persisted = self.record_reply(&reply).await;

        info!(intent = intent.name(), success, "chat turn answered");
        ChatOutcome {
            success: success && persisted,
            message: reply,
        }
    }

    /// Transcript, oldest first. Empty if the store is unavailable.
    pub async fn history(&self) -> Vec<ChatMessage> {
        self.store.list_messages().await.unwrap_or_else(|e| {
            error!(error = %e, "failed to load chat history");
            Vec::new()
        })
    }

    /// Persist the assistant turn and bump the chat view. Returns whether the
    /// turn was stored.
    async fn record_reply(&self, reply: &str) -> bool {
        let persisted = match self.store.append_message(ChatRole::Assistant, reply).await {
            Ok(_) => true,
            Err(e) => {
                error!(error = %e, "failed to persist assistant turn");
                false
            }
        };
        self.views.invalidate(View::Chat);
        persisted
    }

    async fn reply(&self, user_text: &str, intent: Intent) -> Result<String, CoreError> {
        let tool_data = self.run_tool(intent).await?;
        let request = compose_prompt(user_text, tool_data.as_deref(), self.max_tokens);
        self.generator
            .complete(request)
            .await?
            .ok_or_else(|| CoreError::Upstream("model returned no text".into()))
    }

    async fn run_tool(&self, intent: Intent) -> Result<Option<String>, CoreError> {
        match intent {
            Intent::RecentChanges { count } => {
                let images = self.store.recent_images(count).await?;
                Ok(Some(render_recent(&images)))
            }
            Intent::FullHistory => {
                let images = self.store.list_images().await?;
                Ok(Some(render_history(&images)))
            }
            Intent::Chat => Ok(None),
        }
    }
}

/// System instruction plus the user turn, with tool data appended when present.
pub fn compose_prompt(user_text: &str, tool_data: Option<&str>, max_tokens: u32) -> CompletionRequest {
    let user = match tool_data {
        Some(data) => format!("{user_text}\n\nTool data:\n{data}"),
        None => user_text.to_owned(),
    };
    CompletionRequest {
        messages: vec![
            PromptMessage::system(SYSTEM_PROMPT),
            PromptMessage::user(vec![ContentPart::Text(user)]),
        ],
        max_tokens,
    }
}

/// One text block per image: timestamp, then whichever analysis is present.
pub fn render_block(image: &ImageRecord) -> String {
    let mut block = format!("Photo taken {}", image.created_at.format("%Y-%m-%d %H:%M:%S UTC"));
    if let Some(description) = &image.description {
        block.push_str(&format!("\nDescription: {description}"));
    }
    if let Some(delta) = &image.delta {
        block.push_str(&format!("\nChanges: {delta}"));
    }
    block
}

pub fn render_recent(images: &[ImageRecord]) -> String {
    if images.is_empty() {
        return "No photos have been taken yet.".to_owned();
    }
    images.iter().map(render_block).collect::<Vec<_>>().join("\n\n")
}

/// First [`HISTORY_PREVIEW`] blocks plus a count of what was left out.
pub fn render_history(images: &[ImageRecord]) -> String {
    if images.is_empty() {
        return "No photos have been taken yet.".to_owned();
    }
    let mut out = images
        .iter()
        .take(HISTORY_PREVIEW)
        .map(render_block)
        .collect::<Vec<_>>()
        .join("\n\n");
    let omitted = images.len().saturating_sub(HISTORY_PREVIEW);
    if omitted > 0 {
        out.push_str(&format!("\n\n...and {omitted} more"));
    }
    out
}
