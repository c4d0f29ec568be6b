//! Text and vision generation.
//!
//! [`Generate`] is the seam between the services and whichever model API is
//! configured. Requests are provider-neutral ([`CompletionRequest`]); the
//! OpenAI-compatible implementation lives in [`openai`].

pub mod openai;

use std::future::Future;

use base64::Engine as _;
use thiserror::Error;

pub use openai::{OpenAiClient, OpenAiConfig};

/// Errors raised by a generation backend.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// No API credential was configured at start-up.
    #[error("missing API credential")]
    MissingCredential,

    /// Transport failure (connect, timeout, TLS, …).
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered with a non-success status.
    #[error("generation API returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The API answered 2xx but the body was not a completion.
    #[error("malformed generation response: {0}")]
    Malformed(String),
}

/// Who authored a prompt message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptRole {
    System,
    User,
}

/// One piece of a prompt message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentPart {
    Text(String),
    Image(ImagePayload),
}

/// Raw image bytes plus the MIME type used for the `data:` URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    pub mime: &'static str,
    pub bytes: Vec<u8>,
}

impl ImagePayload {
    /// Sniff the MIME type from the bytes, falling back to JPEG.
    pub fn sniff(bytes: Vec<u8>) -> Self {
        let mime = image::guess_format(&bytes)
            .map(|f| f.to_mime_type())
            .unwrap_or("image/jpeg");
        Self { mime, bytes }
    }

    /// `data:<mime>;base64,<…>` form accepted by vision endpoints.
    pub fn data_url(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.mime,
            base64::engine::general_purpose::STANDARD.encode(&self.bytes)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptMessage {
    pub role: PromptRole,
    pub content: Vec<ContentPart>,
}

impl PromptMessage {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: PromptRole::System,
            content: vec![ContentPart::Text(text.into())],
        }
    }

    pub fn user(content: Vec<ContentPart>) -> Self {
        Self {
            role: PromptRole::User,
            content,
        }
    }

    /// Concatenated text parts; images are skipped.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|p| match p {
                ContentPart::Text(t) => Some(t.as_str()),
                ContentPart::Image(_) => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn images(&self) -> impl Iterator<Item = &ImagePayload> {
        self.content.iter().filter_map(|p| match p {
            ContentPart::Image(img) => Some(img),
            ContentPart::Text(_) => None,
        })
    }
}

/// A single completion call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRequest {
    pub messages: Vec<PromptMessage>,
    /// Upper bound on generated tokens.
    pub max_tokens: u32,
}

/// A generation backend.
///
/// Returns `Ok(None)` when the model produced no text; callers decide whether
/// that is a fallback or an error.
pub trait Generate: Send + Sync + 'static {
    fn complete(
        &self,
        request: CompletionRequest,
    ) -> impl Future<Output = Result<Option<String>, GenerationError>> + Send;
}

#[cfg(test)]
mod test {
    use super::*;

    const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

    #[test]
    fn sniff_detects_png_and_defaults_to_jpeg() {
        assert_eq!(ImagePayload::sniff(PNG_MAGIC.to_vec()).mime, "image/png");
        assert_eq!(ImagePayload::sniff(b"not an image".to_vec()).mime, "image/jpeg");
    }

    #[test]
    fn data_url_embeds_base64() {
        let payload = ImagePayload {
            mime: "image/jpeg",
            bytes: vec![0xff, 0xd8, 0xff],
        };
        assert_eq!(payload.data_url(), "data:image/jpeg;base64,/9j/");
    }

    #[test]
    fn message_text_skips_images() {
        let msg = PromptMessage::user(vec![
            ContentPart::Text("compare".into()),
            ContentPart::Image(ImagePayload::sniff(PNG_MAGIC.to_vec())),
            ContentPart::Text("carefully".into()),
        ]);
        assert_eq!(msg.text(), "compare\ncarefully");
        assert_eq!(msg.images().count(), 1);
    }
}
