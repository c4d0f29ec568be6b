//! OpenAI-compatible chat-completions client.
//!
//! Speaks `POST {base_url}/chat/completions`. Any server that implements the
//! same wire format (Azure OpenAI, local gateways, …) works by pointing
//! `base_url` at it.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{CompletionRequest, ContentPart, Generate, GenerationError, PromptMessage, PromptRole};

/// Connection settings, read once at start-up.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    /// e.g. `https://api.openai.com/v1` (no trailing `/chat/completions`).
    pub base_url: String,
    /// Fixed model identifier used for every call.
    pub model: String,
    pub timeout: Duration,
}

/// Process-wide generation client. Cheap to share behind an `Arc`.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    config: OpenAiConfig,
    http: reqwest::Client,
}

impl OpenAiClient {
    pub fn new(config: OpenAiConfig) -> Result<Self, GenerationError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("sightline/", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout)
            .build()?;
        Ok(Self { config, http })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }
}

impl Generate for OpenAiClient {
    async fn complete(&self, request: CompletionRequest) -> Result<Option<String>, GenerationError> {
        if self.config.api_key.trim().is_empty() {
            return Err(GenerationError::MissingCredential);
        }

        let body = WireRequest::build(&self.config.model, &request);
        debug!(
            model = %self.config.model,
            messages = body.messages.len(),
            max_tokens = body.max_tokens,
            "sending completion request"
        );

        let resp = self
            .http
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(GenerationError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let text = resp.text().await?;
        parse_completion(&text)
    }
}

// ── Wire format ───────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage>,
    max_tokens: u32,
}

impl<'a> WireRequest<'a> {
    fn build(model: &'a str, request: &CompletionRequest) -> Self {
        Self {
            model,
            messages: request.messages.iter().map(WireMessage::from).collect(),
            max_tokens: request.max_tokens,
        }
    }
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: &'static str,
    content: WireContent,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum WireContent {
    Text(String),
    Parts(Vec<WirePart>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WirePart {
    Text { text: String },
    ImageUrl { image_url: WireImageUrl },
}

#[derive(Debug, Serialize)]
struct WireImageUrl {
    url: String,
}

impl From<&PromptMessage> for WireMessage {
    fn from(msg: &PromptMessage) -> Self {
        let role = match msg.role {
            PromptRole::System => "system",
            PromptRole::User => "user",
        };
        // Plain-text messages use the string form; anything carrying an image
        // needs the typed parts array.
        let content = match msg.content.as_slice() {
            [ContentPart::Text(text)] => WireContent::Text(text.clone()),
            parts => WireContent::Parts(
                parts
                    .iter()
                    .map(|p| match p {
                        ContentPart::Text(text) => WirePart::Text { text: text.clone() },
                        ContentPart::Image(img) => WirePart::ImageUrl {
                            image_url: WireImageUrl { url: img.data_url() },
                        },
                    })
                    .collect(),
            ),
        };
        Self { role, content }
    }
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    choices: Vec<WireChoice>,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    message: WireChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct WireChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// First choice's content; blank text counts as no output.
fn parse_completion(body: &str) -> Result<Option<String>, GenerationError> {
    let resp: WireResponse =
        serde_json::from_str(body).map_err(|e| GenerationError::Malformed(e.to_string()))?;
    Ok(resp
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .filter(|t| !t.trim().is_empty()))
}
