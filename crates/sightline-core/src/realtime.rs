//! Client for the real-time detection companion.
//!
//! The companion is a separate process (webcam loop + object detector) with a
//! small HTTP API. sightline only relays its responses; nothing here depends
//! on how detection works.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;
use utoipa::ToSchema;

use crate::error::CoreError;

/// Reply to `start` / `stop`, e.g. `{"status": "running"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CompanionStatus {
    /// `running`, `already_running`, `stopped`, `not running` or `error`.
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// A labelled detection from the companion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Detection {
    pub item: String,
    /// Seconds since the Unix epoch, as reported by the companion.
    pub timestamp: f64,
}

/// Latest frame plus both detectors' results.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, ToSchema)]
pub struct FrameSnapshot {
    /// Base64 JPEG, absent when no frame is available yet.
    #[serde(default)]
    pub frame: Option<String>,
    #[serde(default)]
    pub yolo_result: Option<Detection>,
    #[serde(default)]
    pub openai_result: Option<Detection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Reply to an on-demand feedback request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct FeedbackReply {
    /// `success` or `error`.
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RealtimeClient {
    base_url: String,
    http: reqwest::Client,
}

impl RealtimeClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, CoreError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("sightline/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn start(&self) -> Result<CompanionStatus, CoreError> {
        self.get("start").await
    }

    pub async fn stop(&self) -> Result<CompanionStatus, CoreError> {
        self.get("stop").await
    }

    pub async fn frame(&self) -> Result<FrameSnapshot, CoreError> {
        self.get("frame").await
    }

    pub async fn request_feedback(&self) -> Result<FeedbackReply, CoreError> {
        let url = format!("{}/request-feedback", self.base_url);
        debug!(%url, "companion request");
        let resp = self.http.post(&url).send().await?;
        decode(resp).await
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, CoreError> {
        let url = format!("{}/{path}", self.base_url);
        debug!(%url, "companion request");
        let resp = self.http.get(&url).send().await?;
        decode(resp).await
    }
}

async fn decode<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, CoreError> {
    let status = resp.status();
    let body = resp.text().await?;
    if !status.is_success() {
        return Err(CoreError::Upstream(format!(
            "companion returned {}: {body}",
            status.as_u16()
        )));
    }
    serde_json::from_str(&body)
        .map_err(|e| CoreError::Upstream(format!("malformed companion response: {e}")))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn frame_snapshot_accepts_partial_payloads() {
        let snap: FrameSnapshot = serde_json::from_str(r#"{"error":"No frame available"}"#).unwrap();
        assert_eq!(snap.frame, None);
        assert_eq!(snap.error.as_deref(), Some("No frame available"));

        let snap: FrameSnapshot = serde_json::from_str(
            r#"{"frame":"/9j/","yolo_result":{"item":"cup","timestamp":1.5},"openai_result":null}"#,
        )
        .unwrap();
        assert_eq!(snap.yolo_result.map(|d| d.item).as_deref(), Some("cup"));
        assert_eq!(snap.openai_result, None);
    }

    #[test]
    fn base_url_is_normalised() {
        let client = RealtimeClient::new("http://localhost:5002/", Duration::from_secs(1)).unwrap();
        assert_eq!(client.base_url(), "http://localhost:5002");
    }

    #[tokio::test]
    async fn unreachable_companion_is_an_upstream_error() {
        // Port 9 (discard) is not listening on test machines.
        let client = RealtimeClient::new("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();
        assert!(matches!(client.start().await, Err(CoreError::Upstream(_))));
    }
}
