use serde::{Deserialize, Serialize};
use sightline_core::entities::{ChatMessage, ChatRole};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ChatRequest {
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub id: String,
    pub role: ChatRole,
    pub content: String,
    pub created_at: String,
}

impl From<&ChatMessage> for MessageResponse {
    fn from(message: &ChatMessage) -> Self {
        Self {
            id: message.id.clone(),
            role: message.role,
            content: message.content.clone(),
            created_at: message.created_at.to_rfc3339(),
        }
    }
}
