use std::future::Future;
use std::str::FromStr;

use uuid::Uuid;

use crate::entities::{format_timestamp, parse_timestamp, ChatMessage, ChatRole, SqliteStore};

pub trait ChatStore: Send + Sync + 'static {
    /// Append a turn to the transcript; the store assigns id and timestamp.
    fn append_message(
        &self,
        role: ChatRole,
        content: &str,
    ) -> impl Future<Output = Result<ChatMessage, sqlx::Error>> + Send;

    /// The whole transcript, oldest first.
    fn list_messages(&self) -> impl Future<Output = Result<Vec<ChatMessage>, sqlx::Error>> + Send;
}

impl ChatStore for SqliteStore {
    async fn append_message(&self, role: ChatRole, content: &str) -> Result<ChatMessage, sqlx::Error> {
        let msg = ChatMessage {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.to_owned(),
            created_at: self.clock.next(),
        };
        sqlx::query(
            "INSERT INTO chat_messages (id, role, content, created_at) \
             VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(&msg.id)
        .bind(msg.role.as_ref())
        .bind(&msg.content)
        .bind(format_timestamp(&msg.created_at))
        .execute(&self.pool)
        .await?;
        Ok(msg)
    }

    async fn list_messages(&self) -> Result<Vec<ChatMessage>, sqlx::Error> {
        let rows: Vec<(String, String, String, String)> = sqlx::query_as(
            "SELECT id, role, content, created_at \
             FROM chat_messages ORDER BY created_at ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter()
            .map(|(id, role, content, created_at)| {
                let role = ChatRole::from_str(&role).map_err(|e| sqlx::Error::ColumnDecode {
                    index: "role".into(),
                    source: Box::new(e),
                })?;
                Ok(ChatMessage {
                    id,
                    role,
                    content,
                    created_at: parse_timestamp(&created_at),
                })
            })
            .collect()
    }
}
