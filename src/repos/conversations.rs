use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    ai::{ConversationMessage, Role},
    database::PostgresConnection,
};

pub type DynConversationRepo = Arc<dyn ConversationRepo + Send + Sync>;

#[async_trait]
pub trait ConversationRepo {
    /// The user's most recent messages, oldest first.
    async fn recent_messages(&self, user_id: Uuid, limit: i64) -> Result<Vec<ConversationMessage>>;

    async fn append_message(
        &self,
        user_id: Uuid,
        role: Role,
        content: &str,
    ) -> Result<ConversationMessage>;

    async fn clear_history(&self, user_id: Uuid) -> Result<()>;
}

#[async_trait]
impl ConversationRepo for PostgresConnection {
    async fn recent_messages(&self, user_id: Uuid, limit: i64) -> Result<Vec<ConversationMessage>> {
        let mut messages = sqlx::query_as::<_, ConversationMessage>(
            r#"
            SELECT id, role, content, created_at
            FROM ai_conversation_history
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&**self)
        .await?;

        messages.reverse();

        Ok(messages)
    }

    async fn append_message(
        &self,
        user_id: Uuid,
        role: Role,
        content: &str,
    ) -> Result<ConversationMessage> {
        Ok(sqlx::query_as::<_, ConversationMessage>(
            r#"
            INSERT INTO ai_conversation_history (user_id, role, content)
            VALUES ($1, $2, $3)
            RETURNING id, role, content, created_at
            "#,
        )
        .bind(user_id)
        .bind(role.as_str())
        .bind(content)
        .fetch_one(&**self)
        .await?)
    }

    async fn clear_history(&self, user_id: Uuid) -> Result<()> {
        sqlx::query(
            r#"
            DELETE FROM ai_conversation_history
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .execute(&**self)
        .await?;

        Ok(())
    }
}
