//! Message repository

use crate::db::DatabasePool;
use crate::models::{CreateMessage, Message, UpdateMessage};
use async_trait::async_trait;
use mailflow_common::types::MessageId;
use mailflow_common::{Error, Result};
use uuid::Uuid;

/// Message repository trait
#[async_trait]
pub trait MessageRepository: Send + Sync {
    async fn create(&self, input: CreateMessage) -> Result<Message>;
    async fn get(&self, id: MessageId) -> Result<Option<Message>>;
    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<Message>>;
    async fn update(&self, id: MessageId, input: UpdateMessage) -> Result<Option<Message>>;
    async fn delete(&self, id: MessageId) -> Result<bool>;
}

/// Database message repository
pub struct DbMessageRepository {
    pool: DatabasePool,
}

impl DbMessageRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageRepository for DbMessageRepository {
    async fn create(&self, input: CreateMessage) -> Result<Message> {
        let id = Uuid::now_v7();
        let now = chrono::Utc::now();

        sqlx::query_as::<_, Message>(
            r#"
            INSERT INTO messages (id, subject, body, created_at)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&input.subject)
        .bind(&input.body)
        .bind(now)
        .fetch_one(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))
    }

    async fn get(&self, id: MessageId) -> Result<Option<Message>> {
        sqlx::query_as::<_, Message>("SELECT * FROM messages WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool.pool())
            .await
            .map_err(|e| Error::Database(e.to_string()))
    }

    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<Message>> {
        sqlx::query_as::<_, Message>(
            "SELECT * FROM messages ORDER BY created_at DESC LIMIT $1 OFFSET $2",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))
    }

    async fn update(&self, id: MessageId, input: UpdateMessage) -> Result<Option<Message>> {
        sqlx::query_as::<_, Message>(
            r#"
            UPDATE messages SET
                subject = COALESCE($2, subject),
                body = COALESCE($3, body)
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&input.subject)
        .bind(&input.body)
        .fetch_optional(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))
    }

    async fn delete(&self, id: MessageId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM messages WHERE id = $1")
            .bind(id)
            .execute(self.pool.pool())
            .await
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(result.rows_affected() > 0)
    }
}
