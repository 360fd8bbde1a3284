//! Session repository
//!
//! Sessions hold the sha-256 hash of a bearer token, never the token
//! itself.

use crate::db::DatabasePool;
use crate::models::User;
use async_trait::async_trait;
use mailflow_common::types::UserId;
use mailflow_common::{Error, Result};

/// Session repository trait
#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn create(&self, token_hash: &str, user_id: UserId) -> Result<()>;
    async fn user_for_token(&self, token_hash: &str) -> Result<Option<User>>;
    async fn delete(&self, token_hash: &str) -> Result<bool>;
}

/// Database session repository
pub struct DbSessionRepository {
    pool: DatabasePool,
}

impl DbSessionRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionRepository for DbSessionRepository {
    async fn create(&self, token_hash: &str, user_id: UserId) -> Result<()> {
        let now = chrono::Utc::now();
        sqlx::query(
            "INSERT INTO sessions (token_hash, user_id, created_at) VALUES ($1, $2, $3)",
        )
        .bind(token_hash)
        .bind(user_id)
        .bind(now)
        .execute(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))?;
        Ok(())
    }

    async fn user_for_token(&self, token_hash: &str) -> Result<Option<User>> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT u.* FROM users u
            JOIN sessions s ON s.user_id = u.id
            WHERE s.token_hash = $1
            "#,
        )
        .bind(token_hash)
        .fetch_optional(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))
    }

    async fn delete(&self, token_hash: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM sessions WHERE token_hash = $1")
            .bind(token_hash)
            .execute(self.pool.pool())
            .await
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(result.rows_affected() > 0)
    }
}
