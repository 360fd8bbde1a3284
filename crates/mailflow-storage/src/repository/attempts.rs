//! Mailing attempt repository
//!
//! Attempts are append-only: there is no update or single-row delete
//! path. Rows disappear only through the mailing cascade.

use crate::db::DatabasePool;
use crate::models::{AttemptStatus, MailingAttempt};
use async_trait::async_trait;
use mailflow_common::types::{MailingId, UserId};
use mailflow_common::{Error, Result};
use uuid::Uuid;

/// Attempt repository trait
#[async_trait]
pub trait AttemptRepository: Send + Sync {
    async fn record(
        &self,
        mailing_id: MailingId,
        status: AttemptStatus,
        server_response: &str,
    ) -> Result<MailingAttempt>;
    async fn list_by_mailing(&self, mailing_id: MailingId) -> Result<Vec<MailingAttempt>>;
    async fn count_by_owner(&self, owner_id: UserId, status: AttemptStatus) -> Result<i64>;
}

/// Database attempt repository
pub struct DbAttemptRepository {
    pool: DatabasePool,
}

impl DbAttemptRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AttemptRepository for DbAttemptRepository {
    async fn record(
        &self,
        mailing_id: MailingId,
        status: AttemptStatus,
        server_response: &str,
    ) -> Result<MailingAttempt> {
        let id = Uuid::now_v7();
        let now = chrono::Utc::now();

        sqlx::query_as::<_, MailingAttempt>(
            r#"
            INSERT INTO mailing_attempts (id, mailing_id, attempt_time, status, server_response)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(mailing_id)
        .bind(now)
        .bind(status.as_str())
        .bind(server_response)
        .fetch_one(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))
    }

    async fn list_by_mailing(&self, mailing_id: MailingId) -> Result<Vec<MailingAttempt>> {
        sqlx::query_as::<_, MailingAttempt>(
            r#"
            SELECT * FROM mailing_attempts
            WHERE mailing_id = $1
            ORDER BY attempt_time DESC, id DESC
            "#,
        )
        .bind(mailing_id)
        .fetch_all(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))
    }

    async fn count_by_owner(&self, owner_id: UserId, status: AttemptStatus) -> Result<i64> {
        let count: (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM mailing_attempts a
            JOIN mailings m ON m.id = a.mailing_id
            WHERE m.owner_id = $1 AND a.status = $2
            "#,
        )
        .bind(owner_id)
        .bind(status.as_str())
        .fetch_one(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))?;
        Ok(count.0)
    }
}
