//! Mailing repository
//!
//! A mailing's recipient set lives in the `mailing_recipients` join
//! table; creates and updates that touch it run in one transaction so a
//! failed write never leaves a half-written recipient set.

use crate::db::DatabasePool;
use crate::models::{Client, CreateMailing, Mailing, UpdateMailing};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mailflow_common::types::{ClientId, MailingId, UserId};
use mailflow_common::{Error, Result};
use uuid::Uuid;

/// Mailing repository trait
#[async_trait]
pub trait MailingRepository: Send + Sync {
    async fn create(&self, input: CreateMailing) -> Result<Mailing>;
    async fn get(&self, id: MailingId) -> Result<Option<Mailing>>;
    async fn list_by_owner(&self, owner_id: UserId, limit: i64, offset: i64)
        -> Result<Vec<Mailing>>;
    async fn list_all(&self, limit: i64, offset: i64) -> Result<Vec<Mailing>>;
    async fn list_running(&self, now: DateTime<Utc>) -> Result<Vec<Mailing>>;
    async fn update(&self, id: MailingId, input: UpdateMailing) -> Result<Option<Mailing>>;
    async fn delete(&self, id: MailingId) -> Result<bool>;
    async fn recipients(&self, id: MailingId) -> Result<Vec<Client>>;
    async fn count_by_owner(&self, owner_id: UserId) -> Result<i64>;
    async fn count_all(&self) -> Result<i64>;
    async fn count_running(&self, now: DateTime<Utc>) -> Result<i64>;
}

/// Database mailing repository
pub struct DbMailingRepository {
    pool: DatabasePool,
}

impl DbMailingRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    async fn replace_recipients(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        mailing_id: MailingId,
        recipient_ids: &[ClientId],
    ) -> std::result::Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM mailing_recipients WHERE mailing_id = $1")
            .bind(mailing_id)
            .execute(&mut **tx)
            .await?;

        for client_id in recipient_ids {
            sqlx::query(
                "INSERT INTO mailing_recipients (mailing_id, client_id) VALUES ($1, $2)",
            )
            .bind(mailing_id)
            .bind(client_id)
            .execute(&mut **tx)
            .await?;
        }

        Ok(())
    }
}

#[async_trait]
impl MailingRepository for DbMailingRepository {
    async fn create(&self, input: CreateMailing) -> Result<Mailing> {
        let id = Uuid::now_v7();
        let now = chrono::Utc::now();

        let mut tx = self
            .pool
            .pool()
            .begin()
            .await
            .map_err(|e| Error::Database(e.to_string()))?;

        let mailing = sqlx::query_as::<_, Mailing>(
            r#"
            INSERT INTO mailings
                (id, owner_id, sender_email, start_time, end_time, message_id, is_active, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, true, $7)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(input.owner_id)
        .bind(&input.sender_email)
        .bind(input.start_time)
        .bind(input.end_time)
        .bind(input.message_id)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        Self::replace_recipients(&mut tx, id, &input.recipient_ids)
            .await
            .map_err(|e| Error::Database(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| Error::Database(e.to_string()))?;

        Ok(mailing)
    }

    async fn get(&self, id: MailingId) -> Result<Option<Mailing>> {
        sqlx::query_as::<_, Mailing>("SELECT * FROM mailings WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool.pool())
            .await
            .map_err(|e| Error::Database(e.to_string()))
    }

    async fn list_by_owner(
        &self,
        owner_id: UserId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Mailing>> {
        sqlx::query_as::<_, Mailing>(
            r#"
            SELECT * FROM mailings
            WHERE owner_id = $1
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(owner_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))
    }

    async fn list_all(&self, limit: i64, offset: i64) -> Result<Vec<Mailing>> {
        sqlx::query_as::<_, Mailing>(
            "SELECT * FROM mailings ORDER BY created_at DESC LIMIT $1 OFFSET $2",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))
    }

    async fn list_running(&self, now: DateTime<Utc>) -> Result<Vec<Mailing>> {
        sqlx::query_as::<_, Mailing>(
            r#"
            SELECT * FROM mailings
            WHERE start_time <= $1 AND end_time >= $1
            ORDER BY start_time ASC
            "#,
        )
        .bind(now)
        .fetch_all(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))
    }

    async fn update(&self, id: MailingId, input: UpdateMailing) -> Result<Option<Mailing>> {
        let mut tx = self
            .pool
            .pool()
            .begin()
            .await
            .map_err(|e| Error::Database(e.to_string()))?;

        let mailing = sqlx::query_as::<_, Mailing>(
            r#"
            UPDATE mailings SET
                sender_email = COALESCE($2, sender_email),
                start_time = COALESCE($3, start_time),
                end_time = COALESCE($4, end_time),
                message_id = COALESCE($5, message_id),
                is_active = COALESCE($6, is_active)
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&input.sender_email)
        .bind(input.start_time)
        .bind(input.end_time)
        .bind(input.message_id)
        .bind(input.is_active)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        let Some(mailing) = mailing else {
            tx.rollback()
                .await
                .map_err(|e| Error::Database(e.to_string()))?;
            return Ok(None);
        };

        if let Some(recipient_ids) = &input.recipient_ids {
            Self::replace_recipients(&mut tx, id, recipient_ids)
                .await
                .map_err(|e| Error::Database(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| Error::Database(e.to_string()))?;

        Ok(Some(mailing))
    }

    async fn delete(&self, id: MailingId) -> Result<bool> {
        // Attempts and recipient rows go with it via ON DELETE CASCADE
        let result = sqlx::query("DELETE FROM mailings WHERE id = $1")
            .bind(id)
            .execute(self.pool.pool())
            .await
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(result.rows_affected() > 0)
    }

    async fn recipients(&self, id: MailingId) -> Result<Vec<Client>> {
        sqlx::query_as::<_, Client>(
            r#"
            SELECT c.* FROM clients c
            JOIN mailing_recipients mr ON mr.client_id = c.id
            WHERE mr.mailing_id = $1
            ORDER BY c.created_at ASC
            "#,
        )
        .bind(id)
        .fetch_all(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))
    }

    async fn count_by_owner(&self, owner_id: UserId) -> Result<i64> {
        let count: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM mailings WHERE owner_id = $1")
                .bind(owner_id)
                .fetch_one(self.pool.pool())
                .await
                .map_err(|e| Error::Database(e.to_string()))?;
        Ok(count.0)
    }

    async fn count_all(&self) -> Result<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM mailings")
            .fetch_one(self.pool.pool())
            .await
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(count.0)
    }

    async fn count_running(&self, now: DateTime<Utc>) -> Result<i64> {
        let count: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM mailings WHERE start_time <= $1 AND end_time >= $1",
        )
        .bind(now)
        .fetch_one(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))?;
        Ok(count.0)
    }
}
