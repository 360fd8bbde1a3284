//! Client repository

use crate::db::DatabasePool;
use crate::models::{Client, CreateClient, UpdateClient};
use async_trait::async_trait;
use mailflow_common::types::{ClientId, UserId};
use mailflow_common::{Error, Result};
use uuid::Uuid;

/// Client repository trait
#[async_trait]
pub trait ClientRepository: Send + Sync {
    async fn create(&self, input: CreateClient) -> Result<Client>;
    async fn get(&self, id: ClientId) -> Result<Option<Client>>;
    async fn list_by_owner(&self, owner_id: UserId, limit: i64, offset: i64)
        -> Result<Vec<Client>>;
    async fn list_all(&self, limit: i64, offset: i64) -> Result<Vec<Client>>;
    async fn update(&self, id: ClientId, input: UpdateClient) -> Result<Option<Client>>;
    async fn delete(&self, id: ClientId) -> Result<bool>;
    async fn count_all(&self) -> Result<i64>;
}

/// Database client repository
pub struct DbClientRepository {
    pool: DatabasePool,
}

impl DbClientRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

fn map_client_error(e: sqlx::Error) -> Error {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            Error::Validation("A client with this email already exists".to_string())
        }
        _ => Error::Database(e.to_string()),
    }
}

#[async_trait]
impl ClientRepository for DbClientRepository {
    async fn create(&self, input: CreateClient) -> Result<Client> {
        let id = Uuid::now_v7();
        let now = chrono::Utc::now();

        sqlx::query_as::<_, Client>(
            r#"
            INSERT INTO clients (id, owner_id, email, full_name, comment, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(input.owner_id)
        .bind(&input.email)
        .bind(&input.full_name)
        .bind(&input.comment)
        .bind(now)
        .fetch_one(self.pool.pool())
        .await
        .map_err(map_client_error)
    }

    async fn get(&self, id: ClientId) -> Result<Option<Client>> {
        sqlx::query_as::<_, Client>("SELECT * FROM clients WHERE id = $1")
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
    ) -> Result<Vec<Client>> {
        sqlx::query_as::<_, Client>(
            r#"
            SELECT * FROM clients
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

    async fn list_all(&self, limit: i64, offset: i64) -> Result<Vec<Client>> {
        sqlx::query_as::<_, Client>(
            "SELECT * FROM clients ORDER BY created_at DESC LIMIT $1 OFFSET $2",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))
    }

    async fn update(&self, id: ClientId, input: UpdateClient) -> Result<Option<Client>> {
        sqlx::query_as::<_, Client>(
            r#"
            UPDATE clients SET
                email = COALESCE($2, email),
                full_name = COALESCE($3, full_name),
                comment = COALESCE($4, comment)
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&input.email)
        .bind(&input.full_name)
        .bind(&input.comment)
        .fetch_optional(self.pool.pool())
        .await
        .map_err(map_client_error)
    }

    async fn delete(&self, id: ClientId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM clients WHERE id = $1")
            .bind(id)
            .execute(self.pool.pool())
            .await
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(result.rows_affected() > 0)
    }

    async fn count_all(&self) -> Result<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM clients")
            .fetch_one(self.pool.pool())
            .await
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(count.0)
    }
}
