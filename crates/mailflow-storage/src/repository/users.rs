//! User repository

use crate::db::DatabasePool;
use crate::models::{CreateUser, User};
use async_trait::async_trait;
use mailflow_common::types::UserId;
use mailflow_common::{Error, Result};
use uuid::Uuid;

/// User repository trait
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create(&self, input: CreateUser) -> Result<User>;
    async fn get(&self, id: UserId) -> Result<Option<User>>;
    async fn get_by_email(&self, email: &str) -> Result<Option<User>>;
    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<User>>;
    async fn set_active(&self, id: UserId, active: bool) -> Result<()>;
    async fn set_blocked(&self, id: UserId, blocked: bool) -> Result<()>;
}

/// Database user repository
pub struct DbUserRepository {
    pool: DatabasePool,
}

impl DbUserRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for DbUserRepository {
    async fn create(&self, input: CreateUser) -> Result<User> {
        let id = Uuid::now_v7();
        let now = chrono::Utc::now();

        // New accounts stay inactive until the activation link is followed
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, email, password_hash, role, is_blocked, is_active, created_at)
            VALUES ($1, $2, $3, $4, false, false, $5)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&input.email)
        .bind(&input.password_hash)
        .bind(&input.role)
        .bind(now)
        .fetch_one(self.pool.pool())
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                Error::Validation("A user with this email already exists".to_string())
            }
            _ => Error::Database(e.to_string()),
        })
    }

    async fn get(&self, id: UserId) -> Result<Option<User>> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool.pool())
            .await
            .map_err(|e| Error::Database(e.to_string()))
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(self.pool.pool())
            .await
            .map_err(|e| Error::Database(e.to_string()))
    }

    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<User>> {
        sqlx::query_as::<_, User>(
            "SELECT * FROM users ORDER BY created_at DESC LIMIT $1 OFFSET $2",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))
    }

    async fn set_active(&self, id: UserId, active: bool) -> Result<()> {
        sqlx::query("UPDATE users SET is_active = $2 WHERE id = $1")
            .bind(id)
            .bind(active)
            .execute(self.pool.pool())
            .await
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(())
    }

    async fn set_blocked(&self, id: UserId, blocked: bool) -> Result<()> {
        sqlx::query("UPDATE users SET is_blocked = $2 WHERE id = $1")
            .bind(id)
            .bind(blocked)
            .execute(self.pool.pool())
            .await
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(())
    }
}
