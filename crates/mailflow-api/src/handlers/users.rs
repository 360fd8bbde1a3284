//! User administration handlers (manager only)

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use mailflow_common::types::{UserId, UserRole};
use mailflow_core::policy::{can_access, Action, Resource};
use mailflow_storage::models::User;
use mailflow_storage::repository::{UserRepository, UserRepositoryTrait};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};

use crate::auth::{AppState, AuthContext};
use crate::handlers::{
    api_error, forbidden, internal_error, not_found, storage_error, ApiError, ListQuery,
};

/// User as shown to managers; the password hash never leaves storage
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: UserId,
    pub email: String,
    pub role: String,
    pub is_blocked: bool,
    pub is_active: bool,
}

impl From<User> for UserResponse {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            email: u.email,
            role: u.role,
            is_blocked: u.is_blocked,
            is_active: u.is_active,
        }
    }
}

/// Request body for the block toggle
#[derive(Debug, Deserialize)]
pub struct BlockRequest {
    pub is_blocked: bool,
}

/// List all user accounts
///
/// GET /api/v1/users
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<UserResponse>>, ApiError> {
    if !can_access(&auth.actor(), Action::ListUsers, Resource::Shared) {
        return Err(forbidden());
    }

    let repo = UserRepository::new(state.db_pool.clone());
    let users = repo
        .list(query.limit, query.offset)
        .await
        .map_err(storage_error)?;

    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

/// Block or unblock an account. Manager accounts cannot be blocked.
///
/// POST /api/v1/users/:id/block
pub async fn set_blocked(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<UserId>,
    Json(input): Json<BlockRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    if !can_access(&auth.actor(), Action::BlockUser, Resource::Shared) {
        return Err(forbidden());
    }

    let repo = UserRepository::new(state.db_pool.clone());
    let user = repo
        .get(id)
        .await
        .map_err(storage_error)?
        .ok_or_else(|| not_found("User not found"))?;

    let role = user.role.parse::<UserRole>().map_err(|e| {
        error!("Corrupt role for user {}: {}", user.id, e);
        internal_error("Failed to update user")
    })?;

    if role == UserRole::Manager && input.is_blocked {
        return Err(api_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            "validation_error",
            "Manager accounts cannot be blocked",
        ));
    }

    repo.set_blocked(id, input.is_blocked)
        .await
        .map_err(storage_error)?;

    info!(
        "Manager {} set is_blocked={} on user {}",
        auth.user_id, input.is_blocked, id
    );

    Ok(Json(UserResponse::from(User {
        is_blocked: input.is_blocked,
        ..user
    })))
}
