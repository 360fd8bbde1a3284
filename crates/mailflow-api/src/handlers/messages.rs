//! Message handlers
//!
//! Messages are shared content containers with no owner; any
//! authenticated user may read, edit, or delete them.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use mailflow_common::types::MessageId;
use mailflow_core::policy::{can_access, Action, Resource};
use mailflow_storage::models::{CreateMessage, Message, UpdateMessage};
use mailflow_storage::repository::{MessageRepository, MessageRepositoryTrait};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

use crate::auth::{AppState, AuthContext};
use crate::handlers::{api_error, forbidden, not_found, storage_error, ApiError, ListQuery};

/// Request body for creating a message
#[derive(Debug, Deserialize)]
pub struct CreateMessageRequest {
    pub subject: String,
    pub body: String,
}

/// Request body for updating a message
#[derive(Debug, Deserialize)]
pub struct UpdateMessageRequest {
    pub subject: Option<String>,
    pub body: Option<String>,
}

/// Create a message
///
/// POST /api/v1/messages
pub async fn create_message(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Json(input): Json<CreateMessageRequest>,
) -> Result<(StatusCode, Json<Message>), ApiError> {
    if !can_access(&auth.actor(), Action::Edit, Resource::Shared) {
        return Err(forbidden());
    }

    if input.subject.is_empty() {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "validation_error",
            "Subject is required",
        ));
    }

    let repo = MessageRepository::new(state.db_pool.clone());
    let message = repo
        .create(CreateMessage {
            subject: input.subject,
            body: input.body,
        })
        .await
        .map_err(storage_error)?;

    info!("User {} created message {}", auth.user_id, message.id);

    Ok((StatusCode::CREATED, Json(message)))
}

/// List messages
///
/// GET /api/v1/messages
pub async fn list_messages(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Message>>, ApiError> {
    if !can_access(&auth.actor(), Action::View, Resource::Shared) {
        return Err(forbidden());
    }

    let repo = MessageRepository::new(state.db_pool.clone());
    let messages = repo
        .list(query.limit, query.offset)
        .await
        .map_err(storage_error)?;

    Ok(Json(messages))
}

/// Fetch one message
///
/// GET /api/v1/messages/:id
pub async fn get_message(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<MessageId>,
) -> Result<Json<Message>, ApiError> {
    if !can_access(&auth.actor(), Action::View, Resource::Shared) {
        return Err(forbidden());
    }

    let repo = MessageRepository::new(state.db_pool.clone());
    let message = repo
        .get(id)
        .await
        .map_err(storage_error)?
        .ok_or_else(|| not_found("Message not found"))?;

    Ok(Json(message))
}

/// Update a message
///
/// PATCH /api/v1/messages/:id
pub async fn update_message(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<MessageId>,
    Json(input): Json<UpdateMessageRequest>,
) -> Result<Json<Message>, ApiError> {
    if !can_access(&auth.actor(), Action::Edit, Resource::Shared) {
        return Err(forbidden());
    }

    let repo = MessageRepository::new(state.db_pool.clone());
    let message = repo
        .update(
            id,
            UpdateMessage {
                subject: input.subject,
                body: input.body,
            },
        )
        .await
        .map_err(storage_error)?
        .ok_or_else(|| not_found("Message not found"))?;

    Ok(Json(message))
}

/// Delete a message
///
/// DELETE /api/v1/messages/:id
pub async fn delete_message(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<MessageId>,
) -> Result<StatusCode, ApiError> {
    if !can_access(&auth.actor(), Action::Delete, Resource::Shared) {
        return Err(forbidden());
    }

    let repo = MessageRepository::new(state.db_pool.clone());
    let deleted = repo.delete(id).await.map_err(storage_error)?;
    if !deleted {
        return Err(not_found("Message not found"));
    }

    info!("User {} deleted message {}", auth.user_id, id);

    Ok(StatusCode::NO_CONTENT)
}
