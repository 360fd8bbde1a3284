//! Mailing handlers
//!
//! A mailing's lifecycle status is derived from its time window on
//! every read and never stored. The send trigger runs the dispatch
//! loop synchronously and reports how many recipients it reached.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use mailflow_common::types::{ClientId, MailingId, MessageId, UserRole};
use mailflow_core::policy::{can_access, Action, Resource};
use mailflow_core::{
    validate_mailing, DispatchError, DispatchSummary, MailingStatus, MailingValidationError,
};
use mailflow_storage::models::{Client, CreateMailing, Mailing, MailingAttempt, UpdateMailing};
use mailflow_storage::repository::{
    AttemptRepository, AttemptRepositoryTrait, MailingRepository, MailingRepositoryTrait,
    MessageRepository, MessageRepositoryTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::auth::{AppState, AuthContext};
use crate::handlers::{api_error, forbidden, not_found, storage_error, ApiError, ListQuery};

/// Request body for creating a mailing
#[derive(Debug, Deserialize)]
pub struct CreateMailingRequest {
    pub sender_email: String,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub message_id: MessageId,
    #[serde(default)]
    pub recipient_ids: Vec<ClientId>,
}

/// Request body for updating a mailing
#[derive(Debug, Deserialize)]
pub struct UpdateMailingRequest {
    pub sender_email: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub message_id: Option<MessageId>,
    pub recipient_ids: Option<Vec<ClientId>>,
    pub is_active: Option<bool>,
}

/// Mailing with its derived status
#[derive(Debug, Serialize)]
pub struct MailingResponse {
    #[serde(flatten)]
    pub mailing: Mailing,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipients: Option<Vec<Client>>,
}

impl MailingResponse {
    fn new(mailing: Mailing, now: DateTime<Utc>) -> Self {
        let status = MailingStatus::at(now, mailing.start_time, mailing.end_time);
        Self {
            mailing,
            status: status.as_str(),
            recipients: None,
        }
    }

    fn with_recipients(mut self, recipients: Vec<Client>) -> Self {
        self.recipients = Some(recipients);
        self
    }
}

fn validation_error(e: MailingValidationError) -> ApiError {
    api_error(
        StatusCode::UNPROCESSABLE_ENTITY,
        e.field(),
        e.to_string(),
    )
}

fn dispatch_error(e: DispatchError) -> ApiError {
    match e {
        DispatchError::NotFound => not_found("Mailing not found"),
        DispatchError::WindowClosed => {
            api_error(StatusCode::CONFLICT, "window_closed", e.to_string())
        }
        DispatchError::AlreadyDispatching => {
            api_error(StatusCode::CONFLICT, "already_dispatching", e.to_string())
        }
        DispatchError::Storage(_) => {
            api_error(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", "Dispatch failed")
        }
    }
}

/// Create a mailing
///
/// POST /api/v1/mailings
pub async fn create_mailing(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Json(input): Json<CreateMailingRequest>,
) -> Result<(StatusCode, Json<MailingResponse>), ApiError> {
    let now = Utc::now();

    validate_mailing(
        input.start_time,
        input.end_time,
        input.recipient_ids.len(),
        now,
    )
    .map_err(validation_error)?;

    // Both endpoints verified present by the validator
    let (Some(start_time), Some(end_time)) = (input.start_time, input.end_time) else {
        return Err(api_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            "start_time",
            "Start and end time must both be set",
        ));
    };

    let message_repo = MessageRepository::new(state.db_pool.clone());
    message_repo
        .get(input.message_id)
        .await
        .map_err(storage_error)?
        .ok_or_else(|| {
            api_error(
                StatusCode::UNPROCESSABLE_ENTITY,
                "message_id",
                "Message does not exist",
            )
        })?;

    let repo = MailingRepository::new(state.db_pool.clone());
    let mailing = repo
        .create(CreateMailing {
            owner_id: auth.user_id,
            sender_email: input.sender_email,
            start_time,
            end_time,
            message_id: input.message_id,
            recipient_ids: input.recipient_ids,
        })
        .await
        .map_err(storage_error)?;

    info!("User {} created mailing {}", auth.user_id, mailing.id);

    Ok((StatusCode::CREATED, Json(MailingResponse::new(mailing, now))))
}

/// List mailings
///
/// GET /api/v1/mailings
pub async fn list_mailings(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<MailingResponse>>, ApiError> {
    let repo = MailingRepository::new(state.db_pool.clone());

    let mailings = match auth.role {
        UserRole::Manager => repo.list_all(query.limit, query.offset).await,
        UserRole::User => {
            repo.list_by_owner(auth.user_id, query.limit, query.offset)
                .await
        }
    }
    .map_err(storage_error)?;

    let now = Utc::now();
    let responses = mailings
        .into_iter()
        .map(|m| MailingResponse::new(m, now))
        .collect();

    Ok(Json(responses))
}

/// Fetch one mailing with its recipient set
///
/// GET /api/v1/mailings/:id
pub async fn get_mailing(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<MailingId>,
) -> Result<Json<MailingResponse>, ApiError> {
    let repo = MailingRepository::new(state.db_pool.clone());
    let mailing = repo
        .get(id)
        .await
        .map_err(storage_error)?
        .ok_or_else(|| not_found("Mailing not found"))?;

    if !can_access(&auth.actor(), Action::View, Resource::Owned(mailing.owner_id)) {
        return Err(forbidden());
    }

    let recipients = repo.recipients(id).await.map_err(storage_error)?;

    Ok(Json(
        MailingResponse::new(mailing, Utc::now()).with_recipients(recipients),
    ))
}

/// Update a mailing
///
/// PATCH /api/v1/mailings/:id
pub async fn update_mailing(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<MailingId>,
    Json(input): Json<UpdateMailingRequest>,
) -> Result<Json<MailingResponse>, ApiError> {
    let repo = MailingRepository::new(state.db_pool.clone());
    let mailing = repo
        .get(id)
        .await
        .map_err(storage_error)?
        .ok_or_else(|| not_found("Mailing not found"))?;

    if !can_access(&auth.actor(), Action::Edit, Resource::Owned(mailing.owner_id)) {
        return Err(forbidden());
    }

    // The merged result (provided fields over stored ones) must pass the
    // same pipeline as a create.
    let now = Utc::now();
    let merged_start = input.start_time.unwrap_or(mailing.start_time);
    let merged_end = input.end_time.unwrap_or(mailing.end_time);
    let merged_recipients = match &input.recipient_ids {
        Some(ids) => ids.len(),
        None => repo.recipients(id).await.map_err(storage_error)?.len(),
    };

    validate_mailing(Some(merged_start), Some(merged_end), merged_recipients, now)
        .map_err(validation_error)?;

    if let Some(message_id) = input.message_id {
        let message_repo = MessageRepository::new(state.db_pool.clone());
        message_repo
            .get(message_id)
            .await
            .map_err(storage_error)?
            .ok_or_else(|| {
                api_error(
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "message_id",
                    "Message does not exist",
                )
            })?;
    }

    let updated = repo
        .update(
            id,
            UpdateMailing {
                sender_email: input.sender_email,
                start_time: input.start_time,
                end_time: input.end_time,
                message_id: input.message_id,
                recipient_ids: input.recipient_ids,
                is_active: input.is_active,
            },
        )
        .await
        .map_err(storage_error)?
        .ok_or_else(|| not_found("Mailing not found"))?;

    Ok(Json(MailingResponse::new(updated, now)))
}

/// Delete a mailing and its attempt history
///
/// DELETE /api/v1/mailings/:id
pub async fn delete_mailing(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<MailingId>,
) -> Result<StatusCode, ApiError> {
    let repo = MailingRepository::new(state.db_pool.clone());
    let mailing = repo
        .get(id)
        .await
        .map_err(storage_error)?
        .ok_or_else(|| not_found("Mailing not found"))?;

    if !can_access(&auth.actor(), Action::Delete, Resource::Owned(mailing.owner_id)) {
        return Err(forbidden());
    }

    repo.delete(id).await.map_err(storage_error)?;

    info!("User {} deleted mailing {}", auth.user_id, id);

    Ok(StatusCode::NO_CONTENT)
}

/// Trigger a synchronous send of a mailing
///
/// POST /api/v1/mailings/:id/send
pub async fn send_mailing(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<MailingId>,
) -> Result<Json<DispatchSummary>, ApiError> {
    let repo = MailingRepository::new(state.db_pool.clone());
    let mailing = repo
        .get(id)
        .await
        .map_err(storage_error)?
        .ok_or_else(|| not_found("Mailing not found"))?;

    if !can_access(&auth.actor(), Action::Send, Resource::Owned(mailing.owner_id)) {
        return Err(forbidden());
    }

    let summary = state
        .dispatcher
        .dispatch(id, Utc::now())
        .await
        .map_err(dispatch_error)?;

    Ok(Json(summary))
}

/// List the attempt history of a mailing, newest first
///
/// GET /api/v1/mailings/:id/attempts
pub async fn list_attempts(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<MailingId>,
) -> Result<Json<Vec<MailingAttempt>>, ApiError> {
    let repo = MailingRepository::new(state.db_pool.clone());
    let mailing = repo
        .get(id)
        .await
        .map_err(storage_error)?
        .ok_or_else(|| not_found("Mailing not found"))?;

    if !can_access(&auth.actor(), Action::View, Resource::Owned(mailing.owner_id)) {
        return Err(forbidden());
    }

    let attempts = AttemptRepository::new(state.db_pool.clone())
        .list_by_mailing(id)
        .await
        .map_err(storage_error)?;

    Ok(Json(attempts))
}
