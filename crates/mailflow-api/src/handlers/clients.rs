//! Client handlers
//!
//! Managers see every client; regular users see and manage only their
//! own.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use mailflow_common::types::{ClientId, UserRole};
use mailflow_core::policy::{can_access, Action, Resource};
use mailflow_storage::models::{Client, CreateClient, UpdateClient};
use mailflow_storage::repository::{ClientRepository, ClientRepositoryTrait};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

use crate::auth::{AppState, AuthContext};
use crate::handlers::{api_error, forbidden, not_found, storage_error, ApiError, ListQuery};

/// Request body for creating a client
#[derive(Debug, Deserialize)]
pub struct CreateClientRequest {
    pub email: String,
    pub full_name: String,
    #[serde(default)]
    pub comment: String,
}

/// Request body for updating a client
#[derive(Debug, Deserialize)]
pub struct UpdateClientRequest {
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub comment: Option<String>,
}

/// Create a client owned by the authenticated user
///
/// POST /api/v1/clients
pub async fn create_client(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Json(input): Json<CreateClientRequest>,
) -> Result<(StatusCode, Json<Client>), ApiError> {
    if input.email.is_empty() {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "validation_error",
            "Email is required",
        ));
    }

    let repo = ClientRepository::new(state.db_pool.clone());
    let client = repo
        .create(CreateClient {
            owner_id: auth.user_id,
            email: input.email,
            full_name: input.full_name,
            comment: input.comment,
        })
        .await
        .map_err(storage_error)?;

    info!("User {} created client {}", auth.user_id, client.id);

    Ok((StatusCode::CREATED, Json(client)))
}

/// List clients
///
/// GET /api/v1/clients
pub async fn list_clients(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Client>>, ApiError> {
    let repo = ClientRepository::new(state.db_pool.clone());

    let clients = match auth.role {
        UserRole::Manager => repo.list_all(query.limit, query.offset).await,
        UserRole::User => {
            repo.list_by_owner(auth.user_id, query.limit, query.offset)
                .await
        }
    }
    .map_err(storage_error)?;

    Ok(Json(clients))
}

/// Fetch one client
///
/// GET /api/v1/clients/:id
pub async fn get_client(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<ClientId>,
) -> Result<Json<Client>, ApiError> {
    let repo = ClientRepository::new(state.db_pool.clone());
    let client = repo
        .get(id)
        .await
        .map_err(storage_error)?
        .ok_or_else(|| not_found("Client not found"))?;

    if !can_access(&auth.actor(), Action::View, Resource::Owned(client.owner_id)) {
        return Err(forbidden());
    }

    Ok(Json(client))
}

/// Update a client
///
/// PATCH /api/v1/clients/:id
pub async fn update_client(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<ClientId>,
    Json(input): Json<UpdateClientRequest>,
) -> Result<Json<Client>, ApiError> {
    let repo = ClientRepository::new(state.db_pool.clone());
    let client = repo
        .get(id)
        .await
        .map_err(storage_error)?
        .ok_or_else(|| not_found("Client not found"))?;

    if !can_access(&auth.actor(), Action::Edit, Resource::Owned(client.owner_id)) {
        return Err(forbidden());
    }

    let updated = repo
        .update(
            id,
            UpdateClient {
                email: input.email,
                full_name: input.full_name,
                comment: input.comment,
            },
        )
        .await
        .map_err(storage_error)?
        .ok_or_else(|| not_found("Client not found"))?;

    Ok(Json(updated))
}

/// Delete a client
///
/// DELETE /api/v1/clients/:id
pub async fn delete_client(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<ClientId>,
) -> Result<StatusCode, ApiError> {
    let repo = ClientRepository::new(state.db_pool.clone());
    let client = repo
        .get(id)
        .await
        .map_err(storage_error)?
        .ok_or_else(|| not_found("Client not found"))?;

    if !can_access(&auth.actor(), Action::Delete, Resource::Owned(client.owner_id)) {
        return Err(forbidden());
    }

    repo.delete(id).await.map_err(storage_error)?;

    info!("User {} deleted client {}", auth.user_id, id);

    Ok(StatusCode::NO_CONTENT)
}
