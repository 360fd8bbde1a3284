//! Account handlers: signup, activation, login, logout

use argon2::password_hash::{rand_core::OsRng, PasswordHasher, SaltString};
use argon2::{Argon2, PasswordHash, PasswordVerifier};
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use mailflow_common::types::UserId;
use mailflow_core::{activation_token, verify_activation_token, MailTransport};
use mailflow_storage::models::CreateUser;
use mailflow_storage::repository::{
    SessionRepository, SessionRepositoryTrait, UserRepository, UserRepositoryTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::auth::{hash_token, AppState};
use crate::handlers::{api_error, internal_error, storage_error, ApiError};

/// Request body for signup
#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
}

/// Signup response
#[derive(Debug, Serialize)]
pub struct SignupResponse {
    pub id: UserId,
    pub email: String,
    /// Activation is required before login
    pub is_active: bool,
}

/// Request body for login
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Login response
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
}

/// Activation response
#[derive(Debug, Serialize)]
pub struct ActivateResponse {
    pub activated: bool,
}

/// Register a new account and email an activation link
///
/// POST /api/v1/auth/signup
pub async fn signup(
    State(state): State<Arc<AppState>>,
    Json(input): Json<SignupRequest>,
) -> Result<(StatusCode, Json<SignupResponse>), ApiError> {
    if input.email.is_empty() {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "validation_error",
            "Email is required",
        ));
    }
    if input.password.len() < 8 {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "validation_error",
            "Password must be at least 8 characters",
        ));
    }

    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(input.password.as_bytes(), &salt)
        .map_err(|e| {
            error!("Failed to hash password: {}", e);
            internal_error("Failed to create account")
        })?
        .to_string();

    let repo = UserRepository::new(state.db_pool.clone());
    let user = repo
        .create(CreateUser {
            email: input.email,
            password_hash,
            role: "user".to_string(),
        })
        .await
        .map_err(storage_error)?;

    let token = activation_token(&state.secret_key, user.id, &user.password_hash);
    let link = format!(
        "http://{}/api/v1/auth/activate/{}/{}",
        state.hostname, user.id, token
    );
    let body = format!("Follow this link to activate your account: {}", link);

    // A failed activation email is logged, not fatal; the account
    // exists and support can resend the link.
    if let Err(e) = state
        .transport
        .send(&state.from_address, "Confirm your registration", &body, &user.email)
        .await
    {
        error!("Failed to send activation email to {}: {}", user.email, e);
    }

    info!("Created account {} (inactive)", user.id);

    Ok((
        StatusCode::CREATED,
        Json(SignupResponse {
            id: user.id,
            email: user.email,
            is_active: false,
        }),
    ))
}

/// Activate an account from an emailed token
///
/// GET /api/v1/auth/activate/:user_id/:token
pub async fn activate(
    State(state): State<Arc<AppState>>,
    Path((user_id, token)): Path<(UserId, String)>,
) -> Result<Json<ActivateResponse>, ApiError> {
    let repo = UserRepository::new(state.db_pool.clone());

    let user = repo
        .get(user_id)
        .await
        .map_err(storage_error)?
        .ok_or_else(|| api_error(StatusCode::BAD_REQUEST, "invalid_token", "Invalid activation link"))?;

    if user.is_active {
        return Ok(Json(ActivateResponse { activated: true }));
    }

    if !verify_activation_token(&state.secret_key, user.id, &user.password_hash, &token) {
        warn!("Invalid activation token for user {}", user.id);
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "invalid_token",
            "Invalid activation link",
        ));
    }

    repo.set_active(user.id, true).await.map_err(storage_error)?;

    info!("Activated account {}", user.id);

    Ok(Json(ActivateResponse { activated: true }))
}

/// Log in and mint a session token
///
/// POST /api/v1/auth/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(input): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let invalid =
        || api_error(StatusCode::UNAUTHORIZED, "unauthorized", "Invalid email or password");

    let repo = UserRepository::new(state.db_pool.clone());
    let user = repo
        .get_by_email(&input.email)
        .await
        .map_err(storage_error)?
        .ok_or_else(invalid)?;

    let parsed_hash = PasswordHash::new(&user.password_hash).map_err(|e| {
        error!("Corrupt password hash for user {}: {}", user.id, e);
        internal_error("Failed to log in")
    })?;

    if Argon2::default()
        .verify_password(input.password.as_bytes(), &parsed_hash)
        .is_err()
    {
        return Err(invalid());
    }

    if !user.is_active {
        return Err(api_error(
            StatusCode::FORBIDDEN,
            "not_activated",
            "Account has not been activated",
        ));
    }

    if user.is_blocked {
        return Err(api_error(
            StatusCode::FORBIDDEN,
            "blocked",
            "Account is blocked",
        ));
    }

    let token = format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple());

    let sessions = SessionRepository::new(state.db_pool.clone());
    sessions
        .create(&hash_token(&token), user.id)
        .await
        .map_err(storage_error)?;

    info!("User {} logged in", user.id);

    Ok(Json(LoginResponse { token }))
}

/// Log out - delete the current session
///
/// POST /api/v1/auth/logout
pub async fn logout(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    let token = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| api_error(StatusCode::UNAUTHORIZED, "unauthorized", "Missing token"))?;

    let sessions = SessionRepository::new(state.db_pool.clone());
    sessions
        .delete(&hash_token(token))
        .await
        .map_err(storage_error)?;

    Ok(StatusCode::NO_CONTENT)
}
