//! Session authentication

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use mailflow_common::types::{UserId, UserRole};
use mailflow_core::policy::Actor;
use mailflow_core::{MailTransport, MailingDispatcher, StatsService};
use mailflow_storage::repository::{SessionRepository, SessionRepositoryTrait};
use mailflow_storage::DatabasePool;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{error, warn};

/// Application state shared across handlers
pub struct AppState {
    pub db_pool: DatabasePool,
    pub transport: Arc<dyn MailTransport>,
    pub dispatcher: MailingDispatcher,
    pub stats: StatsService,
    pub secret_key: String,
    pub hostname: String,
    pub from_address: String,
    pub stats_cache_secs: u64,
}

/// Authenticated context extracted from the session token
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: UserId,
    pub role: UserRole,
    pub is_blocked: bool,
}

impl AuthContext {
    /// The policy-layer view of this context
    pub fn actor(&self) -> Actor {
        Actor {
            user_id: self.user_id,
            role: self.role,
            is_blocked: self.is_blocked,
        }
    }
}

/// Extract the bearer token from a request
pub fn extract_bearer_token(req: &Request) -> Option<&str> {
    let auth = req.headers().get("authorization")?;
    let auth_str = auth.to_str().ok()?;
    auth_str.strip_prefix("Bearer ")
}

/// Hash a session token for storage and lookup
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Authentication middleware
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let path = request.uri().path();

    // Health and the signup/login/activation flow are reachable without
    // a session
    if path.starts_with("/health") || path.starts_with("/api/v1/auth") {
        return Ok(next.run(request).await);
    }

    let token = extract_bearer_token(&request).ok_or_else(|| {
        warn!("Missing bearer token in request to {}", request.uri().path());
        StatusCode::UNAUTHORIZED
    })?;

    let repo = SessionRepository::new(state.db_pool.clone());
    let user = repo
        .user_for_token(&hash_token(token))
        .await
        .map_err(|e| {
            error!("Database error while looking up session: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let role = user.role.parse::<UserRole>().map_err(|e| {
        error!("Corrupt role for user {}: {}", user.id, e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    let auth_context = AuthContext {
        user_id: user.id,
        role,
        is_blocked: user.is_blocked,
    };

    request.extensions_mut().insert(auth_context);

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::hash_token;
    use pretty_assertions::assert_eq;

    #[test]
    fn token_hash_is_stable_and_hex() {
        let a = hash_token("session-token");
        let b = hash_token("session-token");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(hash_token("other-token"), a);
    }
}
