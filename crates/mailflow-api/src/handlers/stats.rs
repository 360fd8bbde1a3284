//! Statistics handlers

use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use mailflow_core::OwnerStats;
use mailflow_storage::repository::{
    ClientRepository, ClientRepositoryTrait, MailingRepository, MailingRepositoryTrait,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::error;

use crate::auth::{AppState, AuthContext};
use crate::handlers::{internal_error, storage_error, ApiError};

/// Service-wide overview counts
#[derive(Debug, Serialize)]
pub struct OverviewResponse {
    pub total_mailings: i64,
    pub running_mailings: i64,
    pub total_clients: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub earliest_running_start: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_running_end: Option<DateTime<Utc>>,
    pub last_updated: DateTime<Utc>,
}

fn cache_headers(max_age: u64) -> Result<HeaderMap, ApiError> {
    let value = HeaderValue::from_str(&format!("public, max-age={}", max_age)).map_err(|e| {
        error!("Invalid cache-control value: {}", e);
        internal_error("Failed to build response")
    })?;
    let mut headers = HeaderMap::new();
    headers.insert(header::CACHE_CONTROL, value);
    Ok(headers)
}

/// Delivery statistics for the authenticated owner.
///
/// The counts only grow while mailings run, so a short public cache
/// window returns briefly stale but never misleading numbers.
///
/// GET /api/v1/stats
pub async fn owner_stats(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
) -> Result<(HeaderMap, Json<OwnerStats>), ApiError> {
    let stats = state
        .stats
        .for_owner(auth.user_id)
        .await
        .map_err(storage_error)?;

    Ok((cache_headers(state.stats_cache_secs)?, Json(stats)))
}

/// Service-wide overview of mailing activity
///
/// GET /api/v1/overview
pub async fn overview(
    State(state): State<Arc<AppState>>,
    Extension(_auth): Extension<AuthContext>,
) -> Result<(StatusCode, HeaderMap, Json<OverviewResponse>), ApiError> {
    let now = Utc::now();

    let mailing_repo = MailingRepository::new(state.db_pool.clone());
    let client_repo = ClientRepository::new(state.db_pool.clone());

    let total_mailings = mailing_repo.count_all().await.map_err(storage_error)?;
    let running_mailings = mailing_repo.count_running(now).await.map_err(storage_error)?;
    let total_clients = client_repo.count_all().await.map_err(storage_error)?;

    let running = mailing_repo.list_running(now).await.map_err(storage_error)?;
    let earliest_running_start = running.iter().map(|m| m.start_time).min();
    let latest_running_end = running.iter().map(|m| m.end_time).max();

    let body = OverviewResponse {
        total_mailings,
        running_mailings,
        total_clients,
        earliest_running_start,
        latest_running_end,
        last_updated: now,
    };

    Ok((
        StatusCode::OK,
        cache_headers(state.stats_cache_secs)?,
        Json(body),
    ))
}
