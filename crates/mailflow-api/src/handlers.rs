//! Request handlers

pub mod accounts;
pub mod clients;
pub mod health;
pub mod mailings;
pub mod messages;
pub mod stats;
pub mod users;

use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

/// Error response
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

pub(crate) type ApiError = (StatusCode, Json<ErrorResponse>);

pub(crate) fn api_error(status: StatusCode, error: &str, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
            message: message.into(),
        }),
    )
}

pub(crate) fn internal_error(message: &str) -> ApiError {
    api_error(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", message)
}

pub(crate) fn not_found(message: &str) -> ApiError {
    api_error(StatusCode::NOT_FOUND, "not_found", message)
}

pub(crate) fn forbidden() -> ApiError {
    api_error(
        StatusCode::FORBIDDEN,
        "forbidden",
        "Not authorized for this resource",
    )
}

/// Map a storage-layer error to an API error via the error's own
/// status and code. Server-side failures get an opaque message.
pub(crate) fn storage_error(e: mailflow_common::Error) -> ApiError {
    let status =
        StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let message = if status.is_server_error() {
        "Storage operation failed".to_string()
    } else {
        e.to_string()
    };
    api_error(status, e.code(), message)
}

/// Query parameters for list endpoints
#[derive(Debug, serde::Deserialize)]
pub struct ListQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    50
}

#[cfg(test)]
mod tests {
    use super::*;
    use mailflow_common::Error;
    use pretty_assertions::assert_eq;

    #[test]
    fn storage_errors_use_the_error_status_and_code() {
        let (status, body) = storage_error(Error::Validation(
            "A client with this email already exists".to_string(),
        ));
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body.error, "VALIDATION_ERROR");
        assert!(body.message.contains("already exists"));

        let (status, body) = storage_error(Error::NotFound("no such row".to_string()));
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body.error, "NOT_FOUND");
    }

    #[test]
    fn server_side_storage_errors_stay_opaque() {
        let (status, body) = storage_error(Error::Database(
            "connection refused: internal-db.example.net:5432".to_string(),
        ));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.error, "DATABASE_ERROR");
        assert!(!body.message.contains("internal-db"));
    }
}
