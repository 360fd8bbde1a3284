//! Database models

use chrono::{DateTime, Utc};
use mailflow_common::types::{AttemptId, ClientId, MailingId, MessageId, UserId};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// User account model
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub is_blocked: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Client model - a mailing recipient owned by a user
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Client {
    pub id: ClientId,
    pub owner_id: UserId,
    pub email: String,
    pub full_name: String,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

/// Message model - shared, ownerless content container
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub subject: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

/// Mailing model
///
/// The lifecycle status is never stored here; it is derived from the
/// time window on every read (see `mailflow_core::MailingStatus`).
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Mailing {
    pub id: MailingId,
    pub owner_id: UserId,
    pub sender_email: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub message_id: MessageId,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Outcome of one send attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttemptStatus {
    Success,
    Failed,
}

impl AttemptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptStatus::Success => "success",
            AttemptStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for AttemptStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AttemptStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(AttemptStatus::Success),
            "failed" => Ok(AttemptStatus::Failed),
            other => Err(format!("unknown attempt status: {}", other)),
        }
    }
}

/// Mailing attempt model - one immutable audit record per send action
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct MailingAttempt {
    pub id: AttemptId,
    pub mailing_id: MailingId,
    pub attempt_time: DateTime<Utc>,
    pub status: String,
    pub server_response: String,
}

/// Input for creating a user
#[derive(Debug, Clone)]
pub struct CreateUser {
    pub email: String,
    pub password_hash: String,
    pub role: String,
}

/// Input for creating a client
#[derive(Debug, Clone)]
pub struct CreateClient {
    pub owner_id: UserId,
    pub email: String,
    pub full_name: String,
    pub comment: String,
}

/// Input for updating a client
#[derive(Debug, Clone, Default)]
pub struct UpdateClient {
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub comment: Option<String>,
}

/// Input for creating a message
#[derive(Debug, Clone)]
pub struct CreateMessage {
    pub subject: String,
    pub body: String,
}

/// Input for updating a message
#[derive(Debug, Clone, Default)]
pub struct UpdateMessage {
    pub subject: Option<String>,
    pub body: Option<String>,
}

/// Input for creating a mailing
#[derive(Debug, Clone)]
pub struct CreateMailing {
    pub owner_id: UserId,
    pub sender_email: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub message_id: MessageId,
    pub recipient_ids: Vec<ClientId>,
}

/// Input for updating a mailing
#[derive(Debug, Clone, Default)]
pub struct UpdateMailing {
    pub sender_email: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub message_id: Option<MessageId>,
    pub recipient_ids: Option<Vec<ClientId>>,
    pub is_active: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn attempt_status_round_trips() {
        assert_eq!(
            "success".parse::<AttemptStatus>().unwrap(),
            AttemptStatus::Success
        );
        assert_eq!(
            "failed".parse::<AttemptStatus>().unwrap(),
            AttemptStatus::Failed
        );
        assert_eq!(AttemptStatus::Success.to_string(), "success");
        assert!("pending".parse::<AttemptStatus>().is_err());
    }
}
