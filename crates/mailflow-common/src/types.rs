//! Common types for Mailflow

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for users
pub type UserId = Uuid;

/// Unique identifier for clients (mailing recipients)
pub type ClientId = Uuid;

/// Unique identifier for messages
pub type MessageId = Uuid;

/// Unique identifier for mailings
pub type MailingId = Uuid;

/// Unique identifier for mailing attempts
pub type AttemptId = Uuid;

/// User role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    User,
    Manager,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::User => "user",
            UserRole::Manager => "manager",
        }
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(UserRole::User),
            "manager" => Ok(UserRole::Manager),
            other => Err(format!("unknown user role: {}", other)),
        }
    }
}
