//! Time-window status evaluator

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a mailing, derived from its time window.
///
/// The status is never stored; it is recomputed from the current time
/// on every read, so two reads a moment apart may legitimately differ.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MailingStatus {
    Created,
    Running,
    Finished,
}

impl MailingStatus {
    /// Compute the status at `now` for the window `[start, end]`.
    ///
    /// Both boundaries are inclusive: a mailing is Running at exactly
    /// its start time and at exactly its end time.
    pub fn at(now: DateTime<Utc>, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        if now < start {
            MailingStatus::Created
        } else if now <= end {
            MailingStatus::Running
        } else {
            MailingStatus::Finished
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MailingStatus::Created => "created",
            MailingStatus::Running => "running",
            MailingStatus::Finished => "finished",
        }
    }
}

impl std::fmt::Display for MailingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
