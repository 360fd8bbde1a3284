//! Mailing validation pipeline
//!
//! One ordered pipeline, invoked identically from the create and update
//! handlers before any write: the first failing rule wins and the write
//! is prevented entirely.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Validation failure for a mailing's window and recipient set.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MailingValidationError {
    #[error("Start and end time must both be set")]
    MissingWindow,

    #[error("Start time must not be in the past")]
    StartTimeInPast { start_time: DateTime<Utc> },

    #[error("End time must be after the start time")]
    EndNotAfterStart { end_time: DateTime<Utc> },

    #[error("Select at least one recipient")]
    EmptyRecipients,
}

impl MailingValidationError {
    /// The form field this error is scoped to.
    pub fn field(&self) -> &'static str {
        match self {
            MailingValidationError::MissingWindow => "start_time",
            MailingValidationError::StartTimeInPast { .. } => "start_time",
            MailingValidationError::EndNotAfterStart { .. } => "end_time",
            MailingValidationError::EmptyRecipients => "recipients",
        }
    }
}

/// Validate a mailing's time window against `now`.
///
/// Rules, in order:
/// 1. both endpoints present;
/// 2. start must not be in the past (start == now is accepted);
/// 3. start must be strictly before end (equal endpoints rejected).
pub fn validate_window(
    start_time: Option<DateTime<Utc>>,
    end_time: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Result<(), MailingValidationError> {
    let (start, end) = match (start_time, end_time) {
        (Some(start), Some(end)) => (start, end),
        _ => return Err(MailingValidationError::MissingWindow),
    };

    if start < now {
        return Err(MailingValidationError::StartTimeInPast { start_time: start });
    }

    if start >= end {
        return Err(MailingValidationError::EndNotAfterStart { end_time: end });
    }

    Ok(())
}

/// Validate a full mailing submission: the window rules, then the
/// recipient set.
pub fn validate_mailing(
    start_time: Option<DateTime<Utc>>,
    end_time: Option<DateTime<Utc>>,
    recipient_count: usize,
    now: DateTime<Utc>,
) -> Result<(), MailingValidationError> {
    validate_window(start_time, end_time, now)?;

    if recipient_count == 0 {
        return Err(MailingValidationError::EmptyRecipients);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use pretty_assertions::assert_eq;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn rejects_missing_endpoints() {
        let now = t(0);
        assert_eq!(
            validate_window(None, Some(t(10)), now),
            Err(MailingValidationError::MissingWindow)
        );
        assert_eq!(
            validate_window(Some(t(10)), None, now),
            Err(MailingValidationError::MissingWindow)
        );
        assert_eq!(
            validate_window(None, None, now),
            Err(MailingValidationError::MissingWindow)
        );
    }

    #[test]
    fn rejects_start_in_past_regardless_of_end() {
        let now = t(100);
        for end in [t(50), t(100), t(5000)] {
            assert_eq!(
                validate_window(Some(t(99)), Some(end), now),
                Err(MailingValidationError::StartTimeInPast { start_time: t(99) })
            );
        }
    }

    #[test]
    fn accepts_start_equal_to_now() {
        let now = t(100);
        assert_eq!(validate_window(Some(now), Some(t(200)), now), Ok(()));
    }

    #[test]
    fn rejects_unordered_window_even_when_start_is_future() {
        let now = t(0);
        assert_eq!(
            validate_window(Some(t(200)), Some(t(100)), now),
            Err(MailingValidationError::EndNotAfterStart { end_time: t(100) })
        );
    }

    #[test]
    fn rejects_zero_length_window() {
        let now = t(0);
        assert_eq!(
            validate_window(Some(t(100)), Some(t(100)), now),
            Err(MailingValidationError::EndNotAfterStart { end_time: t(100) })
        );
    }

    #[test]
    fn window_rules_run_before_recipient_rule() {
        let now = t(100);
        // Both the window and the recipient set are invalid; the window
        // rule surfaces first.
        assert_eq!(
            validate_mailing(Some(t(0)), Some(t(200)), 0, now),
            Err(MailingValidationError::StartTimeInPast { start_time: t(0) })
        );
    }

    #[test]
    fn rejects_empty_recipients() {
        let now = t(0);
        assert_eq!(
            validate_mailing(Some(t(100)), Some(t(200)), 0, now),
            Err(MailingValidationError::EmptyRecipients)
        );
    }

    #[test]
    fn accepts_valid_submission() {
        let now = t(0);
        assert_eq!(validate_mailing(Some(t(1)), Some(t(2)), 3, now), Ok(()));
        assert_eq!(
            validate_mailing(Some(now), Some(now + Duration::seconds(1)), 1, now),
            Ok(())
        );
    }

    #[test]
    fn errors_are_field_scoped() {
        assert_eq!(MailingValidationError::MissingWindow.field(), "start_time");
        assert_eq!(
            MailingValidationError::StartTimeInPast { start_time: t(0) }.field(),
            "start_time"
        );
        assert_eq!(
            MailingValidationError::EndNotAfterStart { end_time: t(0) }.field(),
            "end_time"
        );
        assert_eq!(MailingValidationError::EmptyRecipients.field(), "recipients");
    }
}
