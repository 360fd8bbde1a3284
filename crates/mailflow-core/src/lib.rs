//! Mailflow Core - Mailing lifecycle, validation, and send dispatch
//!
//! This crate provides the domain logic of Mailflow: the time-window
//! status evaluator, the mailing validation pipeline, the send
//! dispatcher with its per-attempt audit trail, owner statistics, the
//! access policy, and the SMTP transport seam.

pub mod activation;
pub mod dispatch;
pub mod policy;
pub mod stats;
pub mod transport;
pub mod validate;
pub mod window;

pub use activation::{activation_token, verify_activation_token};
pub use dispatch::{AttemptSink, DispatchError, DispatchSummary, MailingDispatcher};
pub use policy::{can_access, Action, Actor, Resource};
pub use stats::{OwnerStats, StatsService};
pub use transport::{MailTransport, SmtpRelayTransport, TransportError};
pub use validate::{validate_mailing, validate_window, MailingValidationError};
pub use window::MailingStatus;
