//! Mail transport seam
//!
//! The dispatcher talks to the outside world through `MailTransport`
//! only; the production implementation relays through a configured SMTP
//! server via lettre.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use mailflow_common::config::SmtpConfig;
use mailflow_common::{Error, Result};
use thiserror::Error;

/// A single send failed. The description ends up verbatim in the
/// attempt's server_response.
#[derive(Error, Debug, Clone)]
#[error("{0}")]
pub struct TransportError(pub String);

/// Mail-sending collaborator: one blocking call per recipient.
///
/// On success the confirmation text is returned; errors are absorbed by
/// the dispatch loop into Failed attempts and never propagate raw.
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(
        &self,
        from: &str,
        subject: &str,
        body: &str,
        recipient: &str,
    ) -> std::result::Result<String, TransportError>;
}

/// SMTP relay transport backed by lettre
pub struct SmtpRelayTransport {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    fallback_from: String,
}

impl SmtpRelayTransport {
    /// Build the relay transport from the `[smtp]` config section
    pub fn from_config(config: &SmtpConfig) -> Result<Self> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .map_err(|e| Error::Smtp(format!("Invalid SMTP relay: {}", e)))?
            .port(config.port);

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            fallback_from: config.from_address.clone(),
        })
    }
}

#[async_trait]
impl MailTransport for SmtpRelayTransport {
    async fn send(
        &self,
        from: &str,
        subject: &str,
        body: &str,
        recipient: &str,
    ) -> std::result::Result<String, TransportError> {
        let from = if from.is_empty() {
            &self.fallback_from
        } else {
            from
        };

        let email = Message::builder()
            .from(
                from.parse()
                    .map_err(|e| TransportError(format!("Invalid sender address: {}", e)))?,
            )
            .to(recipient
                .parse()
                .map_err(|e| TransportError(format!("Invalid recipient address: {}", e)))?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| TransportError(format!("Failed to build message: {}", e)))?;

        let response = self
            .transport
            .send(email)
            .await
            .map_err(|e| TransportError(e.to_string()))?;

        Ok(format!(
            "{} {}",
            response.code(),
            response.message().collect::<Vec<_>>().join(" ")
        ))
    }
}
