//! Transactional email.
//!
//! Sends over SMTP via lettre when configured. Without SMTP the message is
//! written to the log so password resets still work in development.

use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::header::ContentType,
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use secrecy::ExposeSecret;
use thiserror::Error;

use cartwright_core::{Email, UserRole};

use crate::config::{EmailConfig, StorefrontConfig};

/// Errors that can occur when sending email.
#[derive(Debug, Error)]
pub enum EmailError {
    /// SMTP transport error.
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    /// Failed to build email message.
    #[error("Failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),
}

/// Outbound mail channel.
#[derive(Clone)]
pub enum Mailer {
    /// Deliver through an SMTP relay.
    Smtp {
        transport: AsyncSmtpTransport<Tokio1Executor>,
        from_address: String,
        base_url: String,
    },
    /// Log the message instead of sending it.
    Log { base_url: String },
}

impl std::fmt::Debug for Mailer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Smtp { from_address, .. } => f
                .debug_struct("Mailer::Smtp")
                .field("from_address", from_address)
                .finish_non_exhaustive(),
            Self::Log { base_url } => f
                .debug_struct("Mailer::Log")
                .field("base_url", base_url)
                .finish(),
        }
    }
}

impl Mailer {
    /// Build the mailer for `config`.
    ///
    /// # Errors
    ///
    /// Returns error if the SMTP relay cannot be configured.
    pub fn from_config(config: &StorefrontConfig) -> Result<Self, SmtpError> {
        let base_url = config.base_url.trim_end_matches('/').to_owned();
        match &config.email {
            Some(email) => Self::smtp(email, base_url),
            None => Ok(Self::Log { base_url }),
        }
    }

    fn smtp(config: &EmailConfig, base_url: String) -> Result<Self, SmtpError> {
        let credentials = Credentials::new(
            config.smtp_username.clone(),
            config.smtp_password.expose_secret().to_string(),
        );

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
            .port(config.smtp_port)
            .credentials(credentials)
            .build();

        Ok(Self::Smtp {
            transport,
            from_address: config.from_address.clone(),
            base_url,
        })
    }

    /// Link the user follows to choose a new password.
    #[must_use]
    pub fn reset_link(&self, token: &str) -> String {
        let base_url = match self {
            Self::Smtp { base_url, .. } | Self::Log { base_url } => base_url,
        };
        format!("{base_url}/reset-password?token={token}")
    }

    /// Send the password reset email.
    ///
    /// # Errors
    ///
    /// Returns error if the message cannot be built or delivered.
    pub async fn send_password_reset(
        &self,
        to: &Email,
        token: &str,
        role: UserRole,
    ) -> Result<(), EmailError> {
        let link = self.reset_link(token);
        let body = format!(
            "We received a request to reset the password for your {role} account.\n\n\
             Open this link to choose a new password:\n{link}\n\n\
             The link can be used once. If you did not ask for a reset, ignore this email.\n"
        );

        match self {
            Self::Smtp {
                transport,
                from_address,
                ..
            } => {
                let email = Message::builder()
                    .from(
                        from_address
                            .parse()
                            .map_err(|_| EmailError::InvalidAddress(from_address.clone()))?,
                    )
                    .to(to
                        .as_str()
                        .parse()
                        .map_err(|_| EmailError::InvalidAddress(to.to_string()))?)
                    .subject("Reset your password")
                    .header(ContentType::TEXT_PLAIN)
                    .body(body)?;

                transport.send(email).await?;
                tracing::info!(to = %to, "Password reset email sent");
            }
            Self::Log { .. } => {
                tracing::info!(to = %to, %link, "SMTP not configured; password reset link");
            }
        }
        Ok(())
    }
}
