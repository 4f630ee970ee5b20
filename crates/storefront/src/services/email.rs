//! Transactional email over SMTP.
//!
//! Uses lettre for delivery with Askama HTML and plain-text templates.

use askama::Template;
use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{MultiPart, SinglePart, header::ContentType},
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use secrecy::ExposeSecret;
use thiserror::Error;
use tracing::instrument;

use vitrine_core::Email;

use super::otp::Mailer;
use crate::config::EmailConfig;

#[derive(Template)]
#[template(path = "email/verification_code.html")]
struct VerificationCodeHtml<'a> {
    name: &'a str,
    code: &'a str,
}

#[derive(Template)]
#[template(path = "email/verification_code.txt")]
struct VerificationCodeText<'a> {
    name: &'a str,
    code: &'a str,
}

#[derive(Template)]
#[template(path = "email/password_reset.html")]
struct PasswordResetHtml<'a> {
    name: &'a str,
    link: &'a str,
}

#[derive(Template)]
#[template(path = "email/password_reset.txt")]
struct PasswordResetText<'a> {
    name: &'a str,
    link: &'a str,
}

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

    /// Template rendering error.
    #[error("Template error: {0}")]
    Template(#[from] askama::Error),
}

/// SMTP-backed [`Mailer`].
#[derive(Clone)]
pub struct EmailService {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

impl EmailService {
    /// Create a new email service from configuration.
    ///
    /// The connection is opened lazily on first send.
    ///
    /// # Errors
    ///
    /// Returns error if the relay host is invalid.
    pub fn new(config: &EmailConfig) -> Result<Self, SmtpError> {
        let credentials = Credentials::new(
            config.smtp_username.clone(),
            config.smtp_password.expose_secret().to_string(),
        );

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
            .port(config.smtp_port)
            .credentials(credentials)
            .build();

        Ok(Self {
            mailer,
            from_address: config.from_address.clone(),
        })
    }

    async fn send_multipart_email(
        &self,
        to: &str,
        subject: &str,
        text_body: String,
        html_body: String,
    ) -> Result<(), EmailError> {
        let email = Message::builder()
            .from(
                self.from_address
                    .parse()
                    .map_err(|_| EmailError::InvalidAddress(self.from_address.clone()))?,
            )
            .to(to
                .parse()
                .map_err(|_| EmailError::InvalidAddress(to.to_string()))?)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(text_body),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html_body),
                    ),
            )?;

        self.mailer.send(email).await?;
        Ok(())
    }
}

#[async_trait]
impl Mailer for EmailService {
    #[instrument(skip(self, name, code), fields(to = %to))]
    async fn send_verification_code(
        &self,
        to: &Email,
        name: &str,
        code: &str,
    ) -> Result<(), EmailError> {
        let html = VerificationCodeHtml { name, code }.render()?;
        let text = VerificationCodeText { name, code }.render()?;

        self.send_multipart_email(to.as_str(), "Seu código de verificação", text, html)
            .await
    }

    #[instrument(skip(self, name, link), fields(to = %to))]
    async fn send_password_reset(
        &self,
        to: &Email,
        name: &str,
        link: &str,
    ) -> Result<(), EmailError> {
        let html = PasswordResetHtml { name, link }.render()?;
        let text = PasswordResetText { name, link }.render()?;

        self.send_multipart_email(to.as_str(), "Redefinição de senha", text, html)
            .await
    }
}
