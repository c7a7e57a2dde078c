//! Mail transport seam and its SMTP implementation.

use std::sync::Arc;

use async_trait::async_trait;
use lettre::message::{Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::config::SmtpConfig;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MailError {
    #[error("invalid email address: {0}")]
    InvalidAddress(String),
    #[error("failed to build message: {0}")]
    Build(String),
    #[error("SMTP error: {0}")]
    Smtp(String),
}

/// Body variants accepted by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmailBody {
    Text(String),
    Html(String),
    Multipart { text: String, html: String },
}

/// Fully addressed message ready for a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub from: Option<String>,
    pub to: Vec<String>,
    pub reply_to: Option<String>,
    pub subject: String,
    pub body: EmailBody,
}

/// What the relay said when it accepted a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReceipt {
    pub code: String,
}

/// Async mail transport. Substitute this to exercise the pipeline without a relay.
#[async_trait]
pub trait Mailer: Send + Sync + 'static {
    async fn send(&self, email: &Email) -> Result<DeliveryReceipt, MailError>;

    /// Probe the relay without sending anything.
    async fn verify(&self) -> Result<bool, MailError>;
}

/// SMTP-based mailer using lettre.
#[derive(Clone)]
pub struct SmtpMailer {
    transport: Arc<AsyncSmtpTransport<Tokio1Executor>>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn from_config(config: &SmtpConfig) -> Result<Self, MailError> {
        let from: Mailbox = config
            .from
            .parse()
            .map_err(|_| MailError::InvalidAddress(config.from.clone()))?;

        let builder = if config.implicit_tls() {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
        }
        .map_err(|e| MailError::Smtp(e.to_string()))?;

        let transport = builder
            .port(config.port)
            .timeout(Some(config.timeout))
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .build();

        Ok(Self {
            transport: Arc::new(transport),
            from,
        })
    }

    fn build_message(&self, email: &Email) -> Result<Message, MailError> {
        let from = match &email.from {
            Some(from) => parse_mailbox(from)?,
            None => self.from.clone(),
        };

        let mut builder = Message::builder().from(from);
        for to in &email.to {
            builder = builder.to(parse_mailbox(to)?);
        }
        if let Some(reply_to) = &email.reply_to {
            builder = builder.reply_to(parse_mailbox(reply_to)?);
        }
        builder = builder.subject(&email.subject);

        let message = match &email.body {
            EmailBody::Text(text) => builder.body(text.clone()),
            EmailBody::Html(html) => builder.singlepart(SinglePart::html(html.clone())),
            EmailBody::Multipart { text, html } => builder.multipart(
                MultiPart::alternative_plain_html(text.clone(), html.clone()),
            ),
        };

        message.map_err(|e| MailError::Build(e.to_string()))
    }
}

fn parse_mailbox(raw: &str) -> Result<Mailbox, MailError> {
    raw.parse()
        .map_err(|_| MailError::InvalidAddress(raw.to_string()))
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: &Email) -> Result<DeliveryReceipt, MailError> {
        let message = self.build_message(email)?;

        let response = self
            .transport
            .send(message)
            .await
            .map_err(|e| MailError::Smtp(e.to_string()))?;

        Ok(DeliveryReceipt {
            code: response.code().to_string(),
        })
    }

    async fn verify(&self) -> Result<bool, MailError> {
        self.transport
            .test_connection()
            .await
            .map_err(|e| MailError::Smtp(e.to_string()))
    }
}
