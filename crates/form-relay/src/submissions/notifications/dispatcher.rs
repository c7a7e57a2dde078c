use std::time::Duration;

use tracing::{debug, error, info, warn};

use super::mailer::{Email, EmailBody, Mailer, SmtpMailer};
use super::template::{EmailTemplate, TemplateData};
use crate::config::{AppConfig, AppEnvironment};

const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Fixed at startup: whether transport credentials were present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatcherState {
    Unconfigured,
    Configured,
}

/// Message bodies, either ready-made or rendered from a template at send time.
#[derive(Debug, Clone)]
pub enum EmailContent<'a> {
    Bodies {
        html: Option<String>,
        text: Option<String>,
    },
    Template {
        template: &'a EmailTemplate,
        data: &'a TemplateData,
    },
}

impl EmailContent<'_> {
    fn into_body(self) -> EmailBody {
        let (html, text) = match self {
            EmailContent::Bodies { html, text } => (html, text),
            EmailContent::Template { template, data } => {
                let rendered = template.render(data);
                (Some(rendered.html), Some(rendered.text))
            }
        };

        match (html, text) {
            (Some(html), Some(text)) => EmailBody::Multipart { text, html },
            (Some(html), None) => EmailBody::Html(html),
            (None, text) => EmailBody::Text(text.unwrap_or_default()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EmailOptions<'a> {
    pub to: Vec<String>,
    pub subject: String,
    pub from: Option<String>,
    pub reply_to: Option<String>,
    pub content: EmailContent<'a>,
}

/// Result of a dispatch attempt. Never an error: callers branch on `success`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub success: bool,
    /// True only when a relay accepted the message.
    pub sent: bool,
    pub detail: Option<String>,
}

impl DispatchOutcome {
    fn skipped(reason: &str) -> Self {
        Self {
            success: true,
            sent: false,
            detail: Some(reason.to_string()),
        }
    }

    fn delivered(code: String) -> Self {
        Self {
            success: true,
            sent: true,
            detail: Some(code),
        }
    }

    fn failed(detail: String) -> Self {
        Self {
            success: false,
            sent: false,
            detail: Some(detail),
        }
    }
}

/// Settings captured once when the dispatcher is built.
#[derive(Debug, Clone)]
pub struct DispatchSettings {
    pub environment: AppEnvironment,
    pub default_from: Option<String>,
    pub timeout: Duration,
}

impl DispatchSettings {
    pub fn new(environment: AppEnvironment) -> Self {
        Self {
            environment,
            default_from: None,
            timeout: DEFAULT_SEND_TIMEOUT,
        }
    }
}

/// Hands composed messages to a mail transport, or logs them when delivery is off.
pub struct NotificationDispatcher<M> {
    mailer: Option<M>,
    settings: DispatchSettings,
}

impl NotificationDispatcher<SmtpMailer> {
    /// Build from configuration. Missing credentials or a transport that cannot be
    /// built leave the dispatcher unconfigured.
    pub fn from_config(config: &AppConfig) -> Self {
        let Some(smtp) = &config.smtp else {
            warn!("email service not configured: missing SMTP credentials");
            return Self::unconfigured(DispatchSettings::new(config.environment));
        };

        match SmtpMailer::from_config(smtp) {
            Ok(mailer) => Self::configured(
                mailer,
                DispatchSettings {
                    environment: config.environment,
                    default_from: Some(smtp.from.clone()),
                    timeout: smtp.timeout,
                },
            ),
            Err(err) => {
                warn!(error = %err, "email service not configured: SMTP transport could not be built");
                Self::unconfigured(DispatchSettings::new(config.environment))
            }
        }
    }
}

impl<M: Mailer> NotificationDispatcher<M> {
    pub fn configured(mailer: M, settings: DispatchSettings) -> Self {
        Self {
            mailer: Some(mailer),
            settings,
        }
    }

    pub fn unconfigured(settings: DispatchSettings) -> Self {
        Self {
            mailer: None,
            settings,
        }
    }

    pub fn state(&self) -> DispatcherState {
        if self.mailer.is_some() {
            DispatcherState::Configured
        } else {
            DispatcherState::Unconfigured
        }
    }

    /// The mailer to use, or why delivery is skipped.
    fn live_mailer(&self) -> Result<&M, &'static str> {
        match &self.mailer {
            None => Err("email service not configured"),
            Some(_) if !self.settings.environment.is_production() => {
                Err("email delivery disabled outside production")
            }
            Some(mailer) => Ok(mailer),
        }
    }

    pub async fn send(&self, options: EmailOptions<'_>) -> DispatchOutcome {
        let EmailOptions {
            to,
            subject,
            from,
            reply_to,
            content,
        } = options;
        let body = content.into_body();

        let mailer = match self.live_mailer() {
            Ok(mailer) => mailer,
            Err(reason) => {
                info!(
                    event = "email_skipped",
                    to = ?to,
                    subject = %subject,
                    reason,
                    "email would be sent in production"
                );
                debug!(body = ?body, "suppressed email body");
                return DispatchOutcome::skipped(reason);
            }
        };

        let email = Email {
            from: from.or_else(|| self.settings.default_from.clone()),
            to,
            reply_to,
            subject,
            body,
        };

        match tokio::time::timeout(self.settings.timeout, mailer.send(&email)).await {
            Ok(Ok(receipt)) => {
                info!(
                    event = "email_sent",
                    to = ?email.to,
                    subject = %email.subject,
                    code = %receipt.code,
                    "email accepted by relay"
                );
                DispatchOutcome::delivered(receipt.code)
            }
            Ok(Err(err)) => {
                error!(
                    event = "email_transport_error",
                    to = ?email.to,
                    subject = %email.subject,
                    error = %err,
                    "email sending error"
                );
                DispatchOutcome::failed(err.to_string())
            }
            Err(_) => {
                let detail = format!("relay did not respond within {:?}", self.settings.timeout);
                error!(
                    event = "email_transport_error",
                    to = ?email.to,
                    subject = %email.subject,
                    error = %detail,
                    "email sending timed out"
                );
                DispatchOutcome::failed(detail)
            }
        }
    }

    /// Probe the relay. Always false when unconfigured.
    pub async fn verify_connection(&self) -> bool {
        let Some(mailer) = &self.mailer else {
            return false;
        };

        match tokio::time::timeout(self.settings.timeout, mailer.verify()).await {
            Ok(Ok(reachable)) => reachable,
            Ok(Err(err)) => {
                error!(event = "email_connection_error", error = %err, "email connection verification error");
                false
            }
            Err(_) => {
                error!(
                    event = "email_connection_error",
                    "email connection verification timed out"
                );
                false
            }
        }
    }
}
