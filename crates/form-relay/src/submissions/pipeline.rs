use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{error, info, info_span, warn, Instrument};

use super::abuse::{AbuseDetected, AbuseGuard, BotCheck, BotScoreVerifier, RecaptchaVerifier};
use super::domain::{DiagnosticContext, FormKind, ValidationErrors};
use super::notifications::{
    notification_data, DispatchOutcome, EmailContent, EmailOptions, Mailer,
    NotificationDispatcher, NotificationTemplates, SmtpMailer,
};
use super::rate_limit::{FixedWindowRateLimiter, RateLimiter};
use super::validation::FormValidator;
use crate::config::{AppConfig, NotificationConfig};
use crate::error::AppError;

/// Recipients and support contact used by every submission.
#[derive(Debug, Clone, Default)]
pub struct PipelineSettings {
    pub recipients: Vec<String>,
    pub support_email: Option<String>,
}

impl From<&NotificationConfig> for PipelineSettings {
    fn from(config: &NotificationConfig) -> Self {
        Self {
            recipients: config.recipients.clone(),
            support_email: config.support_email.clone(),
        }
    }
}

/// What an accepted submission produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionReceipt {
    pub kind: FormKind,
    pub message: &'static str,
    pub submitter_email: String,
    pub notification: DispatchOutcome,
}

/// Terminal outcome of a rejected or failed submission.
#[derive(Debug, thiserror::Error)]
pub enum SubmissionError {
    #[error("rate limit exceeded, window resets in {reset_after:?}")]
    RateLimited { reset_after: Duration },
    #[error("submission failed validation")]
    Validation(ValidationErrors),
    #[error("honeypot field was filled")]
    HoneypotTriggered,
    #[error("bot verification failed")]
    BotVerificationFailed(BotCheck),
    #[error("notification dispatch failed: {0}")]
    DispatchFailed(String),
    #[error("unexpected failure: {0}")]
    Unexpected(String),
}

pub fn success_message(kind: FormKind) -> &'static str {
    match kind {
        FormKind::Contact => "Message sent successfully",
        FormKind::Application => "Application submitted successfully",
    }
}

/// Runs a raw submission through admission, validation, screening and dispatch.
pub struct SubmissionPipeline<L, V, M> {
    limiter: Arc<L>,
    guard: AbuseGuard<V>,
    validator: FormValidator,
    templates: Arc<NotificationTemplates>,
    dispatcher: Arc<NotificationDispatcher<M>>,
    settings: PipelineSettings,
}

impl SubmissionPipeline<FixedWindowRateLimiter, RecaptchaVerifier, SmtpMailer> {
    /// Wire the production collaborators from configuration.
    pub fn from_config(config: &AppConfig) -> Result<Self, AppError> {
        let limiter = Arc::new(FixedWindowRateLimiter::new(config.rate_limit));
        let guard = AbuseGuard::from_config(&config.recaptcha, config.environment)?;
        let templates = Arc::new(NotificationTemplates::builtin()?);
        let dispatcher = Arc::new(NotificationDispatcher::from_config(config));

        Ok(Self::new(
            limiter,
            guard,
            templates,
            dispatcher,
            PipelineSettings::from(&config.notifications),
        ))
    }
}

impl<L, V, M> SubmissionPipeline<L, V, M>
where
    L: RateLimiter,
    V: BotScoreVerifier,
    M: Mailer,
{
    pub fn new(
        limiter: Arc<L>,
        guard: AbuseGuard<V>,
        templates: Arc<NotificationTemplates>,
        dispatcher: Arc<NotificationDispatcher<M>>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            limiter,
            guard,
            validator: FormValidator::new(),
            templates,
            dispatcher,
            settings,
        }
    }

    pub fn dispatcher(&self) -> &Arc<NotificationDispatcher<M>> {
        &self.dispatcher
    }

    pub fn support_email(&self) -> Option<&str> {
        self.settings.support_email.as_deref()
    }

    /// Process one submission. The body is parsed only after the client is admitted.
    pub async fn submit(
        &self,
        kind: FormKind,
        context: DiagnosticContext,
        body: &[u8],
    ) -> Result<SubmissionReceipt, SubmissionError> {
        let span = info_span!(
            "form_submission",
            kind = %kind,
            client_ip = %context.client_ip,
            user_agent = %context.user_agent_or_unknown(),
            started_at = %context.received_at.to_rfc3339(),
        );

        self.run(kind, &context, body).instrument(span).await
    }

    async fn run(
        &self,
        kind: FormKind,
        context: &DiagnosticContext,
        body: &[u8],
    ) -> Result<SubmissionReceipt, SubmissionError> {
        let decision = self.limiter.check(context.client_identity()).await;
        if !decision.allowed {
            warn!(event = "rate_limit_exceeded", "rate limit exceeded");
            return Err(SubmissionError::RateLimited {
                reset_after: decision.reset_after,
            });
        }

        let raw: Value = serde_json::from_slice(body).map_err(|err| {
            error!(event = "unexpected_failure", error = %err, "request body is not valid JSON");
            SubmissionError::Unexpected(err.to_string())
        })?;

        let submission = self.validator.validate(kind, &raw).map_err(|errors| {
            warn!(
                event = "validation_failed",
                error_count = errors.len(),
                errors = ?errors,
                "form validation failed"
            );
            SubmissionError::Validation(errors)
        })?;

        match self.guard.screen(&submission).await {
            Ok(()) => {}
            Err(AbuseDetected::Honeypot) => {
                warn!(
                    event = "honeypot_triggered",
                    email = %submission.email(),
                    "honeypot triggered"
                );
                return Err(SubmissionError::HoneypotTriggered);
            }
            Err(AbuseDetected::BotScore(outcome)) => {
                return Err(SubmissionError::BotVerificationFailed(outcome));
            }
        }

        let data = notification_data(&submission, context).map_err(|err| {
            error!(event = "unexpected_failure", error = %err, "could not build template data");
            SubmissionError::Unexpected(err.to_string())
        })?;

        let subject = submission.notification_subject();
        let notification = self
            .dispatcher
            .send(EmailOptions {
                to: self.settings.recipients.clone(),
                subject: subject.clone(),
                from: None,
                reply_to: Some(submission.email().to_string()),
                content: EmailContent::Template {
                    template: self.templates.for_kind(kind),
                    data: &data,
                },
            })
            .await;

        if !notification.success {
            let detail = notification.detail.clone().unwrap_or_default();
            error!(
                event = "email_send_failed",
                email = %submission.email(),
                subject = %subject,
                detail = %detail,
                "failed to send notification email"
            );
            return Err(SubmissionError::DispatchFailed(detail));
        }

        info!(
            event = "submission_succeeded",
            email = %submission.email(),
            subject = %subject,
            delivered = notification.sent,
            "form submission processed"
        );

        Ok(SubmissionReceipt {
            kind,
            message: success_message(kind),
            submitter_email: submission.email().to_string(),
            notification,
        })
    }
}
