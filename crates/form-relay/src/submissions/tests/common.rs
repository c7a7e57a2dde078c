use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use serde_json::{json, Value};

use crate::config::AppEnvironment;
use crate::submissions::abuse::{
    AbuseGuard, BotScoreVerifier, VerificationError, VerificationResponse,
};
use crate::submissions::notifications::{
    DeliveryReceipt, DispatchSettings, Email, MailError, Mailer, NotificationDispatcher,
    NotificationTemplates,
};
use crate::submissions::pipeline::{PipelineSettings, SubmissionPipeline};
use crate::submissions::rate_limit::{RateLimitDecision, RateLimiter};

pub(super) const NOTIFY_TO: &str = "ops@example.com";
pub(super) const SUPPORT: &str = "support@example.com";

pub(super) fn contact_json() -> Value {
    json!({
        "name": "Jane Doe",
        "email": "JANE@EX.com",
        "subject": "Hello!",
        "message": "I need help.",
    })
}

pub(super) fn application_json() -> Value {
    json!({
        "firstName": "Ada",
        "lastName": "Lovelace",
        "email": "Ada@Example.com",
        "phone": "+14155550100",
        "city": "London",
        "servicePackage": "Business Strategy",
        "consultationGoals": "Scale the analytical engine business",
        "businessStage": "Growth",
        "primaryAreaOfExpertise": "Finance/Fintech",
        "yearsOfExperience": 12,
        "challenges": "Hiring engineers who can keep up",
        "businessObjectives": "Double revenue within two years",
        "successMetrics": "Revenue, retention and margin",
        "budget": "$10k-$25k",
        "projectDuration": "4-6 months",
    })
}

/// Records every message handed to it.
#[derive(Default, Clone)]
pub(super) struct RecordingMailer {
    sent: Arc<Mutex<Vec<Email>>>,
}

impl RecordingMailer {
    pub(super) fn sent(&self) -> Vec<Email> {
        self.sent.lock().expect("mailer lock").clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: &Email) -> Result<DeliveryReceipt, MailError> {
        self.sent.lock().expect("mailer lock").push(email.clone());
        Ok(DeliveryReceipt {
            code: "250".to_string(),
        })
    }

    async fn verify(&self) -> Result<bool, MailError> {
        Ok(true)
    }
}

pub(super) struct FailingMailer;

#[async_trait]
impl Mailer for FailingMailer {
    async fn send(&self, _email: &Email) -> Result<DeliveryReceipt, MailError> {
        Err(MailError::Smtp("connection refused".to_string()))
    }

    async fn verify(&self) -> Result<bool, MailError> {
        Err(MailError::Smtp("connection refused".to_string()))
    }
}

/// Never answers within any reasonable timeout.
pub(super) struct StalledMailer;

#[async_trait]
impl Mailer for StalledMailer {
    async fn send(&self, _email: &Email) -> Result<DeliveryReceipt, MailError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(DeliveryReceipt {
            code: "250".to_string(),
        })
    }

    async fn verify(&self) -> Result<bool, MailError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(true)
    }
}

/// Answers every verification with the same canned result and counts calls.
#[derive(Clone)]
pub(super) struct StaticVerifier {
    reply: Result<VerificationResponse, VerificationError>,
    calls: Arc<AtomicUsize>,
}

impl StaticVerifier {
    pub(super) fn scoring(success: bool, score: Option<f64>) -> Self {
        Self::replying(Ok(VerificationResponse {
            success,
            score,
            action: Some("contact".to_string()),
            challenge_ts: None,
            hostname: Some("example.com".to_string()),
            error_codes: if success {
                Vec::new()
            } else {
                vec!["invalid-input-response".to_string()]
            },
        }))
    }

    pub(super) fn replying(reply: Result<VerificationResponse, VerificationError>) -> Self {
        Self {
            reply,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub(super) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BotScoreVerifier for StaticVerifier {
    async fn verify(&self, _token: &str) -> Result<VerificationResponse, VerificationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.reply.clone()
    }
}

pub(super) struct StalledVerifier;

#[async_trait]
impl BotScoreVerifier for StalledVerifier {
    async fn verify(&self, _token: &str) -> Result<VerificationResponse, VerificationError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Err(VerificationError::Transport("unreachable".to_string()))
    }
}

/// Admits everything and counts checks.
#[derive(Default)]
pub(super) struct OpenLimiter {
    checks: AtomicUsize,
}

impl OpenLimiter {
    pub(super) fn checks(&self) -> usize {
        self.checks.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RateLimiter for OpenLimiter {
    async fn check(&self, _identity: &str) -> RateLimitDecision {
        self.checks.fetch_add(1, Ordering::SeqCst);
        RateLimitDecision {
            allowed: true,
            remaining: u32::MAX,
            reset_after: Duration::from_secs(60),
        }
    }
}

pub(super) struct ClosedLimiter;

#[async_trait]
impl RateLimiter for ClosedLimiter {
    async fn check(&self, _identity: &str) -> RateLimitDecision {
        RateLimitDecision {
            allowed: false,
            remaining: 0,
            reset_after: Duration::from_secs(42),
        }
    }
}

pub(super) struct PanickingLimiter;

#[async_trait]
impl RateLimiter for PanickingLimiter {
    async fn check(&self, _identity: &str) -> RateLimitDecision {
        panic!("limiter storage poisoned");
    }
}

pub(super) fn settings(environment: AppEnvironment) -> DispatchSettings {
    DispatchSettings {
        environment,
        default_from: Some("Website <relay@example.com>".to_string()),
        timeout: Duration::from_millis(200),
    }
}

pub(super) fn production_guard<V: BotScoreVerifier>(verifier: Option<V>) -> AbuseGuard<V> {
    AbuseGuard::new(verifier, AppEnvironment::Production).with_timeout(Duration::from_millis(200))
}

pub(super) fn pipeline<L, V, M>(
    limiter: Arc<L>,
    guard: AbuseGuard<V>,
    dispatcher: NotificationDispatcher<M>,
) -> Arc<SubmissionPipeline<L, V, M>>
where
    L: RateLimiter,
    V: BotScoreVerifier,
    M: Mailer,
{
    let templates = NotificationTemplates::builtin().expect("builtin templates compile");
    Arc::new(SubmissionPipeline::new(
        limiter,
        guard,
        Arc::new(templates),
        Arc::new(dispatcher),
        PipelineSettings {
            recipients: vec![NOTIFY_TO.to_string()],
            support_email: Some(SUPPORT.to_string()),
        },
    ))
}

/// Production pipeline delivering into a recording mailer with no bot verifier.
pub(super) fn delivering_pipeline(
    mailer: RecordingMailer,
) -> Arc<SubmissionPipeline<OpenLimiter, StaticVerifier, RecordingMailer>> {
    pipeline(
        Arc::new(OpenLimiter::default()),
        production_guard(None),
        NotificationDispatcher::configured(mailer, settings(AppEnvironment::Production)),
    )
}

pub(super) fn post_json(uri: &str, body: &Value) -> Request<Body> {
    post_raw(uri, body.to_string())
}

pub(super) fn post_raw(uri: &str, body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .header("x-forwarded-for", "203.0.113.7, 10.0.0.1")
        .header("user-agent", "form-tests/1.0")
        .body(body.into())
        .expect("request builds")
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("body readable");
    serde_json::from_slice(&body).expect("json body")
}

pub(super) async fn assert_error(response: Response, status: StatusCode, message: &str) {
    assert_eq!(response.status(), status);
    let body = read_json_body(response).await;
    assert_eq!(body["error"], message);
}
