//! Anti-abuse screening: the honeypot trap and bot-score verification.
//!
//! Bot-score verification passes without calling out when there is no token or
//! secret, or outside production. Once a call is made, anything short of a clean
//! answer rejects.

mod recaptcha;

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{error, warn};

use super::domain::{FormKind, ValidatedSubmission};
use crate::config::{AppEnvironment, RecaptchaConfig};

pub use recaptcha::RecaptchaVerifier;

const DEFAULT_VERIFY_TIMEOUT: Duration = Duration::from_secs(5);

/// True when the trap field is clear. Any non-empty value fails.
pub fn check_honeypot(value: Option<&str>) -> bool {
    value.map_or(true, str::is_empty)
}

/// Reply from the verification service.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct VerificationResponse {
    pub success: bool,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub challenge_ts: Option<String>,
    #[serde(default)]
    pub hostname: Option<String>,
    #[serde(rename = "error-codes", default)]
    pub error_codes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VerificationError {
    #[error("verification request failed: {0}")]
    Transport(String),
    #[error("verification service responded with status {0}")]
    Status(u16),
    #[error("verification response could not be decoded: {0}")]
    Decode(String),
    #[error("verification did not complete within {0:?}")]
    Timeout(Duration),
}

/// External bot-score capability.
#[async_trait]
pub trait BotScoreVerifier: Send + Sync + 'static {
    async fn verify(&self, token: &str) -> Result<VerificationResponse, VerificationError>;
}

/// How a bot-score check concluded.
#[derive(Debug, Clone, PartialEq)]
pub enum BotCheck {
    /// Passed without calling out.
    Skipped(&'static str),
    Passed { score: Option<f64> },
    Rejected {
        score: Option<f64>,
        error_codes: Vec<String>,
    },
    /// The call itself failed; treated as a rejection.
    Errored(VerificationError),
}

impl BotCheck {
    pub fn passed(&self) -> bool {
        matches!(self, BotCheck::Skipped(_) | BotCheck::Passed { .. })
    }
}

/// Why a submission was screened out.
#[derive(Debug, Clone, PartialEq)]
pub enum AbuseDetected {
    Honeypot,
    BotScore(BotCheck),
}

/// Composite guard: honeypot for every form, bot-score for the contact form.
pub struct AbuseGuard<V> {
    verifier: Option<V>,
    environment: AppEnvironment,
    min_score: Option<f64>,
    timeout: Duration,
}

impl AbuseGuard<RecaptchaVerifier> {
    /// A missing secret leaves the guard without a verifier.
    pub fn from_config(
        config: &RecaptchaConfig,
        environment: AppEnvironment,
    ) -> Result<Self, reqwest::Error> {
        let verifier = match &config.secret_key {
            Some(secret) => Some(RecaptchaVerifier::new(
                secret.clone(),
                config.verify_url.clone(),
                config.timeout,
            )?),
            None => {
                warn!("reCAPTCHA verification disabled: no secret key configured");
                None
            }
        };

        Ok(Self::new(verifier, environment)
            .with_min_score(config.min_score)
            .with_timeout(config.timeout))
    }
}

impl<V: BotScoreVerifier> AbuseGuard<V> {
    pub fn new(verifier: Option<V>, environment: AppEnvironment) -> Self {
        Self {
            verifier,
            environment,
            min_score: None,
            timeout: DEFAULT_VERIFY_TIMEOUT,
        }
    }

    pub fn with_min_score(mut self, min_score: Option<f64>) -> Self {
        self.min_score = min_score;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run the checks that apply to this submission's form kind, in order.
    pub async fn screen(&self, submission: &ValidatedSubmission) -> Result<(), AbuseDetected> {
        if !check_honeypot(submission.honeypot()) {
            return Err(AbuseDetected::Honeypot);
        }

        if submission.kind() == FormKind::Contact {
            let outcome = self.verify_bot_score(submission.bot_token()).await;
            if !outcome.passed() {
                return Err(AbuseDetected::BotScore(outcome));
            }
        }

        Ok(())
    }

    pub async fn verify_bot_score(&self, token: Option<&str>) -> BotCheck {
        if !self.environment.is_production() {
            return BotCheck::Skipped("verification disabled outside production");
        }
        let Some(token) = token.filter(|token| !token.is_empty()) else {
            return BotCheck::Skipped("no token supplied");
        };
        let Some(verifier) = &self.verifier else {
            warn!("reCAPTCHA verification skipped: no secret key configured");
            return BotCheck::Skipped("no verification secret configured");
        };

        let response = match tokio::time::timeout(self.timeout, verifier.verify(token)).await {
            Ok(Ok(response)) => response,
            Ok(Err(err)) => {
                error!(event = "bot_verification_error", error = %err, "reCAPTCHA verification error");
                return BotCheck::Errored(err);
            }
            Err(_) => {
                let err = VerificationError::Timeout(self.timeout);
                error!(event = "bot_verification_error", error = %err, "reCAPTCHA verification error");
                return BotCheck::Errored(err);
            }
        };

        // With a floor set, a reply without a score cannot clear it.
        let below_floor = match (self.min_score, response.score) {
            (Some(floor), Some(score)) => score < floor,
            (Some(_), None) => true,
            (None, _) => false,
        };

        if response.success && !below_floor {
            BotCheck::Passed {
                score: response.score,
            }
        } else {
            error!(
                event = "bot_verification_failed",
                success = response.success,
                score = ?response.score,
                action = ?response.action,
                error_codes = ?response.error_codes,
                "reCAPTCHA verification failed"
            );
            BotCheck::Rejected {
                score: response.score,
                error_codes: response.error_codes,
            }
        }
    }
}
