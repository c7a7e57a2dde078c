//! Public form submissions: schema validation, abuse screening, rate limiting and
//! notification dispatch, composed by [`SubmissionPipeline`] and served by [`form_router`].

pub mod abuse;
pub mod domain;
pub mod notifications;
pub mod pipeline;
pub mod rate_limit;
pub mod router;
pub mod validation;

#[cfg(test)]
mod tests;

pub use abuse::{
    check_honeypot, AbuseDetected, AbuseGuard, BotCheck, BotScoreVerifier, RecaptchaVerifier,
    VerificationError, VerificationResponse,
};
pub use domain::{
    ApplicationSubmission, BusinessStage, ContactSubmission, DiagnosticContext, ExpertiseArea,
    FieldError, FormChoice, FormKind, ProjectDuration, ServicePackage, ValidatedSubmission,
    ValidationErrors,
};
pub use pipeline::{
    success_message, PipelineSettings, SubmissionError, SubmissionPipeline, SubmissionReceipt,
};
pub use rate_limit::{FixedWindowRateLimiter, RateLimitDecision, RateLimiter};
pub use router::form_router;
pub use validation::FormValidator;
