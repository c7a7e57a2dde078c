use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{header::USER_AGENT, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use serde_json::json;
use tracing::error;

use super::abuse::BotScoreVerifier;
use super::domain::{DiagnosticContext, FormKind};
use super::notifications::Mailer;
use super::pipeline::{SubmissionError, SubmissionPipeline};
use super::rate_limit::RateLimiter;

const FORWARDED_FOR: &str = "x-forwarded-for";

pub const RATE_LIMITED_MESSAGE: &str = "Too many requests. Please try again in a few minutes.";
pub const VALIDATION_MESSAGE: &str = "Please check your input and try again";
pub const HONEYPOT_MESSAGE: &str = "Form submission rejected";
pub const BOT_CHECK_MESSAGE: &str =
    "Security verification failed. Please refresh the page and try again.";
pub const TECHNICAL_DIFFICULTY_MESSAGE: &str =
    "We're experiencing technical difficulties. Please try again later or contact support directly";

/// Router exposing the public form endpoints.
pub fn form_router<L, V, M>(pipeline: Arc<SubmissionPipeline<L, V, M>>) -> Router
where
    L: RateLimiter,
    V: BotScoreVerifier,
    M: Mailer,
{
    Router::new()
        .route("/api/contact", post(contact_handler::<L, V, M>))
        .route("/api/applications", post(application_handler::<L, V, M>))
        .with_state(pipeline)
}

pub(crate) async fn contact_handler<L, V, M>(
    State(pipeline): State<Arc<SubmissionPipeline<L, V, M>>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response
where
    L: RateLimiter,
    V: BotScoreVerifier,
    M: Mailer,
{
    handle_submission(pipeline, FormKind::Contact, headers, body).await
}

pub(crate) async fn application_handler<L, V, M>(
    State(pipeline): State<Arc<SubmissionPipeline<L, V, M>>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response
where
    L: RateLimiter,
    V: BotScoreVerifier,
    M: Mailer,
{
    handle_submission(pipeline, FormKind::Application, headers, body).await
}

async fn handle_submission<L, V, M>(
    pipeline: Arc<SubmissionPipeline<L, V, M>>,
    kind: FormKind,
    headers: HeaderMap,
    body: Bytes,
) -> Response
where
    L: RateLimiter,
    V: BotScoreVerifier,
    M: Mailer,
{
    let context = diagnostic_context(&headers);
    let support_email = pipeline.support_email().map(str::to_string);

    // A panic inside the pipeline surfaces here as a JoinError.
    let task = tokio::spawn(async move { pipeline.submit(kind, context, &body).await });
    let result = match task.await {
        Ok(result) => result,
        Err(join_error) => {
            error!(
                event = "unexpected_failure",
                kind = %kind,
                error = %join_error,
                "submission task aborted"
            );
            Err(SubmissionError::Unexpected(join_error.to_string()))
        }
    };

    match result {
        Ok(receipt) => {
            let payload = json!({
                "success": true,
                "message": receipt.message,
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(SubmissionError::RateLimited { .. }) => {
            error_response(StatusCode::TOO_MANY_REQUESTS, RATE_LIMITED_MESSAGE)
        }
        Err(SubmissionError::Validation(errors)) => {
            let payload = json!({
                "error": VALIDATION_MESSAGE,
                "details": errors,
            });
            (StatusCode::BAD_REQUEST, axum::Json(payload)).into_response()
        }
        Err(SubmissionError::HoneypotTriggered) => {
            error_response(StatusCode::BAD_REQUEST, HONEYPOT_MESSAGE)
        }
        Err(SubmissionError::BotVerificationFailed(_)) => {
            error_response(StatusCode::BAD_REQUEST, BOT_CHECK_MESSAGE)
        }
        Err(SubmissionError::DispatchFailed(_) | SubmissionError::Unexpected(_)) => {
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &technical_difficulty_message(support_email.as_deref()),
            )
        }
    }
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, axum::Json(json!({ "error": message }))).into_response()
}

pub fn technical_difficulty_message(support_email: Option<&str>) -> String {
    match support_email {
        Some(support) => format!("{TECHNICAL_DIFFICULTY_MESSAGE} at {support}"),
        None => format!("{TECHNICAL_DIFFICULTY_MESSAGE}."),
    }
}

/// Client identity is the first `x-forwarded-for` entry.
pub fn diagnostic_context(headers: &HeaderMap) -> DiagnosticContext {
    let client_ip = headers
        .get(FORWARDED_FOR)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string);
    let user_agent = headers
        .get(USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);

    DiagnosticContext::new(client_ip, user_agent)
}
