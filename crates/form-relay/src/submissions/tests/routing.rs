use super::common::*;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use serde_json::json;
use std::sync::Arc;
use tower::ServiceExt;

use crate::config::AppEnvironment;
use crate::submissions::notifications::NotificationDispatcher;
use crate::submissions::router::{
    diagnostic_context, form_router, technical_difficulty_message, BOT_CHECK_MESSAGE,
    HONEYPOT_MESSAGE, RATE_LIMITED_MESSAGE, VALIDATION_MESSAGE,
};

#[tokio::test]
async fn contact_success_returns_message() {
    let app = form_router(delivering_pipeline(RecordingMailer::default()));

    let response = app
        .oneshot(post_json("/api/contact", &contact_json()))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;
    assert_eq!(
        body,
        json!({ "success": true, "message": "Message sent successfully" })
    );
}

#[tokio::test]
async fn application_success_returns_message() {
    let app = form_router(delivering_pipeline(RecordingMailer::default()));

    let response = app
        .oneshot(post_json("/api/applications", &application_json()))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;
    assert_eq!(body["message"], "Application submitted successfully");
}

#[tokio::test]
async fn validation_errors_include_details() {
    let app = form_router(delivering_pipeline(RecordingMailer::default()));
    let mut raw = contact_json();
    raw["email"] = json!("nope");

    let response = app
        .oneshot(post_json("/api/contact", &raw))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = read_json_body(response).await;
    assert_eq!(body["error"], VALIDATION_MESSAGE);
    let details = body["details"].as_array().expect("details array");
    assert!(!details.is_empty());
    assert!(details.iter().all(|detail| detail["field"] == "email"));
}

#[tokio::test]
async fn honeypot_is_rejected() {
    let app = form_router(delivering_pipeline(RecordingMailer::default()));
    let mut raw = contact_json();
    raw["honeypot"] = json!("filled");

    let response = app
        .oneshot(post_json("/api/contact", &raw))
        .await
        .expect("router responds");

    assert_error(response, StatusCode::BAD_REQUEST, HONEYPOT_MESSAGE).await;
}

#[tokio::test]
async fn failed_bot_check_is_rejected() {
    let app = form_router(pipeline(
        Arc::new(OpenLimiter::default()),
        production_guard(Some(StaticVerifier::scoring(false, None))),
        NotificationDispatcher::configured(
            RecordingMailer::default(),
            settings(AppEnvironment::Production),
        ),
    ));
    let mut raw = contact_json();
    raw["token"] = json!("client-token");

    let response = app
        .oneshot(post_json("/api/contact", &raw))
        .await
        .expect("router responds");

    assert_error(response, StatusCode::BAD_REQUEST, BOT_CHECK_MESSAGE).await;
}

#[tokio::test]
async fn rate_limited_clients_get_429() {
    let app = form_router(pipeline(
        Arc::new(ClosedLimiter),
        production_guard::<StaticVerifier>(None),
        NotificationDispatcher::<RecordingMailer>::unconfigured(settings(
            AppEnvironment::Production,
        )),
    ));

    let response = app
        .oneshot(post_json("/api/applications", &application_json()))
        .await
        .expect("router responds");

    assert_error(response, StatusCode::TOO_MANY_REQUESTS, RATE_LIMITED_MESSAGE).await;
}

#[tokio::test]
async fn dispatch_failures_mention_support_contact() {
    let app = form_router(pipeline(
        Arc::new(OpenLimiter::default()),
        production_guard::<StaticVerifier>(None),
        NotificationDispatcher::configured(FailingMailer, settings(AppEnvironment::Production)),
    ));

    let response = app
        .oneshot(post_json("/api/contact", &contact_json()))
        .await
        .expect("router responds");

    let expected = technical_difficulty_message(Some(SUPPORT));
    assert!(expected.ends_with("at support@example.com"));
    assert_error(response, StatusCode::INTERNAL_SERVER_ERROR, &expected).await;
}

#[tokio::test]
async fn malformed_json_is_an_internal_error() {
    let app = form_router(delivering_pipeline(RecordingMailer::default()));

    let response = app
        .oneshot(post_raw("/api/contact", "{\"name\": \"Jane"))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn panics_inside_the_pipeline_become_internal_errors() {
    let app = form_router(pipeline(
        Arc::new(PanickingLimiter),
        production_guard::<StaticVerifier>(None),
        NotificationDispatcher::<RecordingMailer>::unconfigured(settings(
            AppEnvironment::Production,
        )),
    ));

    let response = app
        .oneshot(post_json("/api/contact", &contact_json()))
        .await
        .expect("router responds");

    assert_error(
        response,
        StatusCode::INTERNAL_SERVER_ERROR,
        &technical_difficulty_message(Some(SUPPORT)),
    )
    .await;
}

#[tokio::test]
async fn every_request_consults_the_limiter() {
    let limiter = Arc::new(OpenLimiter::default());
    let app = form_router(pipeline(
        Arc::clone(&limiter),
        production_guard::<StaticVerifier>(None),
        NotificationDispatcher::<RecordingMailer>::unconfigured(settings(
            AppEnvironment::Production,
        )),
    ));

    for _ in 0..3 {
        app.clone()
            .oneshot(post_json("/api/contact", &contact_json()))
            .await
            .expect("router responds");
    }

    assert_eq!(limiter.checks(), 3);
}

#[test]
fn client_identity_is_first_forwarded_address() {
    let mut headers = HeaderMap::new();
    headers.insert(
        "x-forwarded-for",
        HeaderValue::from_static("198.51.100.4, 10.0.0.2"),
    );
    headers.insert("user-agent", HeaderValue::from_static("curl/8.0"));

    let context = diagnostic_context(&headers);

    assert_eq!(context.client_identity(), "198.51.100.4");
    assert_eq!(context.user_agent.as_deref(), Some("curl/8.0"));
}

#[test]
fn missing_forwarded_header_is_unknown() {
    let context = diagnostic_context(&HeaderMap::new());

    assert_eq!(context.client_identity(), "unknown");
    assert_eq!(context.user_agent_or_unknown(), "unknown");
}

#[test]
fn technical_difficulty_without_support_contact_ends_with_period() {
    assert!(technical_difficulty_message(None).ends_with("contact support directly."));
}
