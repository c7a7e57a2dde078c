use super::common::*;
use serde_json::json;

use crate::config::AppEnvironment;
use crate::submissions::abuse::{
    check_honeypot, AbuseDetected, AbuseGuard, BotCheck, VerificationError,
};
use crate::submissions::domain::{FormKind, ValidatedSubmission};
use crate::submissions::validation::FormValidator;

fn contact_with(token: Option<&str>, honeypot: Option<&str>) -> ValidatedSubmission {
    let mut raw = contact_json();
    if let Some(token) = token {
        raw["token"] = json!(token);
    }
    if let Some(honeypot) = honeypot {
        raw["honeypot"] = json!(honeypot);
    }
    FormValidator::new()
        .validate(FormKind::Contact, &raw)
        .expect("contact validates")
}

#[test]
fn honeypot_passes_only_when_empty_or_absent() {
    assert!(check_honeypot(None));
    assert!(check_honeypot(Some("")));
    assert!(!check_honeypot(Some("x")));
    assert!(!check_honeypot(Some(" ")));
}

#[tokio::test]
async fn missing_token_passes_without_calling_out() {
    let verifier = StaticVerifier::scoring(false, None);
    let guard = production_guard(Some(verifier.clone()));

    let outcome = guard.verify_bot_score(None).await;

    assert!(outcome.passed());
    assert_eq!(verifier.calls(), 0);
}

#[tokio::test]
async fn missing_secret_passes_trivially() {
    let guard = production_guard::<StaticVerifier>(None);

    assert!(guard.verify_bot_score(Some("token")).await.passed());
}

#[tokio::test]
async fn non_production_skips_verification() {
    let verifier = StaticVerifier::scoring(false, None);
    let guard = AbuseGuard::new(Some(verifier.clone()), AppEnvironment::Development);

    assert!(matches!(
        guard.verify_bot_score(Some("token")).await,
        BotCheck::Skipped(_)
    ));
    assert_eq!(verifier.calls(), 0);
}

#[tokio::test]
async fn unsuccessful_verification_rejects() {
    let guard = production_guard(Some(StaticVerifier::scoring(false, Some(0.1))));

    let outcome = guard.verify_bot_score(Some("token")).await;

    assert_eq!(
        outcome,
        BotCheck::Rejected {
            score: Some(0.1),
            error_codes: vec!["invalid-input-response".to_string()],
        }
    );
}

#[tokio::test]
async fn successful_verification_passes_with_score() {
    let guard = production_guard(Some(StaticVerifier::scoring(true, Some(0.9))));

    assert_eq!(
        guard.verify_bot_score(Some("token")).await,
        BotCheck::Passed { score: Some(0.9) }
    );
}

#[tokio::test]
async fn score_floor_rejects_low_scores() {
    let guard = production_guard(Some(StaticVerifier::scoring(true, Some(0.3))))
        .with_min_score(Some(0.5));

    assert!(!guard.verify_bot_score(Some("token")).await.passed());
}

#[tokio::test]
async fn score_floor_rejects_replies_without_a_score() {
    let guard =
        production_guard(Some(StaticVerifier::scoring(true, None))).with_min_score(Some(0.5));

    assert_eq!(
        guard.verify_bot_score(Some("token")).await,
        BotCheck::Rejected {
            score: None,
            error_codes: Vec::new(),
        }
    );
}

#[tokio::test]
async fn missing_score_passes_without_a_floor() {
    let guard = production_guard(Some(StaticVerifier::scoring(true, None)));

    assert_eq!(
        guard.verify_bot_score(Some("token")).await,
        BotCheck::Passed { score: None }
    );
}

#[tokio::test]
async fn verification_errors_fail_closed() {
    let guard = production_guard(Some(StaticVerifier::replying(Err(
        VerificationError::Status(500),
    ))));

    assert_eq!(
        guard.verify_bot_score(Some("token")).await,
        BotCheck::Errored(VerificationError::Status(500))
    );
}

#[tokio::test]
async fn verification_timeouts_fail_closed() {
    let guard = production_guard(Some(StalledVerifier));

    assert!(matches!(
        guard.verify_bot_score(Some("token")).await,
        BotCheck::Errored(VerificationError::Timeout(_))
    ));
}

#[tokio::test]
async fn screen_checks_honeypot_before_bot_score() {
    let verifier = StaticVerifier::scoring(true, Some(0.9));
    let guard = production_guard(Some(verifier.clone()));

    let outcome = guard
        .screen(&contact_with(Some("token"), Some("gotcha")))
        .await;

    assert_eq!(outcome, Err(AbuseDetected::Honeypot));
    assert_eq!(verifier.calls(), 0);
}

#[tokio::test]
async fn screen_applies_bot_score_to_contact_only() {
    let verifier = StaticVerifier::scoring(false, Some(0.0));
    let guard = production_guard(Some(verifier.clone()));

    let contact = guard.screen(&contact_with(Some("token"), None)).await;
    assert!(matches!(contact, Err(AbuseDetected::BotScore(_))));

    let application = FormValidator::new()
        .validate(FormKind::Application, &application_json())
        .expect("application validates");
    assert_eq!(guard.screen(&application).await, Ok(()));
    assert_eq!(verifier.calls(), 1);
}
