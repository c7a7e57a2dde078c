use chrono::{DateTime, Utc};
use form_relay::submissions::FormKind;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
    /// Public reCAPTCHA key handed to browsers rendering the forms.
    pub(crate) site_key: Option<String>,
}

pub(crate) fn parse_form_kind(raw: &str) -> Result<FormKind, String> {
    FormKind::parse(raw).ok_or_else(|| format!("unknown form '{raw}' (expected contact or application)"))
}

pub(crate) fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|err| format!("failed to parse '{raw}' as an RFC 3339 timestamp ({err})"))
}
