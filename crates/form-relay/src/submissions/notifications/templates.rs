use chrono::SecondsFormat;
use serde_json::Value;

use super::template::{EmailTemplate, TemplateData, TemplateError};
use crate::submissions::domain::{DiagnosticContext, FormKind, ValidatedSubmission};

const CONTACT_HTML: &str = include_str!("../../../templates/contact.html");
const CONTACT_TEXT: &str = include_str!("../../../templates/contact.txt");
const APPLICATION_HTML: &str = include_str!("../../../templates/application.html");
const APPLICATION_TEXT: &str = include_str!("../../../templates/application.txt");

/// Compiled notification templates, one pair per form kind. Built once at startup.
#[derive(Debug, Clone)]
pub struct NotificationTemplates {
    contact: EmailTemplate,
    application: EmailTemplate,
}

impl NotificationTemplates {
    pub fn builtin() -> Result<Self, TemplateError> {
        Ok(Self {
            contact: EmailTemplate::compile(CONTACT_HTML, CONTACT_TEXT)?,
            application: EmailTemplate::compile(APPLICATION_HTML, APPLICATION_TEXT)?,
        })
    }

    pub fn for_kind(&self, kind: FormKind) -> &EmailTemplate {
        match kind {
            FormKind::Contact => &self.contact,
            FormKind::Application => &self.application,
        }
    }
}

/// Template record: the validated fields plus `timestamp`, `ip` and `userAgent`.
pub fn notification_data(
    submission: &ValidatedSubmission,
    context: &DiagnosticContext,
) -> Result<TemplateData, serde_json::Error> {
    let (fields, timestamp) = match submission {
        ValidatedSubmission::Contact(form) => (
            serde_json::to_value(form)?,
            form.timestamp
                .map(|submitted| submitted.to_rfc3339_opts(SecondsFormat::Millis, true)),
        ),
        ValidatedSubmission::Application(form) => (serde_json::to_value(form)?, None),
    };

    let mut data = match fields {
        Value::Object(map) => map,
        _ => TemplateData::new(),
    };

    let timestamp = timestamp.unwrap_or_else(|| {
        context
            .received_at
            .to_rfc3339_opts(SecondsFormat::Millis, true)
    });
    data.insert("timestamp".to_string(), Value::String(timestamp));
    data.insert("ip".to_string(), Value::String(context.client_ip.clone()));
    data.insert(
        "userAgent".to_string(),
        context
            .user_agent
            .clone()
            .map(Value::String)
            .unwrap_or(Value::Null),
    );

    Ok(data)
}
