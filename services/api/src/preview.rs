use crate::infra::{parse_form_kind, parse_timestamp};
use chrono::{DateTime, Utc};
use clap::Args;
use form_relay::error::AppError;
use form_relay::submissions::notifications::{notification_data, NotificationTemplates};
use form_relay::submissions::{
    check_honeypot, DiagnosticContext, FormKind, FormValidator, ValidationErrors,
};
use serde_json::Value;
use std::path::PathBuf;

const PREVIEW_AGENT: &str = "form-relay preview";

#[derive(Args, Debug)]
pub(crate) struct PreviewArgs {
    /// Form the submission belongs to (contact or application)
    #[arg(value_parser = parse_form_kind)]
    pub(crate) kind: FormKind,
    /// JSON file holding the raw submission
    #[arg(long)]
    pub(crate) input: PathBuf,
    /// Print the HTML body instead of plain text
    #[arg(long)]
    pub(crate) html: bool,
    /// Client address shown in the diagnostics block
    #[arg(long)]
    pub(crate) client_ip: Option<String>,
    /// Submission time (RFC 3339). Defaults to now.
    #[arg(long, value_parser = parse_timestamp)]
    pub(crate) received_at: Option<DateTime<Utc>>,
}

#[derive(Debug)]
pub(crate) enum Preview {
    Rejected(ValidationErrors),
    Rendered {
        subject: String,
        reply_to: String,
        honeypot_filled: bool,
        html: String,
        text: String,
    },
}

pub(crate) fn run_preview(args: PreviewArgs) -> Result<(), AppError> {
    let bytes = std::fs::read(&args.input)?;
    let raw: Value = serde_json::from_slice(&bytes)?;
    let context = DiagnosticContext::at(
        args.received_at.unwrap_or_else(Utc::now),
        args.client_ip,
        Some(PREVIEW_AGENT.to_string()),
    );

    match render_preview(args.kind, &raw, &context)? {
        Preview::Rejected(errors) => {
            println!("Submission rejected ({} problem(s)):", errors.len());
            for error in errors.iter() {
                let field = if error.field.is_empty() {
                    "<body>"
                } else {
                    error.field.as_str()
                };
                println!("  {field}: {}", error.message);
            }
        }
        Preview::Rendered {
            subject,
            reply_to,
            honeypot_filled,
            html,
            text,
        } => {
            if honeypot_filled {
                println!("Note: honeypot is filled; the service would reject this submission.");
            }
            println!("Subject: {subject}");
            println!("Reply-To: {reply_to}");
            println!();
            println!("{}", if args.html { html } else { text });
        }
    }

    Ok(())
}

pub(crate) fn render_preview(
    kind: FormKind,
    raw: &Value,
    context: &DiagnosticContext,
) -> Result<Preview, AppError> {
    let submission = match FormValidator::new().validate(kind, raw) {
        Ok(submission) => submission,
        Err(errors) => return Ok(Preview::Rejected(errors)),
    };

    let templates = NotificationTemplates::builtin()?;
    let data = notification_data(&submission, context)?;
    let rendered = templates.for_kind(kind).render(&data);

    Ok(Preview::Rendered {
        subject: submission.notification_subject(),
        reply_to: submission.email().to_string(),
        honeypot_filled: !check_honeypot(submission.honeypot()),
        html: rendered.html,
        text: rendered.text,
    })
}
