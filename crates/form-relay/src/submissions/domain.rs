use std::fmt;

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

/// Which public form a submission came through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormKind {
    Contact,
    Application,
}

impl FormKind {
    pub fn label(self) -> &'static str {
        match self {
            FormKind::Contact => "contact",
            FormKind::Application => "application",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "contact" => Some(Self::Contact),
            "application" | "applications" => Some(Self::Application),
            _ => None,
        }
    }
}

impl fmt::Display for FormKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Request metadata captured once at entry and attached to logs and notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticContext {
    pub received_at: DateTime<Utc>,
    pub client_ip: String,
    pub user_agent: Option<String>,
}

impl DiagnosticContext {
    pub const UNKNOWN_CLIENT: &'static str = "unknown";

    pub fn new(client_ip: Option<String>, user_agent: Option<String>) -> Self {
        Self::at(Utc::now(), client_ip, user_agent)
    }

    pub fn at(
        received_at: DateTime<Utc>,
        client_ip: Option<String>,
        user_agent: Option<String>,
    ) -> Self {
        let client_ip = client_ip
            .map(|ip| ip.trim().to_string())
            .filter(|ip| !ip.is_empty())
            .unwrap_or_else(|| Self::UNKNOWN_CLIENT.to_string());

        Self {
            received_at,
            client_ip,
            user_agent: user_agent.filter(|agent| !agent.trim().is_empty()),
        }
    }

    /// Key used for rate limiting.
    pub fn client_identity(&self) -> &str {
        &self.client_ip
    }

    pub fn user_agent_or_unknown(&self) -> &str {
        self.user_agent.as_deref().unwrap_or(Self::UNKNOWN_CLIENT)
    }
}

/// A single rejected field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(path: &[&str], message: impl Into<String>) -> Self {
        Self {
            field: path.join("."),
            message: message.into(),
        }
    }
}

/// Ordered list of field-level violations for one submission attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(transparent)]
#[error("{} field(s) failed validation", .0.len())]
pub struct ValidationErrors(Vec<FieldError>);

impl ValidationErrors {
    pub fn push(&mut self, error: FieldError) {
        self.0.push(error);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
        self.0.iter()
    }

    pub fn for_field<'a>(&'a self, field: &'a str) -> impl Iterator<Item = &'a FieldError> + 'a {
        self.0.iter().filter(move |error| error.field == field)
    }

    pub fn into_inner(self) -> Vec<FieldError> {
        self.0
    }
}

impl From<FieldError> for ValidationErrors {
    fn from(error: FieldError) -> Self {
        Self(vec![error])
    }
}

/// Enumerated form answers with fixed, human-readable labels.
pub trait FormChoice: Copy + Sized + 'static {
    const ALL: &'static [Self];

    fn label(self) -> &'static str;

    fn from_label(raw: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|choice| choice.label() == raw)
    }

    fn labels() -> Vec<&'static str> {
        Self::ALL.iter().map(|choice| choice.label()).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ServicePackage {
    #[serde(rename = "Business Strategy")]
    BusinessStrategy,
    #[serde(rename = "Market Research")]
    MarketResearch,
    #[serde(rename = "Digital Transformation")]
    DigitalTransformation,
}

impl FormChoice for ServicePackage {
    const ALL: &'static [Self] = &[
        Self::BusinessStrategy,
        Self::MarketResearch,
        Self::DigitalTransformation,
    ];

    fn label(self) -> &'static str {
        match self {
            Self::BusinessStrategy => "Business Strategy",
            Self::MarketResearch => "Market Research",
            Self::DigitalTransformation => "Digital Transformation",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BusinessStage {
    Startup,
    Growth,
    Maturity,
    Decline,
}

impl FormChoice for BusinessStage {
    const ALL: &'static [Self] = &[Self::Startup, Self::Growth, Self::Maturity, Self::Decline];

    fn label(self) -> &'static str {
        match self {
            Self::Startup => "Startup",
            Self::Growth => "Growth",
            Self::Maturity => "Maturity",
            Self::Decline => "Decline",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExpertiseArea {
    Marketing,
    Operations,
    #[serde(rename = "Finance/Fintech")]
    FinanceFintech,
    Strategy,
    #[serde(rename = "Production Development")]
    ProductionDevelopment,
    Sales,
    Other,
}

impl FormChoice for ExpertiseArea {
    const ALL: &'static [Self] = &[
        Self::Marketing,
        Self::Operations,
        Self::FinanceFintech,
        Self::Strategy,
        Self::ProductionDevelopment,
        Self::Sales,
        Self::Other,
    ];

    fn label(self) -> &'static str {
        match self {
            Self::Marketing => "Marketing",
            Self::Operations => "Operations",
            Self::FinanceFintech => "Finance/Fintech",
            Self::Strategy => "Strategy",
            Self::ProductionDevelopment => "Production Development",
            Self::Sales => "Sales",
            Self::Other => "Other",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ProjectDuration {
    #[serde(rename = "1-3 months")]
    UpToThreeMonths,
    #[serde(rename = "4-6 months")]
    UpToSixMonths,
    #[serde(rename = "7-12 months")]
    UpToTwelveMonths,
}

impl FormChoice for ProjectDuration {
    const ALL: &'static [Self] = &[
        Self::UpToThreeMonths,
        Self::UpToSixMonths,
        Self::UpToTwelveMonths,
    ];

    fn label(self) -> &'static str {
        match self {
            Self::UpToThreeMonths => "1-3 months",
            Self::UpToSixMonths => "4-6 months",
            Self::UpToTwelveMonths => "7-12 months",
        }
    }
}

/// Normalized contact form. Field names serialize to the template placeholders.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactSubmission {
    pub name: String,
    pub email: String,
    pub subject: String,
    pub message: String,
    #[serde(skip)]
    pub timestamp: Option<DateTime<FixedOffset>>,
    #[serde(skip)]
    pub token: Option<String>,
    #[serde(skip)]
    pub honeypot: Option<String>,
}

/// Normalized consulting application.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationSubmission {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub street: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    pub service_package: ServicePackage,
    pub consultation_goals: String,
    pub business_stage: BusinessStage,
    pub primary_area_of_expertise: ExpertiseArea,
    pub years_of_experience: f64,
    pub challenges: String,
    pub business_objectives: String,
    pub success_metrics: String,
    pub budget: String,
    pub additional_details: Option<String>,
    pub project_duration: ProjectDuration,
    pub preferred_timeline: Option<String>,
    #[serde(skip)]
    pub honeypot: Option<String>,
}

impl ApplicationSubmission {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// A submission that passed every schema rule. Nothing partially validated exists.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidatedSubmission {
    Contact(ContactSubmission),
    Application(ApplicationSubmission),
}

impl ValidatedSubmission {
    pub fn kind(&self) -> FormKind {
        match self {
            ValidatedSubmission::Contact(_) => FormKind::Contact,
            ValidatedSubmission::Application(_) => FormKind::Application,
        }
    }

    pub fn email(&self) -> &str {
        match self {
            ValidatedSubmission::Contact(form) => &form.email,
            ValidatedSubmission::Application(form) => &form.email,
        }
    }

    pub fn honeypot(&self) -> Option<&str> {
        match self {
            ValidatedSubmission::Contact(form) => form.honeypot.as_deref(),
            ValidatedSubmission::Application(form) => form.honeypot.as_deref(),
        }
    }

    /// Bot-score token; only the contact form carries one.
    pub fn bot_token(&self) -> Option<&str> {
        match self {
            ValidatedSubmission::Contact(form) => form.token.as_deref(),
            ValidatedSubmission::Application(_) => None,
        }
    }

    pub fn notification_subject(&self) -> String {
        match self {
            ValidatedSubmission::Contact(form) => format!("Contact Form: {}", form.subject),
            ValidatedSubmission::Application(form) => {
                format!("New Application: {}", form.full_name())
            }
        }
    }
}
