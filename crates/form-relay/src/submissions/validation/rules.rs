use std::collections::BTreeMap;
use std::sync::OnceLock;

use chrono::{DateTime, FixedOffset};
use regex::Regex;
use serde_json::Value;

use super::super::domain::{FieldError, FormChoice};

/// Broad address shape check applied before any stricter pattern.
const EMAIL_SHAPE: &str =
    r"^[A-Za-z0-9_'+\-.]*[A-Za-z0-9_+\-]@([A-Za-z0-9][A-Za-z0-9\-]*\.)+[A-Za-z]{2,}$";

/// ISO 8601 in UTC with a literal `Z`; offsets are not accepted.
const UTC_TIMESTAMP: &str = r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}(\.\d+)?Z$";

/// The primitive shape a field must arrive in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FieldType {
    Text,
    Number,
}

impl FieldType {
    fn name(self) -> &'static str {
        match self {
            FieldType::Text => "string",
            FieldType::Number => "number",
        }
    }
}

/// Normalization applied to text that passed type checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Normalize {
    Trim,
    TrimLowercase,
    Verbatim,
}

/// Value extracted from the raw record after normalization.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum FieldValue {
    Text(String),
    Number(f64),
}

/// One declarative constraint. Every rule is evaluated; failures accumulate.
#[derive(Debug, Clone)]
pub(crate) enum Rule {
    MinChars { min: usize, message: &'static str },
    MaxChars { max: usize, message: &'static str },
    Email { shape: Regex, message: &'static str },
    Pattern { regex: Regex, message: &'static str },
    DateTime { message: &'static str },
    OneOf { choices: Vec<&'static str> },
    AtLeast { min: f64, message: &'static str },
}

impl Rule {
    pub(crate) fn min_chars(min: usize, message: &'static str) -> Self {
        Rule::MinChars { min, message }
    }

    pub(crate) fn max_chars(max: usize, message: &'static str) -> Self {
        Rule::MaxChars { max, message }
    }

    pub(crate) fn email(message: &'static str) -> Self {
        Rule::Email {
            shape: static_regex(EMAIL_SHAPE),
            message,
        }
    }

    pub(crate) fn pattern(pattern: &'static str, message: &'static str) -> Self {
        Rule::Pattern {
            regex: static_regex(pattern),
            message,
        }
    }

    pub(crate) fn date_time(message: &'static str) -> Self {
        Rule::DateTime { message }
    }

    pub(crate) fn one_of<T: FormChoice>() -> Self {
        Rule::OneOf {
            choices: T::labels(),
        }
    }

    pub(crate) fn at_least(min: f64, message: &'static str) -> Self {
        Rule::AtLeast { min, message }
    }

    /// Returns the violation message, if any.
    fn check(&self, value: &FieldValue) -> Option<String> {
        match (self, value) {
            (Rule::MinChars { min, message }, FieldValue::Text(text)) => {
                (text.chars().count() < *min).then(|| message.to_string())
            }
            (Rule::MaxChars { max, message }, FieldValue::Text(text)) => {
                (text.chars().count() > *max).then(|| message.to_string())
            }
            (Rule::Email { shape, message }, FieldValue::Text(text)) => {
                let local = text.split('@').next().unwrap_or_default();
                let well_formed =
                    shape.is_match(text) && !local.starts_with('.') && !text.contains("..");
                (!well_formed).then(|| message.to_string())
            }
            (Rule::Pattern { regex, message }, FieldValue::Text(text)) => {
                (!regex.is_match(text)).then(|| message.to_string())
            }
            (Rule::DateTime { message }, FieldValue::Text(text)) => {
                parse_utc_timestamp(text).is_none().then(|| message.to_string())
            }
            (Rule::OneOf { choices }, FieldValue::Text(text)) => {
                (!choices.contains(&text.as_str())).then(|| {
                    let expected = choices
                        .iter()
                        .map(|choice| format!("'{choice}'"))
                        .collect::<Vec<_>>()
                        .join(" | ");
                    format!("Invalid enum value. Expected {expected}, received '{text}'")
                })
            }
            (Rule::AtLeast { min, message }, FieldValue::Number(number)) => {
                (*number < *min).then(|| message.to_string())
            }
            _ => None,
        }
    }
}

/// Declarative description of one field: shape, presence, normalization and rules.
#[derive(Debug, Clone)]
pub(crate) struct FieldRules {
    pub(crate) name: &'static str,
    pub(crate) field_type: FieldType,
    pub(crate) required: bool,
    pub(crate) normalize: Normalize,
    pub(crate) rules: Vec<Rule>,
}

impl FieldRules {
    pub(crate) fn text(name: &'static str) -> Self {
        Self {
            name,
            field_type: FieldType::Text,
            required: true,
            normalize: Normalize::Trim,
            rules: Vec::new(),
        }
    }

    pub(crate) fn number(name: &'static str) -> Self {
        Self {
            field_type: FieldType::Number,
            ..Self::text(name)
        }
    }

    pub(crate) fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub(crate) fn lowercase(mut self) -> Self {
        self.normalize = Normalize::TrimLowercase;
        self
    }

    /// Keep the value exactly as submitted.
    pub(crate) fn verbatim(mut self) -> Self {
        self.normalize = Normalize::Verbatim;
        self
    }

    pub(crate) fn rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Evaluate this field against the raw record, appending any violations.
    pub(crate) fn evaluate(
        &self,
        record: &serde_json::Map<String, Value>,
        errors: &mut Vec<FieldError>,
    ) -> Option<FieldValue> {
        let raw = match record.get(self.name) {
            None | Some(Value::Null) => {
                if self.required {
                    errors.push(FieldError::new(&[self.name], "Required"));
                }
                return None;
            }
            Some(raw) => raw,
        };

        let value = match (self.field_type, raw) {
            (FieldType::Text, Value::String(text)) => FieldValue::Text(match self.normalize {
                Normalize::Trim => text.trim().to_string(),
                Normalize::TrimLowercase => text.trim().to_lowercase(),
                Normalize::Verbatim => text.clone(),
            }),
            (FieldType::Number, Value::Number(number)) => match number.as_f64() {
                Some(number) if number.is_finite() => FieldValue::Number(number),
                _ => {
                    errors.push(FieldError::new(&[self.name], "Expected finite number"));
                    return None;
                }
            },
            (expected, other) => {
                errors.push(FieldError::new(
                    &[self.name],
                    format!(
                        "Expected {}, received {}",
                        expected.name(),
                        json_type_name(other)
                    ),
                ));
                return None;
            }
        };

        let before = errors.len();
        for rule in &self.rules {
            if let Some(message) = rule.check(&value) {
                errors.push(FieldError::new(&[self.name], message));
            }
        }

        (errors.len() == before).then_some(value)
    }
}

pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

pub(crate) fn parse_utc_timestamp(text: &str) -> Option<DateTime<FixedOffset>> {
    static SHAPE: OnceLock<Regex> = OnceLock::new();
    let shape = SHAPE.get_or_init(|| static_regex(UTC_TIMESTAMP));
    if !shape.is_match(text) {
        return None;
    }
    DateTime::parse_from_rfc3339(text).ok()
}

fn static_regex(pattern: &'static str) -> Regex {
    Regex::new(pattern).expect("built-in validation pattern compiles")
}

/// Normalized values for fields that passed, keyed by field name.
#[derive(Debug, Default)]
pub(crate) struct FieldValues(BTreeMap<&'static str, FieldValue>);

impl FieldValues {
    pub(crate) fn insert(&mut self, name: &'static str, value: FieldValue) {
        self.0.insert(name, value);
    }

    pub(crate) fn text(&mut self, name: &'static str) -> Result<String, FieldError> {
        match self.0.remove(name) {
            Some(FieldValue::Text(text)) => Ok(text),
            Some(FieldValue::Number(_)) => Err(FieldError::new(
                &[name],
                "Expected string, received number",
            )),
            None => Err(FieldError::new(&[name], "Required")),
        }
    }

    /// Optional text; an empty answer counts as absent.
    pub(crate) fn optional_text(&mut self, name: &'static str) -> Result<Option<String>, FieldError> {
        if !self.0.contains_key(name) {
            return Ok(None);
        }
        self.text(name).map(|text| Some(text).filter(|text| !text.is_empty()))
    }

    pub(crate) fn number(&mut self, name: &'static str) -> Result<f64, FieldError> {
        match self.0.remove(name) {
            Some(FieldValue::Number(number)) => Ok(number),
            Some(FieldValue::Text(_)) => Err(FieldError::new(
                &[name],
                "Expected number, received string",
            )),
            None => Err(FieldError::new(&[name], "Required")),
        }
    }

    pub(crate) fn choice<T: FormChoice>(&mut self, name: &'static str) -> Result<T, FieldError> {
        let label = self.text(name)?;
        T::from_label(&label).ok_or_else(|| {
            FieldError::new(&[name], format!("Unrecognized option '{label}'"))
        })
    }

    pub(crate) fn optional_date_time(
        &mut self,
        name: &'static str,
    ) -> Result<Option<DateTime<FixedOffset>>, FieldError> {
        self.optional_text(name)?
            .map(|raw| {
                parse_utc_timestamp(&raw)
                    .ok_or_else(|| FieldError::new(&[name], "Invalid datetime"))
            })
            .transpose()
    }
}
