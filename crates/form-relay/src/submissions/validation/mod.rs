//! Declarative per-form schemas producing either a typed submission or every field error.

mod rules;

use serde_json::Value;

use super::domain::{
    ApplicationSubmission, BusinessStage, ContactSubmission, ExpertiseArea, FieldError, FormKind,
    ProjectDuration, ServicePackage, ValidatedSubmission, ValidationErrors,
};
use rules::{json_type_name, FieldRules, FieldValues, Rule};

const NAME_CHARACTERS: &str = r"^[a-zA-Z\s]*$";
const STRICT_EMAIL: &str = r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$";
/// Only the tail is anchored, so formatted numbers such as `415-555-0100` pass.
const PHONE: &str = r"\+?[1-9]\d{1,14}$";

/// Field rules for one form kind.
#[derive(Debug, Clone)]
struct FormSchema {
    fields: Vec<FieldRules>,
}

impl FormSchema {
    fn contact() -> Self {
        Self {
            fields: vec![
                FieldRules::text("name")
                    .rule(Rule::min_chars(2, "Name must be at least 2 characters"))
                    .rule(Rule::pattern(NAME_CHARACTERS, "Name must contain only letters")),
                FieldRules::text("email")
                    .lowercase()
                    .rule(Rule::email("Invalid email format"))
                    .rule(Rule::pattern(
                        STRICT_EMAIL,
                        "Please enter a valid email address",
                    )),
                FieldRules::text("subject")
                    .rule(Rule::min_chars(5, "Subject must be at least 5 characters"))
                    .rule(Rule::max_chars(200, "Subject must not exceed 200 characters")),
                FieldRules::text("message")
                    .rule(Rule::min_chars(10, "Message must be at least 10 characters"))
                    .rule(Rule::max_chars(1000, "Message must not exceed 1000 characters")),
                FieldRules::text("timestamp")
                    .optional()
                    .rule(Rule::date_time("Invalid datetime")),
                FieldRules::text("token").optional(),
                FieldRules::text("honeypot").optional().verbatim(),
            ],
        }
    }

    fn application() -> Self {
        Self {
            fields: vec![
                FieldRules::text("firstName").rule(Rule::min_chars(
                    2,
                    "First name must be at least 2 characters",
                )),
                FieldRules::text("lastName").rule(Rule::min_chars(
                    2,
                    "Last name must be at least 2 characters",
                )),
                FieldRules::text("email")
                    .lowercase()
                    .rule(Rule::email("Invalid email address")),
                FieldRules::text("phone").rule(Rule::pattern(PHONE, "Invalid phone number")),
                FieldRules::text("street").optional(),
                FieldRules::text("city").optional(),
                FieldRules::text("state").optional(),
                FieldRules::text("zipCode").optional(),
                FieldRules::text("servicePackage").rule(Rule::one_of::<ServicePackage>()),
                FieldRules::text("consultationGoals")
                    .rule(Rule::min_chars(10, "Please provide detailed goals")),
                FieldRules::text("businessStage").rule(Rule::one_of::<BusinessStage>()),
                FieldRules::text("primaryAreaOfExpertise").rule(Rule::one_of::<ExpertiseArea>()),
                FieldRules::number("yearsOfExperience")
                    .rule(Rule::at_least(1.0, "Please enter a valid number of years")),
                FieldRules::text("challenges")
                    .rule(Rule::min_chars(10, "Please describe your challenges")),
                FieldRules::text("businessObjectives").rule(Rule::min_chars(
                    10,
                    "Please describe your business objectives",
                )),
                FieldRules::text("successMetrics")
                    .rule(Rule::min_chars(10, "Please define your success metrics")),
                FieldRules::text("budget"),
                FieldRules::text("additionalDetails").optional(),
                FieldRules::text("projectDuration").rule(Rule::one_of::<ProjectDuration>()),
                FieldRules::text("preferredTimeline").optional(),
                FieldRules::text("honeypot").optional().verbatim(),
            ],
        }
    }

    /// Run every field's rules. Unknown keys in the record are ignored.
    fn evaluate(&self, raw: &Value) -> Result<FieldValues, ValidationErrors> {
        let Value::Object(record) = raw else {
            return Err(FieldError::new(
                &[],
                format!("Expected object, received {}", json_type_name(raw)),
            )
            .into());
        };

        let mut errors = Vec::new();
        let mut values = FieldValues::default();
        for field in &self.fields {
            if let Some(value) = field.evaluate(record, &mut errors) {
                values.insert(field.name, value);
            }
        }

        if errors.is_empty() {
            Ok(values)
        } else {
            let mut collected = ValidationErrors::default();
            for error in errors {
                collected.push(error);
            }
            Err(collected)
        }
    }
}

/// Validator holding the compiled schemas for every form kind.
#[derive(Debug, Clone)]
pub struct FormValidator {
    contact: FormSchema,
    application: FormSchema,
}

impl Default for FormValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl FormValidator {
    pub fn new() -> Self {
        Self {
            contact: FormSchema::contact(),
            application: FormSchema::application(),
        }
    }

    /// Validate a raw JSON record for `kind`, normalizing on success only.
    pub fn validate(
        &self,
        kind: FormKind,
        raw: &Value,
    ) -> Result<ValidatedSubmission, ValidationErrors> {
        match kind {
            FormKind::Contact => {
                let mut values = self.contact.evaluate(raw)?;
                Ok(ValidatedSubmission::Contact(contact_from(&mut values)?))
            }
            FormKind::Application => {
                let mut values = self.application.evaluate(raw)?;
                Ok(ValidatedSubmission::Application(application_from(
                    &mut values,
                )?))
            }
        }
    }
}

fn contact_from(values: &mut FieldValues) -> Result<ContactSubmission, FieldError> {
    Ok(ContactSubmission {
        name: values.text("name")?,
        email: values.text("email")?,
        subject: values.text("subject")?,
        message: values.text("message")?,
        timestamp: values.optional_date_time("timestamp")?,
        token: values.optional_text("token")?,
        honeypot: values.optional_text("honeypot")?,
    })
}

fn application_from(values: &mut FieldValues) -> Result<ApplicationSubmission, FieldError> {
    Ok(ApplicationSubmission {
        first_name: values.text("firstName")?,
        last_name: values.text("lastName")?,
        email: values.text("email")?,
        phone: values.text("phone")?,
        street: values.optional_text("street")?,
        city: values.optional_text("city")?,
        state: values.optional_text("state")?,
        zip_code: values.optional_text("zipCode")?,
        service_package: values.choice("servicePackage")?,
        consultation_goals: values.text("consultationGoals")?,
        business_stage: values.choice("businessStage")?,
        primary_area_of_expertise: values.choice("primaryAreaOfExpertise")?,
        years_of_experience: values.number("yearsOfExperience")?,
        challenges: values.text("challenges")?,
        business_objectives: values.text("businessObjectives")?,
        success_metrics: values.text("successMetrics")?,
        budget: values.text("budget")?,
        additional_details: values.optional_text("additionalDetails")?,
        project_duration: values.choice("projectDuration")?,
        preferred_timeline: values.optional_text("preferredTimeline")?,
        honeypot: values.optional_text("honeypot")?,
    })
}
