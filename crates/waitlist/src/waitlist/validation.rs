use serde_json::{Map, Value};

use super::domain::{WaitlistSubmission, MAX_EMAIL_CHARS, MAX_FIRST_NAME_CHARS};
use super::email::{validate_email, EmailError};

const REQUIRED_FIELDS: [&str; 2] = ["first_name", "email"];

/// Client input problems, reported as `400` with the message as-is.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("No data provided")]
    NoData,
    #[error("Missing required field: {0}")]
    MissingField(&'static str),
    #[error("Name is too long")]
    NameTooLong,
    #[error("Email is too long")]
    EmailTooLong,
    #[error(transparent)]
    Email(#[from] EmailError),
}

/// Parses a raw request body. Empty or non-JSON bodies count as no data.
pub fn parse_body(body: &[u8]) -> Result<Map<String, Value>, ValidationError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(ValidationError::NoData);
    }
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(fields)) if !fields.is_empty() => Ok(fields),
        _ => Err(ValidationError::NoData),
    }
}

/// Checks and sanitizes a submission. The first violation wins.
pub fn validate_submission(
    fields: &Map<String, Value>,
) -> Result<WaitlistSubmission, ValidationError> {
    if let Some(field) = REQUIRED_FIELDS
        .into_iter()
        .find(|field| !is_present(fields.get(*field)))
    {
        return Err(ValidationError::MissingField(field));
    }

    let first_name = text_field(fields, "first_name");
    let email = text_field(fields, "email");
    let phone = text_field(fields, "phone");

    // Whitespace-only values survive the presence check but not trimming.
    if first_name.is_empty() {
        return Err(ValidationError::MissingField("first_name"));
    }
    if email.is_empty() {
        return Err(ValidationError::MissingField("email"));
    }

    if first_name.chars().count() > MAX_FIRST_NAME_CHARS {
        return Err(ValidationError::NameTooLong);
    }
    if email.chars().count() > MAX_EMAIL_CHARS {
        return Err(ValidationError::EmailTooLong);
    }

    let email = validate_email(&email)?.normalized();
    let reason = fields
        .get("reason")
        .cloned()
        .unwrap_or_else(|| Value::String(String::new()));

    Ok(WaitlistSubmission {
        first_name,
        email,
        phone,
        reason,
    })
}

fn is_present(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(flag)) => *flag,
        Some(Value::Number(number)) => number.as_f64().is_some_and(|n| n != 0.0),
        Some(Value::String(text)) => !text.is_empty(),
        Some(Value::Array(items)) => !items.is_empty(),
        Some(Value::Object(map)) => !map.is_empty(),
    }
}

/// Coerces a field to trimmed text; absent and null become empty.
fn text_field(fields: &Map<String, Value>, key: &str) -> String {
    match fields.get(key) {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text.trim().to_string(),
        Some(other) => other.to_string().trim().to_string(),
    }
}
