/// Input validators for identity fields
///
/// Only presence, length and email shape are checked here; richer
/// registration rules belong to the user-management layer.

use regex::Regex;
use lazy_static::lazy_static;

use crate::error::ValidationError;

const MAX_EMAIL_LENGTH: usize = 254; // RFC 5321
const MAX_FIELD_LENGTH: usize = 256;

lazy_static! {
    // RFC 5322 simplified email regex (practical validation)
    static ref EMAIL_REGEX: Regex = Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$"
    ).expect("email regex is valid");
}

/// Require a non-blank field, returning it trimmed
pub fn require(field: &str, value: Option<&str>) -> Result<String, ValidationError> {
    let trimmed = value.map(str::trim).unwrap_or_default();

    if trimmed.is_empty() {
        return Err(ValidationError::EmptyField(field.to_string()));
    }
    if trimmed.chars().count() > MAX_FIELD_LENGTH {
        return Err(ValidationError::TooLong(field.to_string(), MAX_FIELD_LENGTH));
    }

    Ok(trimmed.to_string())
}

/// Require a non-blank secret such as a password, returned untouched
///
/// Whitespace only decides blankness; the stored value keeps it.
pub fn require_secret(field: &str, value: Option<&str>) -> Result<String, ValidationError> {
    let value = value.unwrap_or_default();

    if value.trim().is_empty() {
        return Err(ValidationError::EmptyField(field.to_string()));
    }
    if value.chars().count() > MAX_FIELD_LENGTH {
        return Err(ValidationError::TooLong(field.to_string(), MAX_FIELD_LENGTH));
    }

    Ok(value.to_string())
}

/// Validates email address shape and length
pub fn is_valid_email(email: &str) -> Result<String, ValidationError> {
    let trimmed = email.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::EmptyField("email".to_string()));
    }
    if trimmed.len() > MAX_EMAIL_LENGTH {
        return Err(ValidationError::TooLong("email".to_string(), MAX_EMAIL_LENGTH));
    }
    if !EMAIL_REGEX.is_match(trimmed) {
        return Err(ValidationError::InvalidFormat("email".to_string()));
    }

    Ok(trimmed.to_string())
}
