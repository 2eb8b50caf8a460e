//! Format checks for contact fields typed in during profile collection.

use regex::Regex;
use std::sync::OnceLock;

use crate::config::ValidationSettings;
use crate::error::{InterviewError, InterviewResult};

use super::ContactField;

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@.]{2,}$").expect("email pattern compiles")
    })
}

fn phone_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[\d\s\-+()]+$").expect("phone pattern compiles"))
}

/// Validates and normalizes one contact-field value.
///
/// Returns the trimmed value on success. On failure the caller must leave the
/// session untouched and re-prompt.
pub fn validate_field(
    field: ContactField,
    raw: &str,
    settings: &ValidationSettings,
) -> InterviewResult<String> {
    let value = raw.trim();
    if value.is_empty() {
        return Err(InterviewError::Validation {
            field,
            reason: "Please provide a valid response".into(),
        });
    }
    match field {
        ContactField::Name => Ok(value.to_string()),
        ContactField::Email => {
            if email_pattern().is_match(value) {
                Ok(value.to_string())
            } else {
                Err(InterviewError::Validation {
                    field,
                    reason: "Please enter a valid email address".into(),
                })
            }
        }
        ContactField::Phone => {
            let long_enough = value.chars().count() >= settings.phone_min_chars;
            let digits = value.chars().filter(char::is_ascii_digit).count();
            let strict_ok = !settings.strict_phone || digits >= settings.phone_min_chars;
            if phone_pattern().is_match(value) && long_enough && strict_ok {
                Ok(value.to_string())
            } else {
                Err(InterviewError::Validation {
                    field,
                    reason: "Please enter a valid phone number".into(),
                })
            }
        }
    }
}
