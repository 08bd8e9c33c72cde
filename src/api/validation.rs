//! Input validation for API requests.
//!
//! Validation functions return `Err(String)` with a human-readable message;
//! handlers collect them into an `ApiError` via `ValidationErrorBuilder`.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Pragmatic email shape check; real verification is out of scope
    static ref EMAIL_REGEX: Regex =
        Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
}

pub const MIN_CLASS_DURATION_MINUTES: i64 = 15;
pub const MIN_PASSWORD_LENGTH: usize = 6;

pub fn validate_email(email: &str) -> Result<(), String> {
    if email.is_empty() {
        return Err("Email is required".to_string());
    }

    if email.len() > 254 {
        return Err("Email is too long (max 254 characters)".to_string());
    }

    if !EMAIL_REGEX.is_match(email) {
        return Err("Invalid email address".to_string());
    }

    Ok(())
}

pub fn validate_name(name: &str) -> Result<(), String> {
    if name.trim().is_empty() {
        return Err("Name is required".to_string());
    }

    if name.len() > 100 {
        return Err("Name is too long (max 100 characters)".to_string());
    }

    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), String> {
    if password.len() < MIN_PASSWORD_LENGTH {
        return Err(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        ));
    }

    if password.len() > 128 {
        return Err("Password is too long (max 128 characters)".to_string());
    }

    Ok(())
}

/// Validate an RFC 3339 timestamp. Past times are allowed; a class may be
/// backfilled after the fact.
pub fn validate_timestamp(value: &str, field_name: &str) -> Result<(), String> {
    if value.is_empty() {
        return Err(format!("{} is required", field_name));
    }

    chrono::DateTime::parse_from_rfc3339(value)
        .map(|_| ())
        .map_err(|_| format!("Invalid {} format, expected RFC 3339", field_name))
}

pub fn validate_duration(minutes: i64) -> Result<(), String> {
    if minutes < MIN_CLASS_DURATION_MINUTES {
        return Err(format!(
            "Duration must be at least {} minutes",
            MIN_CLASS_DURATION_MINUTES
        ));
    }

    Ok(())
}

pub fn validate_title(title: &str) -> Result<(), String> {
    if title.trim().is_empty() {
        return Err("Title is required".to_string());
    }

    if title.len() > 200 {
        return Err("Title is too long (max 200 characters)".to_string());
    }

    Ok(())
}

pub fn validate_message_content(content: &str) -> Result<(), String> {
    if content.trim().is_empty() {
        return Err("Message content is required".to_string());
    }

    Ok(())
}

/// Validate a UUID string
pub fn validate_uuid(id: &str, field_name: &str) -> Result<(), String> {
    if id.is_empty() {
        return Err(format!("{} is required", field_name));
    }

    if uuid::Uuid::parse_str(id).is_err() {
        return Err(format!("Invalid {} format", field_name));
    }

    Ok(())
}

/// Roles an admin may assign when creating accounts
const ASSIGNABLE_ROLES: [&str; 2] = ["teacher", "student"];

pub fn validate_assignable_role(role: &str) -> Result<(), String> {
    let lower = role.to_lowercase();
    if !ASSIGNABLE_ROLES.contains(&lower.as_str()) {
        return Err(format!(
            "Invalid role. Must be one of: {}",
            ASSIGNABLE_ROLES.join(", ")
        ));
    }
    Ok(())
}
