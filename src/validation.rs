//! Field rules applied to request bodies before they reach the database.

use crate::error::{AppError, AppResult};

pub const POST_MAX_CHARS: usize = 500;
pub const COMMENT_MAX_CHARS: usize = 200;
pub const PASSWORD_MIN_CHARS: usize = 6;
pub const USERNAME_MAX_CHARS: usize = 50;
pub const EMAIL_MAX_CHARS: usize = 100;
pub const NAME_MAX_CHARS: usize = 100;
pub const BIO_MAX_CHARS: usize = 500;

/// Trimmed, non-empty text of at most `max` characters.
pub fn required_text(value: Option<&str>, field: &str, max: usize) -> AppResult<String> {
    let text = value.map(str::trim).unwrap_or_default();
    if text.is_empty() {
        return Err(AppError::BadRequest(format!("{} is required", field)));
    }
    if text.chars().count() > max {
        return Err(AppError::BadRequest(format!(
            "{} must be {} characters or less",
            field, max
        )));
    }
    Ok(text.to_string())
}

/// Trimmed optional text. Blank becomes `None`.
pub fn optional_text(value: Option<&str>, field: &str, max: usize) -> AppResult<Option<String>> {
    match value.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(text) if text.chars().count() > max => Err(AppError::BadRequest(format!(
            "{} must be {} characters or less",
            field, max
        ))),
        Some(text) => Ok(Some(text.to_string())),
    }
}

pub fn email(value: Option<&str>) -> AppResult<String> {
    let email = required_text(value, "Email", EMAIL_MAX_CHARS)?;
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && !email.contains(char::is_whitespace)
        }
        None => false,
    };
    if !valid {
        return Err(AppError::BadRequest("Email is not valid".into()));
    }
    Ok(email)
}

/// Passwords are taken verbatim (no trimming).
pub fn password(value: Option<&str>) -> AppResult<String> {
    match value {
        None | Some("") => Err(AppError::BadRequest("Password is required".into())),
        Some(p) if p.chars().count() < PASSWORD_MIN_CHARS => Err(AppError::BadRequest(format!(
            "Password must be at least {} characters long",
            PASSWORD_MIN_CHARS
        ))),
        Some(p) => Ok(p.to_string()),
    }
}
