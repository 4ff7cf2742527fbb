//! Field checks shared by the auth, organization and profile services.

use crate::error::AppError;

pub struct RequestValidator;

impl RequestValidator {
    /// Trim and lowercase an email, rejecting anything without a local part and a domain.
    pub fn email(raw: &str) -> Result<String, AppError> {
        let email = raw.trim().to_lowercase();
        let valid = match email.split_once('@') {
            Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.starts_with('.'),
            None => false,
        };
        if !valid || email.len() > 255 {
            return Err(AppError::Validation("email must be a valid email".into()));
        }
        Ok(email)
    }

    pub fn password(password: &str) -> Result<(), AppError> {
        if password.is_empty() {
            return Err(AppError::Validation("password is required".into()));
        }
        // bcrypt ignores input past 72 bytes
        if password.len() > 72 {
            return Err(AppError::Validation("password must be at most 72 bytes".into()));
        }
        Ok(())
    }

    pub fn max_length(field: &str, value: Option<&str>, max: usize) -> Result<(), AppError> {
        match value {
            Some(s) if s.chars().count() > max => Err(AppError::Validation(format!(
                "{} must be at most {} characters",
                field, max
            ))),
            _ => Ok(()),
        }
    }

    pub fn required(field: &str, value: &str) -> Result<(), AppError> {
        if value.trim().is_empty() {
            return Err(AppError::Validation(format!("{} is required", field)));
        }
        Ok(())
    }
}
