//! Structural checks on the sign-in form. Failures here are not counted
//! against the attempt ledger.

use portcullis_common::constants::{DEFAULT_MIN_PASSWORD_LENGTH, messages};
use portcullis_common::{FieldError, SigninForm};
use regex::Regex;

/// Form validation rules
#[derive(Debug, Clone, Copy)]
pub struct FormRules {
    pub min_password_length: usize,
}

impl Default for FormRules {
    fn default() -> Self {
        Self {
            min_password_length: DEFAULT_MIN_PASSWORD_LENGTH,
        }
    }
}

impl FormRules {
    /// Collect every field-level problem with the form
    pub fn validate(&self, form: &SigninForm) -> Result<(), Vec<FieldError>> {
        let mut errors = Vec::new();

        if !valid_email(form.email.trim()) {
            errors.push(FieldError::new("email", messages::INVALID_EMAIL));
        }

        if form.password.chars().count() < self.min_password_length {
            errors.push(FieldError::new(
                "password",
                format!(
                    "Password must be at least {} characters",
                    self.min_password_length
                ),
            ));
        }

        if form.challenge_answer.trim().is_empty() {
            errors.push(FieldError::new("challenge_answer", messages::ANSWER_REQUIRED));
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

fn valid_email(email: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|re| re.is_match(email))
}
