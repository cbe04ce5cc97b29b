//! Field validation for account data.

use std::collections::BTreeMap;

pub const MIN_PASSWORD_LENGTH: usize = 8;
pub const MIN_USERNAME_LENGTH: usize = 3;
pub const MAX_USERNAME_LENGTH: usize = 80;
const MAX_PASSWORD_LENGTH: usize = 72; // bcrypt ignores anything longer
const MAX_EMAIL_LENGTH: usize = 254;

/// Per-field validation messages, serialized as `{"field": ["message", ...]}`.
#[derive(Debug, Default, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<&'static str, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.entry(field).or_default().push(message.into());
    }

    pub fn extend(&mut self, field: &'static str, messages: Vec<String>) {
        for message in messages {
            self.add(field, message);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    /// `Ok(())` when no errors were recorded.
    pub fn into_result(self) -> Result<(), FieldErrors> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

/// Usernames: 3 to 80 ASCII letters, digits, or underscores.
pub fn validate_username(username: &str) -> Vec<String> {
    let mut errors = Vec::new();
    let len = username.chars().count();
    if !(MIN_USERNAME_LENGTH..=MAX_USERNAME_LENGTH).contains(&len) {
        errors.push(format!(
            "Username must be between {} and {} characters long.",
            MIN_USERNAME_LENGTH, MAX_USERNAME_LENGTH
        ));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        errors.push("Username can only contain letters, numbers, and underscores.".to_string());
    }
    errors
}

/// Emails: one `@`, non-empty local part, dotted domain, no whitespace.
pub fn validate_email(email: &str) -> Vec<String> {
    let valid = email.len() <= MAX_EMAIL_LENGTH
        && !email.chars().any(char::is_whitespace)
        && match email.split_once('@') {
            Some((local, domain)) => {
                !local.is_empty()
                    && !domain.contains('@')
                    && domain.split('.').count() >= 2
                    && domain.split('.').all(|label| !label.is_empty())
            }
            None => false,
        };
    if valid {
        Vec::new()
    } else {
        vec!["Email address is not valid.".to_string()]
    }
}

/// Password policy: at least 8 characters with an uppercase letter, a digit,
/// and a special character.
pub fn validate_password(password: &str) -> Vec<String> {
    let mut errors = Vec::new();
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        errors.push(format!(
            "Password must be at least {} characters long.",
            MIN_PASSWORD_LENGTH
        ));
    }
    if password.len() > MAX_PASSWORD_LENGTH {
        errors.push(format!(
            "Password must be at most {} bytes long.",
            MAX_PASSWORD_LENGTH
        ));
    }
    if !password.chars().any(|c| c.is_uppercase()) {
        errors.push("Password must contain at least 1 uppercase letter(s).".to_string());
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        errors.push("Password must contain at least 1 digit(s).".to_string());
    }
    if !password
        .chars()
        .any(|c| !c.is_alphanumeric() && !c.is_whitespace())
    {
        errors.push("Password must contain at least 1 special character(s).".to_string());
    }
    errors
}
