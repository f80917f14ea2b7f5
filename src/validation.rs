//! Input Sanitization and Validation
//!
//! Every user-supplied string passes through here before it can reach the
//! credential store. Usernames and emails are normalized (disallowed
//! characters stripped, emails lowercased); passwords are only trimmed so
//! their meaning never changes.

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

static TAG_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<[^>]*>").expect("hardcoded tag regex is valid"));

static EMAIL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
        .expect("hardcoded email regex is valid")
});

pub const USERNAME_MIN_LENGTH: usize = 2;
pub const USERNAME_MAX_LENGTH: usize = 32;
pub const EMAIL_MIN_LENGTH: usize = 4;
pub const EMAIL_MAX_LENGTH: usize = 64;
pub const DEFAULT_MIN_PASSWORD_LENGTH: usize = 8;
pub const DEFAULT_MAX_PASSWORD_LENGTH: usize = 128;

/// The kind of field being sanitized
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Username,
    Email,
    Password,
    General,
}

impl InputKind {
    /// Capitalized field name used at the start of messages
    pub fn title(&self) -> &'static str {
        match self {
            InputKind::Username => "Username",
            InputKind::Email => "Email",
            InputKind::Password => "Password",
            InputKind::General => "Input",
        }
    }
}

impl fmt::Display for InputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputKind::Username => write!(f, "username"),
            InputKind::Email => write!(f, "email"),
            InputKind::Password => write!(f, "password"),
            InputKind::General => write!(f, "input"),
        }
    }
}

/// Why a piece of input was rejected
///
/// The messages are written for end users and are returned verbatim in
/// failure responses.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InputError {
    #[error("{} cannot be empty", .0.title())]
    Empty(InputKind),

    #[error("Invalid {0} format")]
    Format(InputKind),

    #[error("{} must be between {min} and {max} characters", .kind.title())]
    Length {
        kind: InputKind,
        min: usize,
        max: usize,
    },

    #[error(
        "Password must contain an uppercase letter, a lowercase letter, a digit and a symbol"
    )]
    WeakPassword,
}

/// Sanitizer with a configurable password policy
#[derive(Debug, Clone, Copy)]
pub struct InputValidator {
    min_password_length: usize,
    max_password_length: usize,
}

impl Default for InputValidator {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_PASSWORD_LENGTH, DEFAULT_MAX_PASSWORD_LENGTH)
    }
}

impl InputValidator {
    pub fn new(min_password_length: usize, max_password_length: usize) -> Self {
        Self {
            min_password_length,
            max_password_length,
        }
    }

    /// Sanitize `raw` according to `kind` and validate the result
    pub fn validate_and_sanitize(&self, raw: &str, kind: InputKind) -> Result<String, InputError> {
        if raw.trim().is_empty() {
            return Err(InputError::Empty(kind));
        }

        match kind {
            InputKind::Username => {
                let clean = sanitize_username(raw);
                validate_username(&clean)?;
                Ok(clean)
            }
            InputKind::Email => {
                let clean = sanitize_email(raw);
                validate_email(&clean)?;
                Ok(clean)
            }
            InputKind::Password => {
                let clean = raw.trim().to_string();
                self.validate_password(&clean)?;
                Ok(clean)
            }
            InputKind::General => Ok(sanitize_general(raw)),
        }
    }

    /// Check a trimmed password against the policy
    pub fn validate_password(&self, password: &str) -> Result<(), InputError> {
        let len = password.chars().count();
        if len < self.min_password_length || len > self.max_password_length {
            return Err(InputError::Length {
                kind: InputKind::Password,
                min: self.min_password_length,
                max: self.max_password_length,
            });
        }

        let has_upper = password.chars().any(|c| c.is_uppercase());
        let has_lower = password.chars().any(|c| c.is_lowercase());
        let has_digit = password.chars().any(|c| c.is_ascii_digit());
        let has_symbol = password.chars().any(|c| !c.is_alphanumeric());

        if !has_upper || !has_lower || !has_digit || !has_symbol {
            return Err(InputError::WeakPassword);
        }

        Ok(())
    }
}

/// Sanitize with the default password policy
pub fn validate_and_sanitize(raw: &str, kind: InputKind) -> Result<String, InputError> {
    InputValidator::default().validate_and_sanitize(raw, kind)
}

fn strip_tags(input: &str) -> String {
    TAG_REGEX.replace_all(input, "").into_owned()
}

/// Remove markup, then keep only letters, digits, `.` and `_`
pub fn sanitize_username(raw: &str) -> String {
    strip_tags(raw)
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '.' || *c == '_')
        .collect()
}

/// Remove characters outside the email alphabet, then lowercase
///
/// Markup is not stripped here: every character that belongs to the email
/// alphabet survives, so `bob<x>@example.com` keeps its `x`.
pub fn sanitize_email(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '%' | '+' | '-' | '@'))
        .collect::<String>()
        .trim()
        .to_lowercase()
}

/// Remove markup and escape what remains to plain text
pub fn sanitize_general(raw: &str) -> String {
    let stripped = strip_tags(raw);
    html_escape::encode_text(stripped.trim()).into_owned()
}

fn validate_username(username: &str) -> Result<(), InputError> {
    let len = username.chars().count();
    if !(USERNAME_MIN_LENGTH..=USERNAME_MAX_LENGTH).contains(&len) {
        return Err(InputError::Length {
            kind: InputKind::Username,
            min: USERNAME_MIN_LENGTH,
            max: USERNAME_MAX_LENGTH,
        });
    }

    let mut chars = username.chars();
    let starts_with_letter = chars.next().map(|c| c.is_ascii_alphabetic()).unwrap_or(false);
    let rest_allowed = chars.all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_');

    if !starts_with_letter || !rest_allowed {
        return Err(InputError::Format(InputKind::Username));
    }

    Ok(())
}

fn validate_email(email: &str) -> Result<(), InputError> {
    let len = email.chars().count();
    if !(EMAIL_MIN_LENGTH..=EMAIL_MAX_LENGTH).contains(&len) {
        return Err(InputError::Length {
            kind: InputKind::Email,
            min: EMAIL_MIN_LENGTH,
            max: EMAIL_MAX_LENGTH,
        });
    }

    if !EMAIL_REGEX.is_match(email) {
        return Err(InputError::Format(InputKind::Email));
    }

    Ok(())
}
