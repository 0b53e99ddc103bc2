//! Synchronous credential validation run before any network call.
//!
//! Validation errors are field-scoped and never reach the network layer;
//! all fields are checked on every submit so each field's error can be
//! displayed simultaneously.

use regex::Regex;

/// Standard email-address grammar: local part, host label, at least one
/// dot-separated domain label.
const EMAIL_PATTERN: &str =
    r"^[A-Za-z0-9+._%\-]{1,256}@[A-Za-z0-9][A-Za-z0-9\-]{0,64}(\.[A-Za-z0-9][A-Za-z0-9\-]{0,25})+$";

/// Sign-up password length bounds, inclusive.
pub const PASSWORD_MIN_LEN: usize = 8;
pub const PASSWORD_MAX_LEN: usize = 20;

/// Per-field validation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldError {
    /// Field is blank or absent.
    Empty,
    /// Email does not match the address grammar.
    InvalidFormat,
    /// Password length is outside the sign-up bounds.
    TooShort,
    /// Repeat password does not equal the password exactly.
    Mismatch,
}

/// Validate an email address. Blank wins over format.
#[must_use]
pub fn validate_email(email: &str) -> Option<FieldError> {
    if email.trim().is_empty() {
        return Some(FieldError::Empty);
    }

    let pattern = Regex::new(EMAIL_PATTERN).expect("Invalid regex");
    if !pattern.is_match(email) {
        return Some(FieldError::InvalidFormat);
    }

    None
}

/// Validate a sign-up password: non-empty and within `[8, 20]` characters.
#[must_use]
pub fn validate_password_sign_up(password: &str) -> Option<FieldError> {
    if let Some(error) = validate_password_sign_in(password) {
        return Some(error);
    }

    if !(PASSWORD_MIN_LEN..=PASSWORD_MAX_LEN).contains(&password.chars().count()) {
        return Some(FieldError::TooShort);
    }

    None
}

/// Validate a sign-in password: only emptiness is checked client-side.
#[must_use]
pub fn validate_password_sign_in(password: &str) -> Option<FieldError> {
    if password.is_empty() {
        return Some(FieldError::Empty);
    }

    None
}

/// Exact, case-sensitive comparison. No trimming.
#[must_use]
pub fn valid_repeat_password(password: &str, repeat: &str) -> bool {
    password == repeat
}

/// Validation outcome for every credential field of one submit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FieldErrors {
    pub email: Option<FieldError>,
    pub password: Option<FieldError>,
    pub repeat_password: Option<FieldError>,
}

impl FieldErrors {
    /// Run every sign-up check regardless of earlier failures.
    #[must_use]
    pub fn sign_up(email: &str, password: &str, repeat_password: &str) -> Self {
        Self {
            email: validate_email(email),
            password: validate_password_sign_up(password),
            repeat_password: (!valid_repeat_password(password, repeat_password))
                .then_some(FieldError::Mismatch),
        }
    }

    /// Run every sign-in check.
    #[must_use]
    pub fn sign_in(email: &str, password: &str) -> Self {
        Self {
            email: validate_email(email),
            password: validate_password_sign_in(password),
            repeat_password: None,
        }
    }

    /// Whether submission may proceed to the network.
    #[must_use]
    pub const fn all_clear(&self) -> bool {
        self.email.is_none() && self.password.is_none() && self.repeat_password.is_none()
    }
}
