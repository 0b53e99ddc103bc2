//! Classification of provider errors into a closed set of user-facing
//! kinds.
//!
//! This is the single seam that isolates the provider's error vocabulary
//! from the rest of the system; everything downstream of the data layer
//! operates only on [`ErrorKind`].

use std::fmt;

use crate::auth::ProviderError;

const CODE_INVALID_EMAIL: &str = "ERROR_INVALID_EMAIL";
const CODE_EMAIL_ALREADY_IN_USE: &str = "ERROR_EMAIL_ALREADY_IN_USE";
const CODE_WEAK_PASSWORD: &str = "ERROR_WEAK_PASSWORD";

/// Closed set of user-facing auth error categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidEmail,
    EmailAlreadyInUse,
    WeakPassword,
    InvalidEmailOrPassword,
    Network,
    ProviderUnknown,
    General,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            Self::InvalidEmail => "Invalid email address",
            Self::EmailAlreadyInUse => "This email is already in use",
            Self::WeakPassword => "Password is too weak",
            Self::InvalidEmailOrPassword => "Invalid email and/or password",
            Self::Network => "Check your network connection",
            Self::ProviderUnknown => "The sign-in service reported an unexpected error",
            Self::General => "Something went wrong. Please try again",
        };
        f.write_str(message)
    }
}

/// Map a raw provider error into exactly one [`ErrorKind`].
///
/// Total over [`ProviderError`]: unrecognized provider codes classify as
/// [`ErrorKind::ProviderUnknown`], while non-provider failures classify
/// as [`ErrorKind::General`].
#[must_use]
pub fn classify(error: &ProviderError) -> ErrorKind {
    match error {
        ProviderError::Network(_) => ErrorKind::Network,
        ProviderError::Credential { .. } => ErrorKind::InvalidEmailOrPassword,
        ProviderError::Api { code } => match code.as_str() {
            CODE_INVALID_EMAIL => ErrorKind::InvalidEmail,
            CODE_EMAIL_ALREADY_IN_USE => ErrorKind::EmailAlreadyInUse,
            CODE_WEAK_PASSWORD => ErrorKind::WeakPassword,
            _ => ErrorKind::ProviderUnknown,
        },
        ProviderError::IncompleteIdentity(_) | ProviderError::Other(_) => ErrorKind::General,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn api(code: &str) -> ProviderError {
        ProviderError::Api {
            code: code.to_string(),
        }
    }

    #[test]
    fn classifies_invalid_email() {
        assert_eq!(classify(&api("ERROR_INVALID_EMAIL")), ErrorKind::InvalidEmail);
    }

    #[test]
    fn classifies_email_already_in_use() {
        assert_eq!(
            classify(&api("ERROR_EMAIL_ALREADY_IN_USE")),
            ErrorKind::EmailAlreadyInUse
        );
    }

    #[test]
    fn classifies_weak_password() {
        assert_eq!(classify(&api("ERROR_WEAK_PASSWORD")), ErrorKind::WeakPassword);
    }

    #[test]
    fn unknown_provider_code_is_provider_unknown_not_general() {
        assert_eq!(classify(&api("RANDOM_ERROR")), ErrorKind::ProviderUnknown);
        assert_eq!(classify(&api("")), ErrorKind::ProviderUnknown);
    }

    #[test]
    fn classifies_credential_mismatch_on_sign_in() {
        let error = ProviderError::Credential {
            code: "ERROR_INVALID_EMAIL".to_string(),
        };
        assert_eq!(classify(&error), ErrorKind::InvalidEmailOrPassword);

        let error = ProviderError::Credential {
            code: "ERROR_WRONG_PASSWORD".to_string(),
        };
        assert_eq!(classify(&error), ErrorKind::InvalidEmailOrPassword);
    }

    #[test]
    fn classifies_network_failure() {
        let error = ProviderError::Network("connection refused".to_string());
        assert_eq!(classify(&error), ErrorKind::Network);
    }

    #[test]
    fn non_provider_failures_are_general() {
        assert_eq!(
            classify(&ProviderError::Other("boom".to_string())),
            ErrorKind::General
        );
        assert_eq!(
            classify(&ProviderError::IncompleteIdentity("email")),
            ErrorKind::General
        );
    }
}
