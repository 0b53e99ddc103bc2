//! Identity provider boundary and the auth gateway built on top of it.

mod firebase;

pub use firebase::{FirebaseAuthClient, TokenSet};

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{Credentials, User};

/// Fixed upper bound on one create/authenticate call.
const AUTH_TIMEOUT: Duration = Duration::from_millis(5000);

/// Raw identity reported by the provider on a successful call.
///
/// The provider contract requires both a uid and an email; a response
/// missing either is a contract violation surfaced by the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub uid: String,
    pub email: Option<String>,
}

/// Errors raised at the identity-provider boundary.
///
/// These carry the provider's own error vocabulary and never leave the
/// data layer unclassified; see [`crate::error::classify`].
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Transport-level failure, including the fixed call timeout.
    #[error("network error: {0}")]
    Network(String),
    /// Provider rejected the call with one of its error codes.
    #[error("provider error: {code}")]
    Api { code: String },
    /// Sign-in was rejected because the credentials did not match.
    #[error("credential mismatch: {code}")]
    Credential { code: String },
    /// Provider reported success but omitted a required identity field.
    #[error("provider returned an incomplete identity: missing {0}")]
    IncompleteIdentity(&'static str),
    /// Anything else.
    #[error("{0}")]
    Other(String),
}

pub type AuthResult<T> = Result<T, ProviderError>;

/// Remote identity provider seam.
///
/// Implementations must not retry internally; every failure is terminal
/// for that invocation.
#[async_trait]
pub trait IdentityProvider: Send + Sync + 'static {
    /// Create a new account for the given credentials.
    async fn sign_up(&self, email: &str, password: &str) -> AuthResult<Identity>;

    /// Authenticate an existing account.
    async fn sign_in(&self, email: &str, password: &str) -> AuthResult<Identity>;

    /// Invalidate the local provider session. Must not block and always
    /// succeeds locally.
    fn sign_out(&self);
}

/// Applies the fixed call timeout and the identity completeness contract
/// over a raw [`IdentityProvider`].
pub struct AuthGateway<P> {
    provider: P,
}

impl<P: IdentityProvider> AuthGateway<P> {
    #[must_use]
    pub const fn new(provider: P) -> Self {
        Self { provider }
    }

    /// Create an account. Exceeding the 5 s budget fails as a network
    /// error; a success response missing uid or email is a contract
    /// violation and never expected in normal operation.
    pub async fn create(&self, credentials: &Credentials) -> AuthResult<User> {
        let identity = tokio::time::timeout(
            AUTH_TIMEOUT,
            self.provider
                .sign_up(&credentials.email, &credentials.password),
        )
        .await
        .map_err(|_| ProviderError::Network("auth request timed out".to_string()))??;

        user_from_identity(identity)
    }

    /// Authenticate an existing account; same contract as [`Self::create`].
    pub async fn authenticate(&self, credentials: &Credentials) -> AuthResult<User> {
        let identity = tokio::time::timeout(
            AUTH_TIMEOUT,
            self.provider
                .sign_in(&credentials.email, &credentials.password),
        )
        .await
        .map_err(|_| ProviderError::Network("auth request timed out".to_string()))??;

        user_from_identity(identity)
    }

    /// Fire-and-forget local sign-out; the session is invalid immediately.
    pub fn sign_out(&self) {
        self.provider.sign_out();
    }
}

fn user_from_identity(identity: Identity) -> AuthResult<User> {
    if identity.uid.trim().is_empty() {
        tracing::error!("identity provider reported success without a uid");
        return Err(ProviderError::IncompleteIdentity("uid"));
    }

    let email = identity
        .email
        .filter(|email| !email.trim().is_empty())
        .ok_or_else(|| {
            tracing::error!("identity provider reported success without an email");
            ProviderError::IncompleteIdentity("email")
        })?;

    Ok(User::new(identity.uid, email))
}
