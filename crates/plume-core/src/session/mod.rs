//! Session orchestration: validation, gateway calls, observable state.

mod validate;

pub use validate::{
    valid_repeat_password, validate_email, validate_password_sign_in, validate_password_sign_up,
    FieldError, FieldErrors, PASSWORD_MAX_LEN, PASSWORD_MIN_LEN,
};

use tokio::sync::watch;

use crate::auth::{AuthGateway, IdentityProvider};
use crate::error::{classify, ErrorKind};
use crate::models::{Credentials, User};
use crate::state::Phase;

/// Session state as published to observers.
pub type SessionPhase = Phase<User, ErrorKind>;

/// Coordinates field validation, the auth gateway, and error
/// classification, publishing results through watch channels.
///
/// State transitions per submit: Idle -> Loading -> Success | Fail; the
/// next submit re-arms the channel. Nothing is retried automatically.
pub struct SessionService<P: IdentityProvider> {
    gateway: AuthGateway<P>,
    phase: watch::Sender<SessionPhase>,
    field_errors: watch::Sender<FieldErrors>,
}

impl<P: IdentityProvider> SessionService<P> {
    #[must_use]
    pub fn new(provider: P) -> Self {
        let (phase, _) = watch::channel(SessionPhase::Idle);
        let (field_errors, _) = watch::channel(FieldErrors::default());
        Self {
            gateway: AuthGateway::new(provider),
            phase,
            field_errors,
        }
    }

    /// Observe the session state; a new observer immediately sees the
    /// latest value.
    #[must_use]
    pub fn phase(&self) -> watch::Receiver<SessionPhase> {
        self.phase.subscribe()
    }

    /// Observe per-field validation errors.
    #[must_use]
    pub fn field_errors(&self) -> watch::Receiver<FieldErrors> {
        self.field_errors.subscribe()
    }

    /// Validate and create an account.
    ///
    /// When any field fails validation the errors are published and the
    /// session phase is left untouched; only a fully valid submit reaches
    /// the network.
    pub async fn create_user(&self, email: &str, password: &str, repeat_password: &str) {
        let errors = FieldErrors::sign_up(email, password, repeat_password);
        self.field_errors.send_replace(errors);
        if !errors.all_clear() {
            return;
        }

        self.phase.send_replace(SessionPhase::Loading);
        let credentials = Credentials::new(email, password);
        match self.gateway.create(&credentials).await {
            Ok(user) => {
                self.phase.send_replace(SessionPhase::Success(user));
            }
            Err(error) => {
                tracing::warn!("sign-up failed: {error}");
                self.phase.send_replace(SessionPhase::Fail(classify(&error)));
            }
        }
    }

    /// Validate and authenticate an existing account.
    pub async fn auth_user(&self, email: &str, password: &str) {
        let errors = FieldErrors::sign_in(email, password);
        self.field_errors.send_replace(errors);
        if !errors.all_clear() {
            return;
        }

        self.phase.send_replace(SessionPhase::Loading);
        let credentials = Credentials::new(email.trim(), password);
        match self.gateway.authenticate(&credentials).await {
            Ok(user) => {
                self.phase.send_replace(SessionPhase::Success(user));
            }
            Err(error) => {
                tracing::warn!("sign-in failed: {error}");
                self.phase.send_replace(SessionPhase::Fail(classify(&error)));
            }
        }
    }

    /// Invalidate the session locally and reset the state to idle.
    pub fn sign_out(&self) {
        self.gateway.sign_out();
        self.phase.send_replace(SessionPhase::Idle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AuthResult, Identity, ProviderError};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Clone)]
    struct StubProvider {
        result: Result<Identity, String>,
        calls: Arc<AtomicUsize>,
    }

    impl StubProvider {
        fn ok(uid: &str, email: &str) -> Self {
            Self {
                result: Ok(Identity {
                    uid: uid.to_string(),
                    email: Some(email.to_string()),
                }),
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn err(code: &str) -> Self {
            Self {
                result: Err(code.to_string()),
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn respond(&self) -> AuthResult<Identity> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.result {
                Ok(identity) => Ok(identity.clone()),
                Err(code) => Err(ProviderError::Api { code: code.clone() }),
            }
        }
    }

    #[async_trait]
    impl IdentityProvider for StubProvider {
        async fn sign_up(&self, _email: &str, _password: &str) -> AuthResult<Identity> {
            self.respond()
        }

        async fn sign_in(&self, _email: &str, _password: &str) -> AuthResult<Identity> {
            self.respond()
        }

        fn sign_out(&self) {}
    }

    #[tokio::test]
    async fn invalid_fields_block_submission_and_leave_phase_idle() {
        let provider = StubProvider::ok("1400", "error@mail.ru");
        let calls = Arc::clone(&provider.calls);
        let service = SessionService::new(provider);

        service.create_user("not-an-email", "short", "other").await;

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(service.phase().borrow().is_idle());
        let errors = *service.field_errors().borrow();
        assert_eq!(errors.email, Some(FieldError::InvalidFormat));
        assert_eq!(errors.password, Some(FieldError::TooShort));
        assert_eq!(errors.repeat_password, Some(FieldError::Mismatch));
    }

    #[tokio::test]
    async fn successful_sign_up_publishes_user() {
        let service = SessionService::new(StubProvider::ok("1400", "error@mail.ru"));

        service
            .create_user("error@mail.ru", "qwerty12345", "qwerty12345")
            .await;

        let phase = service.phase().borrow().clone();
        assert_eq!(
            phase,
            SessionPhase::Success(User::new("1400", "error@mail.ru"))
        );
    }

    #[tokio::test]
    async fn provider_failure_is_classified() {
        let service = SessionService::new(StubProvider::err("ERROR_WEAK_PASSWORD"));

        service
            .create_user("testsystem@gmail.com", "test1234", "test1234")
            .await;

        let phase = service.phase().borrow().clone();
        assert_eq!(phase, SessionPhase::Fail(ErrorKind::WeakPassword));
    }

    #[tokio::test]
    async fn sign_in_checks_only_emptiness_on_password() {
        let service = SessionService::new(StubProvider::ok("1400", "error@mail.ru"));

        service.auth_user("error@mail.ru", "").await;
        assert!(service.phase().borrow().is_idle());

        // Short passwords are legal on sign-in; only the provider decides.
        service.auth_user("error@mail.ru", "abc").await;
        let phase = service.phase().borrow().clone();
        assert_eq!(
            phase,
            SessionPhase::Success(User::new("1400", "error@mail.ru"))
        );
    }

    #[tokio::test]
    async fn sign_out_resets_phase_to_idle() {
        let service = SessionService::new(StubProvider::ok("1400", "error@mail.ru"));

        service
            .create_user("error@mail.ru", "qwerty12345", "qwerty12345")
            .await;
        service.sign_out();

        assert!(service.phase().borrow().is_idle());
    }
}
