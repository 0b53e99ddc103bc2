//! REST client for the Firebase identity endpoints.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use crate::config::ResolvedRemoteConfig;
use crate::util::{compact_text, is_http_url};

use super::{AuthResult, Identity, IdentityProvider, ProviderError};

const DEFAULT_IDENTITY_URL: &str = "https://identitytoolkit.googleapis.com/v1";

/// Tokens returned alongside a successful sign-up/sign-in. Kept so the
/// realtime store can authenticate its own requests.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenSet {
    pub id_token: String,
    pub refresh_token: String,
}

impl fmt::Debug for TokenSet {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("TokenSet")
            .field("id_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .finish()
    }
}

/// Identity-toolkit REST client.
///
/// Error codes from the REST surface are normalized to the provider's
/// canonical `ERROR_*` vocabulary before they leave this module, so the
/// classifier only ever sees one spelling per failure.
#[derive(Clone)]
pub struct FirebaseAuthClient {
    base_url: String,
    api_key: String,
    client: Client,
    tokens: Arc<RwLock<Option<TokenSet>>>,
}

impl FirebaseAuthClient {
    pub fn new(url: impl AsRef<str>, api_key: impl Into<String>) -> AuthResult<Self> {
        let base_url = normalize_identity_url(url.as_ref())?;
        let api_key = api_key.into().trim().to_string();
        if api_key.is_empty() {
            return Err(ProviderError::Other(
                "identity API key must not be empty".to_string(),
            ));
        }

        Ok(Self {
            base_url,
            api_key,
            client: Client::builder()
                .build()
                .map_err(|error| ProviderError::Other(error.to_string()))?,
            tokens: Arc::new(RwLock::new(None)),
        })
    }

    /// Build a client from resolved remote configuration.
    pub fn from_config(config: &ResolvedRemoteConfig) -> AuthResult<Self> {
        Self::new(&config.identity_url, config.api_key.clone())
    }

    /// The id token of the current provider session, if any.
    #[must_use]
    pub fn id_token(&self) -> Option<String> {
        self.tokens
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|tokens| tokens.id_token.clone())
    }

    async fn account_call(&self, action: &str, email: &str, password: &str) -> AuthResult<Identity> {
        let payload = serde_json::json!({
            "email": email,
            "password": password,
            "returnSecureToken": true,
        });
        let url = format!("{}/accounts:{}?key={}", self.base_url, action, self.api_key);

        let response = self
            .client
            .post(url)
            .json(&payload)
            .send()
            .await
            .map_err(from_reqwest)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(parse_api_error(status, &body));
        }

        let payload = response
            .json::<AccountResponse>()
            .await
            .map_err(from_reqwest)?;

        if let (Some(id_token), Some(refresh_token)) = (payload.id_token, payload.refresh_token) {
            *self.tokens.write().unwrap_or_else(PoisonError::into_inner) = Some(TokenSet {
                id_token,
                refresh_token,
            });
        }

        Ok(Identity {
            uid: payload.local_id.unwrap_or_default(),
            email: payload.email,
        })
    }
}

#[async_trait]
impl IdentityProvider for FirebaseAuthClient {
    async fn sign_up(&self, email: &str, password: &str) -> AuthResult<Identity> {
        self.account_call("signUp", email, password).await
    }

    async fn sign_in(&self, email: &str, password: &str) -> AuthResult<Identity> {
        self.account_call("signInWithPassword", email, password).await
    }

    fn sign_out(&self) {
        *self.tokens.write().unwrap_or_else(PoisonError::into_inner) = None;
        tracing::debug!("provider session cleared");
    }
}

fn normalize_identity_url(url: &str) -> AuthResult<String> {
    let trimmed = url.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Ok(DEFAULT_IDENTITY_URL.to_string());
    }
    if !is_http_url(trimmed) {
        return Err(ProviderError::Other(
            "identity URL must include http:// or https://".to_string(),
        ));
    }
    Ok(trimmed.to_string())
}

fn from_reqwest(error: reqwest::Error) -> ProviderError {
    if error.is_decode() {
        ProviderError::Other(error.to_string())
    } else {
        ProviderError::Network(error.to_string())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountResponse {
    local_id: Option<String>,
    email: Option<String>,
    id_token: Option<String>,
    refresh_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> ProviderError {
    let message = serde_json::from_str::<ApiErrorBody>(body)
        .ok()
        .and_then(|payload| payload.error)
        .and_then(|detail| detail.message);

    match message {
        Some(message) => canonical_error(&message),
        None => ProviderError::Other(format!(
            "{} (HTTP {})",
            compact_text(body),
            status.as_u16()
        )),
    }
}

/// Normalize a REST error message to the provider's canonical code.
///
/// The REST surface prefixes some messages with detail text, e.g.
/// `WEAK_PASSWORD : Password should be at least 6 characters`; only the
/// leading token is the code.
fn canonical_error(message: &str) -> ProviderError {
    let code = message
        .split([' ', ':'])
        .next()
        .unwrap_or_default()
        .trim()
        .to_string();

    match code.as_str() {
        "EMAIL_EXISTS" => ProviderError::Api {
            code: "ERROR_EMAIL_ALREADY_IN_USE".to_string(),
        },
        "INVALID_EMAIL" | "MISSING_EMAIL" => ProviderError::Api {
            code: "ERROR_INVALID_EMAIL".to_string(),
        },
        "WEAK_PASSWORD" => ProviderError::Api {
            code: "ERROR_WEAK_PASSWORD".to_string(),
        },
        "EMAIL_NOT_FOUND" => ProviderError::Credential {
            code: "ERROR_USER_NOT_FOUND".to_string(),
        },
        "INVALID_PASSWORD" => ProviderError::Credential {
            code: "ERROR_WRONG_PASSWORD".to_string(),
        },
        "INVALID_LOGIN_CREDENTIALS" => ProviderError::Credential {
            code: "ERROR_INVALID_LOGIN_CREDENTIALS".to_string(),
        },
        _ => ProviderError::Api { code },
    }
}
