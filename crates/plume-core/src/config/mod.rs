//! Remote endpoint configuration for client apps.
//!
//! These values are safe-to-ship public endpoints/keys required to reach
//! the identity provider and the realtime store. Secret credentials must
//! never be stored here.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::util::{is_http_url, normalize_text_option};

const IDENTITY_URL_ENV: &str = "PLUME_IDENTITY_URL";
const API_KEY_ENV: &str = "PLUME_API_KEY";
const DATABASE_URL_ENV: &str = "PLUME_DATABASE_URL";

const DEFAULT_IDENTITY_URL: &str = "https://identitytoolkit.googleapis.com/v1";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required setting: {0}")]
    Missing(&'static str),
    #[error("{0} must include http:// or https://")]
    InvalidUrl(&'static str),
}

/// Build-provisioned remote configuration, as embedded or deserialized
/// by a client app.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct RemoteConfig {
    /// Identity endpoint base. Defaults to the public endpoint.
    #[serde(default)]
    pub identity_url: Option<String>,
    /// Public API key for the identity endpoint.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Base URL of the realtime store.
    #[serde(default)]
    pub database_url: Option<String>,
}

impl RemoteConfig {
    /// Read configuration from `PLUME_*` environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            identity_url: std::env::var(IDENTITY_URL_ENV).ok(),
            api_key: std::env::var(API_KEY_ENV).ok(),
            database_url: std::env::var(DATABASE_URL_ENV).ok(),
        }
    }

    /// Normalize and validate into a usable configuration.
    pub fn resolve(&self) -> Result<ResolvedRemoteConfig, ConfigError> {
        let identity_url = normalize_text_option(self.identity_url.clone())
            .unwrap_or_else(|| DEFAULT_IDENTITY_URL.to_string());
        if !is_http_url(&identity_url) {
            return Err(ConfigError::InvalidUrl("identity_url"));
        }

        let api_key = normalize_text_option(self.api_key.clone())
            .ok_or(ConfigError::Missing("api_key"))?;

        let database_url = normalize_text_option(self.database_url.clone())
            .ok_or(ConfigError::Missing("database_url"))?;
        if !is_http_url(&database_url) {
            return Err(ConfigError::InvalidUrl("database_url"));
        }

        Ok(ResolvedRemoteConfig {
            identity_url: identity_url.trim_end_matches('/').to_string(),
            api_key,
            database_url: database_url.trim_end_matches('/').to_string(),
        })
    }
}

/// Validated remote configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRemoteConfig {
    pub identity_url: String,
    pub api_key: String,
    pub database_url: String,
}
