//! Client settings and credential resolution.

use std::fmt;
use std::time::Duration;

use url::Url;

use crate::error::ApiError;

pub const DEFAULT_BASE_URL: &str = "https://api.housecanary.com";
pub const DEFAULT_VERSION: &str = "v2";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

pub const API_KEY_ENV: &str = "HC_API_KEY";
pub const API_SECRET_ENV: &str = "HC_API_SECRET";

/// Where requests go and how long the default transport waits for them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub base_url: String,
    /// API version path segment, e.g. `"v2"`.
    pub version: String,
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            version: DEFAULT_VERSION.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl ClientConfig {
    /// `{base_url}/{version}/{endpoint}` as a parsed URL without query.
    pub fn endpoint_url(&self, endpoint: &str) -> Result<Url, ApiError> {
        let base = self.base_url.trim_end_matches('/');
        let url = Url::parse(&format!("{base}/{}/{endpoint}", self.version))?;
        Ok(url)
    }

    pub(crate) fn validate(&self) -> Result<(), ApiError> {
        let url = Url::parse(&self.base_url)?;
        if url.cannot_be_a_base() {
            return Err(ApiError::ConfigError(format!(
                "base url {} cannot carry a path",
                self.base_url
            )));
        }
        if self.version.is_empty() {
            return Err(ApiError::ConfigError("api version must not be empty".to_string()));
        }
        Ok(())
    }
}

/// API key and shared secret. `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    key: String,
    secret: String,
}

impl Credentials {
    pub fn new(key: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            secret: secret.into(),
        }
    }

    /// Explicit arguments win; `HC_API_KEY` / `HC_API_SECRET` fill the gaps.
    /// Empty strings count as absent.
    pub fn resolve(key: Option<&str>, secret: Option<&str>) -> Result<Self, ApiError> {
        Self::resolve_with(key, secret, |name| std::env::var(name).ok())
    }

    /// Same as `resolve` with a caller-supplied variable lookup.
    pub fn resolve_with(
        key: Option<&str>,
        secret: Option<&str>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ApiError> {
        let pick = |explicit: Option<&str>, var: &str| {
            explicit
                .filter(|value| !value.is_empty())
                .map(str::to_string)
                .or_else(|| lookup(var).filter(|value| !value.is_empty()))
        };

        let key = pick(key, API_KEY_ENV).ok_or_else(|| {
            ApiError::ConfigError(format!("missing API key: pass one or set {API_KEY_ENV}"))
        })?;
        let secret = pick(secret, API_SECRET_ENV).ok_or_else(|| {
            ApiError::ConfigError(format!("missing API secret: pass one or set {API_SECRET_ENV}"))
        })?;
        Ok(Self { key, secret })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("key", &self.key)
            .field("secret", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(key: Option<&'static str>, secret: Option<&'static str>) -> impl Fn(&str) -> Option<String> {
        move |name| match name {
            API_KEY_ENV => key.map(str::to_string),
            API_SECRET_ENV => secret.map(str::to_string),
            _ => None,
        }
    }

    #[test]
    fn explicit_arguments_take_precedence() {
        let creds =
            Credentials::resolve_with(Some("arg_key"), Some("arg_secret"), env(Some("env_key"), Some("env_secret")))
                .unwrap();
        assert_eq!(creds.key(), "arg_key");
        assert_eq!(creds.secret(), "arg_secret");
    }

    #[test]
    fn environment_fills_missing_values() {
        let creds = Credentials::resolve_with(Some("arg_key"), None, env(None, Some("env_secret"))).unwrap();
        assert_eq!(creds.key(), "arg_key");
        assert_eq!(creds.secret(), "env_secret");
    }

    #[test]
    fn empty_argument_falls_back_to_environment() {
        let creds = Credentials::resolve_with(Some(""), Some(""), env(Some("k"), Some("s"))).unwrap();
        assert_eq!(creds.key(), "k");
    }

    #[test]
    fn missing_credentials_fail() {
        let err = Credentials::resolve_with(None, None, env(None, None)).unwrap_err();
        assert!(matches!(err, ApiError::ConfigError(_)));

        let err = Credentials::resolve_with(Some("k"), None, env(None, None)).unwrap_err();
        match err {
            ApiError::ConfigError(msg) => assert!(msg.contains(API_SECRET_ENV)),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn debug_redacts_secret() {
        let creds = Credentials::new("key", "super-secret");
        let printed = format!("{creds:?}");
        assert!(printed.contains("key"));
        assert!(!printed.contains("super-secret"));
    }

    #[test]
    fn endpoint_url_joins_segments() {
        let config = ClientConfig {
            base_url: "http://localhost:3000/".to_string(),
            ..ClientConfig::default()
        };
        let url = config.endpoint_url("property/value").unwrap();
        assert_eq!(url.as_str(), "http://localhost:3000/v2/property/value");
        assert_eq!(url.path(), "/v2/property/value");
    }

    #[test]
    fn validate_rejects_bad_base_url() {
        let config = ClientConfig {
            base_url: "not a url".to_string(),
            ..ClientConfig::default()
        };
        assert!(matches!(config.validate().unwrap_err(), ApiError::ConfigError(_)));
        assert!(ClientConfig::default().validate().is_ok());
    }
}
