//! Client configuration from the environment.
//!
//! Resolution order: CLI flag > process environment > `.env` file > default.
//! `.env` is loaded by `from_env` and never overrides variables that are
//! already set.

use std::time::Duration;

use thiserror::Error;

use crate::api::DEFAULT_TOKEN_KEY;
use crate::storage::StoreKind;

pub const ENV_API_URL: &str = "FORENSIC_API_URL";
pub const ENV_TOKEN_KEY: &str = "FORENSIC_TOKEN_KEY";
pub const ENV_LOGIN_PATH: &str = "FORENSIC_LOGIN_PATH";
pub const ENV_TIMEOUT_SECS: &str = "FORENSIC_TIMEOUT_SECS";
pub const ENV_CREDENTIAL_STORE: &str = "FORENSIC_CREDENTIAL_STORE";

pub const DEFAULT_API_URL: &str = "http://localhost:5000";
pub const DEFAULT_LOGIN_PATH: &str = "/api/auth/login";

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("Invalid value {value:?} for {key}: {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Backend origin every relative path is resolved against.
    pub base_url: String,
    /// Storage key of the session token.
    pub token_key: String,
    pub login_path: String,
    /// Client-wide request timeout. `None` waits indefinitely.
    pub timeout: Option<Duration>,
    pub credential_store: StoreKind,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            token_key: DEFAULT_TOKEN_KEY.to_string(),
            login_path: DEFAULT_LOGIN_PATH.to_string(),
            timeout: None,
            credential_store: StoreKind::Keychain,
        }
    }
}

impl ClientConfig {
    /// Load `.env` (if present) and read the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                log::warn!("Ignoring unreadable .env file: {}", e);
            }
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary variable lookup. Blank values count
    /// as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(url) = get(ENV_API_URL) {
            config.base_url = parse_base_url(&url)?;
        }
        if let Some(key) = get(ENV_TOKEN_KEY) {
            config.token_key = key.trim().to_string();
        }
        if let Some(path) = get(ENV_LOGIN_PATH) {
            config.login_path = path.trim().to_string();
        }
        if let Some(secs) = get(ENV_TIMEOUT_SECS) {
            config.timeout = Some(parse_timeout(&secs)?);
        }
        if let Some(kind) = get(ENV_CREDENTIAL_STORE) {
            config.credential_store =
                kind.parse::<StoreKind>().map_err(|reason| ConfigError::InvalidValue {
                    key: ENV_CREDENTIAL_STORE,
                    value: kind.clone(),
                    reason,
                })?;
        }

        Ok(config)
    }
}

/// Accepts only absolute http(s) URLs; strips any trailing slash.
pub fn parse_base_url(raw: &str) -> Result<String, ConfigError> {
    let url = raw.trim();
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(ConfigError::InvalidValue {
            key: ENV_API_URL,
            value: raw.to_string(),
            reason: "expected an http:// or https:// URL".to_string(),
        });
    }
    Ok(url.trim_end_matches('/').to_string())
}

fn parse_timeout(raw: &str) -> Result<Duration, ConfigError> {
    match raw.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
        _ => Err(ConfigError::InvalidValue {
            key: ENV_TIMEOUT_SECS,
            value: raw.to_string(),
            reason: "expected a positive number of seconds".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_nothing_set() {
        let config = ClientConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, ClientConfig::default());
        assert_eq!(config.token_key, "token");
        assert_eq!(config.timeout, None);
    }

    #[test]
    fn test_all_variables_read() {
        let config = ClientConfig::from_lookup(lookup(&[
            (ENV_API_URL, "https://forensics.example.org/"),
            (ENV_TOKEN_KEY, "session"),
            (ENV_LOGIN_PATH, "/api/users/login"),
            (ENV_TIMEOUT_SECS, "30"),
            (ENV_CREDENTIAL_STORE, "file"),
        ]))
        .unwrap();

        assert_eq!(config.base_url, "https://forensics.example.org");
        assert_eq!(config.token_key, "session");
        assert_eq!(config.login_path, "/api/users/login");
        assert_eq!(config.timeout, Some(Duration::from_secs(30)));
        assert_eq!(config.credential_store, StoreKind::File);
    }

    #[test]
    fn test_blank_values_ignored() {
        let config =
            ClientConfig::from_lookup(lookup(&[(ENV_API_URL, "  "), (ENV_TIMEOUT_SECS, "")]))
                .unwrap();
        assert_eq!(config.base_url, DEFAULT_API_URL);
        assert_eq!(config.timeout, None);
    }

    #[test]
    fn test_invalid_url_rejected() {
        let err = ClientConfig::from_lookup(lookup(&[(ENV_API_URL, "forensics.example.org")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key: ENV_API_URL, .. }));
    }

    #[test]
    fn test_invalid_timeout_rejected() {
        for bad in ["0", "-5", "soon"] {
            let err = ClientConfig::from_lookup(lookup(&[(ENV_TIMEOUT_SECS, bad)])).unwrap_err();
            assert!(matches!(err, ConfigError::InvalidValue { key: ENV_TIMEOUT_SECS, .. }));
        }
    }

    #[test]
    fn test_invalid_store_rejected() {
        let err =
            ClientConfig::from_lookup(lookup(&[(ENV_CREDENTIAL_STORE, "cloud")])).unwrap_err();
        assert!(err.to_string().contains(ENV_CREDENTIAL_STORE));
    }
}
