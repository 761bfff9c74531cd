//! Session lifecycle: login, logout, and token claims for display.
//!
//! This is the only writer of the stored credential. The API client reads
//! it on every request but never changes it.

use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::api::{ApiClient, ApiError, Transport, DEFAULT_TOKEN_KEY};
use crate::config::{ClientConfig, DEFAULT_LOGIN_PATH};
use crate::storage::{CredentialStore, StorageError};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("Credential storage failed: {0}")]
    Storage(#[from] StorageError),
    #[error("Login response did not include a token")]
    MissingToken,
    #[error("Not logged in")]
    NotLoggedIn,
    #[error("Malformed session token: {0}")]
    InvalidToken(String),
}

/// Login request body.
#[derive(Debug, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Fields read from the token payload for local display only.
///
/// The payload is decoded without verifying the signature; never use these
/// values for access decisions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    pub user_id: Option<String>,
    pub role: Option<String>,
    /// `exp` claim, seconds since the Unix epoch.
    pub expires_at: Option<i64>,
}

pub struct SessionManager<S> {
    store: S,
    token_key: String,
    login_path: String,
}

impl<S: CredentialStore> SessionManager<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            token_key: DEFAULT_TOKEN_KEY.to_string(),
            login_path: DEFAULT_LOGIN_PATH.to_string(),
        }
    }

    pub fn from_config(config: &ClientConfig, store: S) -> Self {
        Self::new(store)
            .with_token_key(&config.token_key)
            .with_login_path(&config.login_path)
    }

    pub fn with_token_key(mut self, key: &str) -> Self {
        self.token_key = key.to_string();
        self
    }

    pub fn with_login_path(mut self, path: &str) -> Self {
        self.login_path = path.to_string();
        self
    }

    /// Authenticate against the backend and persist the issued token.
    ///
    /// Returns the decoded claims when the token carries a readable payload.
    /// Opaque tokens are stored all the same and yield `None`.
    pub async fn login<CS, T>(
        &self,
        client: &ApiClient<CS, T>,
        request: &LoginRequest,
    ) -> Result<Option<TokenClaims>, SessionError>
    where
        CS: CredentialStore,
        T: Transport,
    {
        log::info!("Logging in as {}", request.email);

        let resp = client.post(&self.login_path, request).await?;
        let token = resp
            .body
            .get("token")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(SessionError::MissingToken)?
            .to_string();

        self.store.set(&self.token_key, &token).await?;

        let claims = decode_claims(&token).ok();
        match claims.as_ref().and_then(|c| c.user_id.as_deref()) {
            Some(user_id) => log::info!("Login complete for user {}", user_id),
            None => log::info!("Login complete"),
        }
        Ok(claims)
    }

    /// Persist a token obtained elsewhere.
    pub async fn store_token(&self, token: &str) -> Result<(), SessionError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(SessionError::InvalidToken("token is empty".to_string()));
        }
        self.store.set(&self.token_key, token).await?;
        Ok(())
    }

    /// Remove the stored token. Idempotent.
    pub async fn logout(&self) -> Result<(), SessionError> {
        self.store.remove(&self.token_key).await?;
        log::info!("Logout complete");
        Ok(())
    }

    pub async fn current_token(&self) -> Result<Option<String>, SessionError> {
        Ok(self
            .store
            .get(&self.token_key)
            .await?
            .filter(|t| !t.trim().is_empty()))
    }

    pub async fn is_logged_in(&self) -> Result<bool, SessionError> {
        Ok(self.current_token().await?.is_some())
    }

    /// Claims of the stored token.
    pub async fn claims(&self) -> Result<TokenClaims, SessionError> {
        let token = self
            .current_token()
            .await?
            .ok_or(SessionError::NotLoggedIn)?;
        decode_claims(&token)
    }
}

/// Decode the payload segment of a signed-claims token without verifying it.
///
/// The user id is taken from the first of `id`, `userId`, `_id`, `sub`.
pub fn decode_claims(token: &str) -> Result<TokenClaims, SessionError> {
    let parts: Vec<&str> = token.trim().split('.').collect();
    if parts.len() != 3 {
        return Err(SessionError::InvalidToken(
            "expected three dot-separated segments".to_string(),
        ));
    }

    let payload = parts[1].trim_end_matches('=');
    let decoded = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|e| SessionError::InvalidToken(format!("payload is not base64url: {}", e)))?;

    let json: Value = serde_json::from_slice(&decoded)
        .map_err(|e| SessionError::InvalidToken(format!("payload is not JSON: {}", e)))?;

    let user_id = ["id", "userId", "_id", "sub"]
        .iter()
        .find_map(|field| scalar_to_string(json.get(field)?));

    Ok(TokenClaims {
        user_id,
        role: json.get("role").and_then(scalar_to_string),
        expires_at: json.get("exp").and_then(Value::as_i64),
    })
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
