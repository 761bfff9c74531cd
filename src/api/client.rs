//! HTTP client with per-request bearer token injection.
//!
//! Every call reads the session token from the injected [`CredentialStore`]
//! right before dispatch and attaches it as `Authorization: Bearer <token>`.
//! The token is never cached between calls, and the client never writes to
//! the store. Backend responses and errors are passed through untouched.

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use serde::Serialize;

use super::error::ApiError;
use super::transport::{OutgoingRequest, ReqwestTransport, Transport};
use super::types::{parse_body, ApiRequest, ApiResponse, Method, RequestBody};
use crate::config::ClientConfig;
use crate::storage::CredentialStore;

/// Storage key the session token is kept under.
pub const DEFAULT_TOKEN_KEY: &str = "token";

/// Single request-dispatch surface for all backend I/O.
///
/// Stateless across calls: the only state it consults (the stored token) is
/// owned by the store and managed by the session layer.
pub struct ApiClient<S, T = ReqwestTransport> {
    transport: T,
    base_url: String,
    token_key: String,
    store: S,
}

impl<S: CredentialStore> ApiClient<S, ReqwestTransport> {
    /// Create a client for the given base URL using the reqwest transport
    /// with no timeout.
    pub fn new(base_url: &str, store: S) -> Self {
        Self::with_transport(base_url, store, ReqwestTransport::default())
    }

    pub fn from_config(config: &ClientConfig, store: S) -> Self {
        Self::with_transport(&config.base_url, store, ReqwestTransport::new(config.timeout))
            .with_token_key(&config.token_key)
    }
}

impl<S: CredentialStore, T: Transport> ApiClient<S, T> {
    pub fn with_transport(base_url: &str, store: S, transport: T) -> Self {
        Self {
            transport,
            base_url: base_url.trim_end_matches('/').to_string(),
            token_key: DEFAULT_TOKEN_KEY.to_string(),
            store,
        }
    }

    /// Read the token from a different storage key.
    pub fn with_token_key(mut self, key: &str) -> Self {
        self.token_key = key.to_string();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn token_key(&self) -> &str {
        &self.token_key
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Dispatch one request against a backend-relative path.
    ///
    /// `extra_headers` override the defaults, except `Authorization`, which
    /// is always derived from the stored credential.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<RequestBody>,
        extra_headers: Option<HeaderMap>,
    ) -> Result<ApiResponse, ApiError> {
        let mut request = ApiRequest::new(method, path);
        request.body = body;
        if let Some(headers) = extra_headers {
            request = request.headers(headers);
        }
        self.send(request).await
    }

    /// Dispatch a request in builder form.
    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        // Suspension point 1: credential lookup.
        let token = self.stored_token().await;

        let url = self.resolve_url(&request.path);
        let headers = build_headers(request.headers, request.body.as_ref(), token.as_deref());
        let authenticated = headers.contains_key(AUTHORIZATION);

        log::debug!(
            "{} {} (authenticated: {})",
            request.method,
            request.path,
            authenticated
        );

        // Suspension point 2: network round-trip.
        let raw = self
            .transport
            .dispatch(OutgoingRequest {
                method: request.method,
                url,
                headers,
                body: request.body,
                timeout: request.timeout,
            })
            .await
            .map_err(|e| {
                log::debug!("{} {} failed without response: {}", request.method, request.path, e);
                ApiError::from(e)
            })?;

        let body = parse_body(&raw.body);
        if (200..300).contains(&raw.status) {
            Ok(ApiResponse {
                status: raw.status,
                headers: raw.headers,
                body,
            })
        } else {
            log::debug!("{} {} rejected with {}", request.method, request.path, raw.status);
            Err(ApiError::Status {
                status: raw.status,
                body,
            })
        }
    }

    pub async fn get(&self, path: &str) -> Result<ApiResponse, ApiError> {
        self.request(Method::Get, path, None, None).await
    }

    pub async fn delete(&self, path: &str) -> Result<ApiResponse, ApiError> {
        self.request(Method::Delete, path, None, None).await
    }

    pub async fn post<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<ApiResponse, ApiError> {
        self.request(Method::Post, path, Some(RequestBody::json(body)?), None)
            .await
    }

    pub async fn put<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<ApiResponse, ApiError> {
        self.request(Method::Put, path, Some(RequestBody::json(body)?), None)
            .await
    }

    pub async fn patch<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<ApiResponse, ApiError> {
        self.request(Method::Patch, path, Some(RequestBody::json(body)?), None)
            .await
    }

    /// Current token, or `None` when absent, blank, or unreadable.
    ///
    /// A storage failure is not fatal: the request goes out unauthenticated
    /// and the backend rejects it if it needs a session.
    async fn stored_token(&self) -> Option<String> {
        match self.store.get(&self.token_key).await {
            Ok(Some(token)) if !token.trim().is_empty() => Some(token),
            Ok(_) => None,
            Err(e) => {
                log::warn!("Credential read failed, sending request without token: {}", e);
                None
            }
        }
    }

    fn resolve_url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }
}

fn build_headers(extra: HeaderMap, body: Option<&RequestBody>, token: Option<&str>) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    headers.extend(extra);

    // The multipart boundary must come from the transport.
    if matches!(body, Some(RequestBody::Multipart(_))) {
        headers.remove(CONTENT_TYPE);
    }

    headers.remove(AUTHORIZATION);
    // Surrounding whitespace (e.g. a trailing newline from a pasted token)
    // is not part of the credential.
    if let Some(token) = token {
        match HeaderValue::from_str(&format!("Bearer {}", token.trim())) {
            Ok(mut value) => {
                value.set_sensitive(true);
                headers.insert(AUTHORIZATION, value);
            }
            Err(_) => log::warn!("Stored token is not a valid header value, sending without it"),
        }
    }

    headers
}
