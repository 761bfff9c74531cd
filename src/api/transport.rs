//! HTTP transport seam.
//!
//! `ApiClient` builds a fully-resolved [`OutgoingRequest`] (URL, headers,
//! body) and hands it to a [`Transport`]. Production uses reqwest; tests plug
//! in a recording fake.

use std::time::Duration;

use reqwest::header::HeaderMap;
use reqwest::multipart;
use reqwest::{Client, ClientBuilder};
use thiserror::Error;

use super::types::{FormPart, Method, MultipartForm, RequestBody};

const DEFAULT_FILE_MIME: &str = "application/octet-stream";

/// Failure before any HTTP status was received.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("{0}")]
    Other(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout
        } else if err.is_connect() {
            TransportError::Connect(err.to_string())
        } else if err.is_builder() {
            TransportError::InvalidRequest(err.to_string())
        } else {
            TransportError::Other(err.to_string())
        }
    }
}

/// A request ready for the wire.
#[derive(Debug, Clone)]
pub struct OutgoingRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<RequestBody>,
    pub timeout: Option<Duration>,
}

/// Whatever the server answered, before any interpretation.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

/// Sends one request and returns the raw response.
///
/// Any HTTP status (including 4xx/5xx) is a successful dispatch; only a
/// missing response is an error.
#[allow(async_fn_in_trait)]
pub trait Transport {
    async fn dispatch(&self, request: OutgoingRequest) -> Result<RawResponse, TransportError>;
}

impl<T: Transport> Transport for &T {
    async fn dispatch(&self, request: OutgoingRequest) -> Result<RawResponse, TransportError> {
        (**self).dispatch(request).await
    }
}

/// reqwest-backed transport (rustls, JSON + multipart).
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
    timeout: Option<Duration>,
}

impl ReqwestTransport {
    /// Build a transport. `timeout` applies to every request; `None` means
    /// requests may wait indefinitely.
    pub fn new(timeout: Option<Duration>) -> Self {
        Self::from_builder(Client::builder(), timeout)
    }

    /// Wrap a preconfigured client. Its own timeout, if any, is not visible
    /// through [`ReqwestTransport::timeout`].
    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            timeout: None,
        }
    }

    /// Client-wide timeout actually in effect.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    fn from_builder(mut builder: ClientBuilder, timeout: Option<Duration>) -> Self {
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        match builder.build() {
            Ok(client) => Self { client, timeout },
            Err(e) => {
                log::warn!(
                    "Failed to build HTTP client ({}), falling back to defaults without timeout",
                    e
                );
                Self::with_client(Client::new())
            }
        }
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new(None)
    }
}

impl Transport for ReqwestTransport {
    async fn dispatch(&self, request: OutgoingRequest) -> Result<RawResponse, TransportError> {
        let mut builder = self
            .client
            .request(request.method.into(), &request.url)
            .headers(request.headers);

        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }

        builder = match request.body {
            None => builder,
            Some(RequestBody::Json(value)) => builder.json(&value),
            Some(RequestBody::Multipart(form)) => builder.multipart(to_reqwest_form(form)?),
        };

        let resp = builder.send().await?;
        let status = resp.status().as_u16();
        let headers = resp.headers().clone();
        // A status line was received; a broken body must not hide it.
        let body = match resp.bytes().await {
            Ok(bytes) => bytes.to_vec(),
            Err(e) => {
                log::debug!("Failed to read {} response body from {}: {}", status, request.url, e);
                Vec::new()
            }
        };

        Ok(RawResponse {
            status,
            headers,
            body,
        })
    }
}

fn to_reqwest_form(form: MultipartForm) -> Result<multipart::Form, TransportError> {
    let mut out = multipart::Form::new();
    for part in form.into_parts() {
        out = match part {
            FormPart::Text { name, value } => out.text(name, value),
            FormPart::File {
                name,
                file_name,
                content_type,
                bytes,
            } => {
                let mime = content_type.as_deref().unwrap_or(DEFAULT_FILE_MIME);
                let part = multipart::Part::bytes(bytes)
                    .file_name(file_name)
                    .mime_str(mime)
                    .map_err(|e| TransportError::InvalidRequest(format!("bad MIME type {}: {}", mime, e)))?;
                out.part(name, part)
            }
        };
    }
    Ok(out)
}
