//! Error shape surfaced by every API call.
//!
//! A backend rejection carries its status code and body verbatim. A transport
//! failure carries no status at all, so callers can tell "server said no"
//! apart from "server never answered".

use serde_json::Value;
use thiserror::Error;

use super::transport::TransportError;

/// Copy shown when the backend could not be reached.
pub const NETWORK_ERROR_MESSAGE: &str =
    "Unable to reach the server. Check your connection and try again.";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("No response from backend: {0}")]
    Transport(#[from] TransportError),

    #[error("Backend returned {status}{}", detail_suffix(.body))]
    Status { status: u16, body: Value },

    #[error("Failed to encode request body: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("Failed to decode response body: {0}")]
    Decode(#[source] serde_json::Error),
}

impl ApiError {
    /// HTTP status of a backend rejection. `None` for transport and codec failures.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Backend response body of a rejection, untouched.
    pub fn body(&self) -> Option<&Value> {
        match self {
            ApiError::Status { body, .. } => Some(body),
            _ => None,
        }
    }

    /// The backend's own explanation: its `message` field, else its `error` field.
    pub fn backend_message(&self) -> Option<&str> {
        self.body().and_then(extract_message)
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, ApiError::Transport(_))
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status_code() == Some(401)
    }

    /// Text suitable for showing to a user.
    ///
    /// Prefers the backend-provided message, then a connectivity message for
    /// transport failures, then `fallback`.
    pub fn user_message(&self, fallback: &str) -> String {
        if let Some(message) = self.backend_message() {
            return message.to_string();
        }
        if self.is_transport() {
            return NETWORK_ERROR_MESSAGE.to_string();
        }
        fallback.to_string()
    }
}

fn extract_message(body: &Value) -> Option<&str> {
    ["message", "error"]
        .iter()
        .filter_map(|field| body.get(field).and_then(Value::as_str))
        .find(|s| !s.is_empty())
}

fn detail_suffix(body: &Value) -> String {
    match extract_message(body) {
        Some(message) => format!(": {}", message),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rejection(status: u16, body: Value) -> ApiError {
        ApiError::Status { status, body }
    }

    #[test]
    fn test_status_error_exposes_status_and_body() {
        let err = rejection(400, json!({"message": "Invalid email"}));
        assert_eq!(err.status_code(), Some(400));
        assert_eq!(err.body(), Some(&json!({"message": "Invalid email"})));
        assert_eq!(err.backend_message(), Some("Invalid email"));
        assert_eq!(err.to_string(), "Backend returned 400: Invalid email");
    }

    #[test]
    fn test_error_field_used_when_message_missing() {
        let err = rejection(500, json!({"error": "database offline"}));
        assert_eq!(err.backend_message(), Some("database offline"));
    }

    #[test]
    fn test_non_object_body_has_no_message() {
        let err = rejection(502, json!("Bad Gateway"));
        assert_eq!(err.backend_message(), None);
        assert_eq!(err.user_message("Something went wrong"), "Something went wrong");
        assert_eq!(err.to_string(), "Backend returned 502");
    }

    #[test]
    fn test_transport_error_has_no_status() {
        let err = ApiError::from(TransportError::Connect("connection refused".into()));
        assert!(err.is_transport());
        assert_eq!(err.status_code(), None);
        assert_eq!(err.body(), None);
        assert_eq!(err.user_message("ignored"), NETWORK_ERROR_MESSAGE);
    }

    #[test]
    fn test_is_unauthorized() {
        assert!(rejection(401, json!({"message": "No token provided"})).is_unauthorized());
        assert!(!rejection(403, Value::Null).is_unauthorized());
    }
}
