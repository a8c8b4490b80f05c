//! Error types for the marketplace API client.
//!
//! # Design
//! Parsing-level failures (`CredentialError`, `UnparseableDate`) are recovered
//! close to where they happen: callers treat them as "not authenticated" or
//! "field absent". Transport and backend failures are never recovered here;
//! they reach the caller through `ApiError` with their payload intact.

use thiserror::Error;

/// Errors returned by `ApiClient` operations.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request never produced a response.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The backend answered with a non-2xx status. Status and body are passed
    /// through untouched.
    #[error("HTTP {status}: {body}")]
    Backend { status: u16, body: String },

    /// The response body could not be deserialized into the expected type.
    #[error("deserialization failed: {0}")]
    Deserialization(String),

    /// The request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    Serialization(String),

    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("invalid configuration: {0}")]
    Configuration(String),
}

impl ApiError {
    /// HTTP status of a backend rejection, if this is one.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Backend { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Network-level failure: nothing came back from the backend.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// Problems with a bearer credential.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CredentialError {
    /// Not three segments, or the payload is not base64url-encoded JSON.
    #[error("malformed token: {0}")]
    Malformed(String),

    /// The token decoded but its `exp` is not in the future. `expires_at` is
    /// in epoch seconds, or `None` when the credential was missing or could
    /// not be decoded at all.
    #[error("credential expired")]
    Expired { expires_at: Option<i64> },
}

/// Session persistence failure. Reads never produce this.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session storage failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("session encoding failed: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// None of the accepted date formats matched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unrecognized date format: {0:?}")]
pub struct UnparseableDate(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_error_displays_status_and_body() {
        let err = ApiError::Backend {
            status: 401,
            body: r#"{"detail":"Not authenticated"}"#.to_string(),
        };
        assert_eq!(err.to_string(), r#"HTTP 401: {"detail":"Not authenticated"}"#);
        assert_eq!(err.status(), Some(401));
    }

    #[test]
    fn transport_error_is_transparent() {
        let err: ApiError = TransportError::Timeout("read".to_string()).into();
        assert_eq!(err.to_string(), "request timed out: read");
        assert_eq!(err.status(), None);
    }
}
