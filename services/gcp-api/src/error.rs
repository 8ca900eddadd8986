//! Errors returned by the GCP API clients

use thiserror::Error;

/// Result alias for GCP API operations
pub type Result<T> = std::result::Result<T, GcpApiError>;

/// HTTP status codes treated as transient by the retry loop
const RETRYABLE_STATUS_CODES: [u16; 6] = [408, 429, 500, 502, 503, 504];

/// Errors that can occur while talking to a Google API
#[derive(Debug, Error)]
pub enum GcpApiError {
    /// No usable access token
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Request never produced an HTTP response
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// API answered with a non-success status
    #[error("API returned {status}: {body}")]
    Http { status: u16, body: String },

    /// Response body could not be decoded
    #[error("Failed to decode response: {0}")]
    Decode(String),

    /// Client or request was built with invalid arguments
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl GcpApiError {
    /// Whether retrying the same request may succeed.
    ///
    /// Transport errors count when the connection failed or the response
    /// body was cut short.
    pub fn is_retryable(&self) -> bool {
        match self {
            GcpApiError::Transport(e) => {
                e.is_timeout() || e.is_connect() || e.is_request() || e.is_body() || e.is_decode()
            }
            GcpApiError::Http { status, .. } => RETRYABLE_STATUS_CODES.contains(status),
            GcpApiError::Auth(_) | GcpApiError::Decode(_) | GcpApiError::InvalidRequest(_) => {
                false
            }
        }
    }

    /// HTTP status code, if the API answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            GcpApiError::Http { status, .. } => Some(*status),
            GcpApiError::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for GcpApiError {
    fn from(err: serde_json::Error) -> Self {
        GcpApiError::Decode(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn http(status: u16) -> GcpApiError {
        GcpApiError::Http {
            status,
            body: String::new(),
        }
    }

    #[test]
    fn test_server_errors_are_retryable() {
        for status in [429, 500, 502, 503, 504] {
            assert!(http(status).is_retryable(), "{} should be retryable", status);
        }
    }

    #[test]
    fn test_client_errors_are_not_retryable() {
        for status in [400, 401, 403, 404, 409] {
            assert!(!http(status).is_retryable(), "{} should not be retryable", status);
        }
        assert!(!GcpApiError::Auth("no token".to_string()).is_retryable());
        assert!(!GcpApiError::Decode("bad json".to_string()).is_retryable());
    }

    #[test]
    fn test_status_accessor() {
        assert_eq!(http(503).status(), Some(503));
        assert_eq!(GcpApiError::InvalidRequest("x".to_string()).status(), None);
    }
}
