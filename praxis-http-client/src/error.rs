//! HTTP client error types.

use std::time::Duration;
use thiserror::Error;

/// Result type for HTTP client operations.
pub type Result<T> = std::result::Result<T, HttpClientError>;

/// Whether a failure is worth another attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Timeouts, connection failures, 408, 429 and 5xx
    Retryable,
    /// Everything else, including other 4xx responses
    Permanent,
}

/// Returned by a breaker that is not letting calls through.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Circuit breaker for {target} is open")]
pub struct CircuitOpenError {
    pub target: String,
}

/// HTTP client errors.
#[derive(Debug, Error)]
pub enum HttpClientError {
    /// The target's circuit breaker rejected the call without a network attempt.
    #[error("Circuit breaker for {target} is open, request rejected")]
    CircuitOpen { target: String },

    /// An attempt did not finish within the configured timeout.
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// Connection could not be established or was reset.
    #[error("Connection error: {0}")]
    Connection(String),

    /// The server answered with a non-success status.
    #[error("Response error: {status} - {message}")]
    Response { status: u16, message: String },

    /// Every attempt failed with a retryable error.
    #[error("Request failed after {attempts} attempts: {last}")]
    RetryExhausted {
        attempts: u32,
        last: Box<HttpClientError>,
    },

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(String),

    /// Underlying HTTP client error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl HttpClientError {
    /// Classify the failure for the retry decision.
    pub fn classify(&self) -> ErrorClass {
        let retryable = match self {
            Self::Timeout(_) | Self::Connection(_) => true,
            Self::Response { status, .. } => is_retryable_status(*status),
            Self::Http(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || e.status().is_some_and(|s| is_retryable_status(s.as_u16()))
            }
            _ => false,
        };

        if retryable {
            ErrorClass::Retryable
        } else {
            ErrorClass::Permanent
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.classify() == ErrorClass::Retryable
    }

    /// Whether this attempt outcome means the dependency is unhealthy.
    ///
    /// A 4xx answer (other than 408/429) proves the target is up and
    /// responding, so it does not count against the circuit breaker.
    pub fn is_dependency_failure(&self) -> bool {
        match self.status_code() {
            Some(status) if (400..500).contains(&status) => is_retryable_status(status),
            _ => !matches!(
                self,
                Self::InvalidUrl(_) | Self::InvalidHeader(_) | Self::Json(_) | Self::CircuitOpen { .. }
            ),
        }
    }

    pub fn is_circuit_open(&self) -> bool {
        matches!(self, Self::CircuitOpen { .. })
    }

    /// Check if this is a timeout error, looking through `RetryExhausted`.
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Timeout(_) => true,
            Self::Http(e) => e.is_timeout(),
            Self::RetryExhausted { last, .. } => last.is_timeout(),
            _ => false,
        }
    }

    /// Get the HTTP status code, looking through `RetryExhausted`.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Response { status, .. } => Some(*status),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            Self::RetryExhausted { last, .. } => last.status_code(),
            _ => None,
        }
    }

    /// Map a transport error from reqwest onto our taxonomy.
    pub(crate) fn from_transport(error: reqwest::Error, timeout: Duration) -> Self {
        if error.is_timeout() {
            Self::Timeout(timeout)
        } else if error.is_connect() {
            Self::Connection(error.to_string())
        } else {
            Self::Http(error)
        }
    }
}

impl From<CircuitOpenError> for HttpClientError {
    fn from(error: CircuitOpenError) -> Self {
        Self::CircuitOpen {
            target: error.target,
        }
    }
}

impl From<serde_json::Error> for HttpClientError {
    fn from(error: serde_json::Error) -> Self {
        Self::Json(error.to_string())
    }
}

impl From<url::ParseError> for HttpClientError {
    fn from(error: url::ParseError) -> Self {
        Self::InvalidUrl(error.to_string())
    }
}

fn is_retryable_status(status: u16) -> bool {
    status == 408 || status == 429 || (500..600).contains(&status)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(status: u16) -> HttpClientError {
        HttpClientError::Response {
            status,
            message: String::new(),
        }
    }

    #[test]
    fn test_classification() {
        assert_eq!(HttpClientError::Timeout(Duration::from_secs(1)).classify(), ErrorClass::Retryable);
        assert_eq!(HttpClientError::Connection("reset".into()).classify(), ErrorClass::Retryable);

        for status in [408, 429, 500, 502, 503, 504] {
            assert!(response(status).is_retryable(), "{status}");
        }
        for status in [400, 401, 403, 404, 409, 422] {
            assert_eq!(response(status).classify(), ErrorClass::Permanent, "{status}");
        }

        assert!(!HttpClientError::InvalidUrl("x".into()).is_retryable());
        assert!(!HttpClientError::CircuitOpen { target: "t".into() }.is_retryable());
    }

    #[test]
    fn test_dependency_failure() {
        assert!(response(503).is_dependency_failure());
        assert!(response(429).is_dependency_failure());
        assert!(!response(404).is_dependency_failure());
        assert!(HttpClientError::Timeout(Duration::from_secs(1)).is_dependency_failure());
        assert!(!HttpClientError::Json("eof".into()).is_dependency_failure());
    }

    #[test]
    fn test_exhausted_looks_through() {
        let err = HttpClientError::RetryExhausted {
            attempts: 3,
            last: Box::new(HttpClientError::Timeout(Duration::from_millis(5))),
        };
        assert!(err.is_timeout());
        assert!(!err.is_retryable());
        assert_eq!(err.to_string(), "Request failed after 3 attempts: Request timed out after 5ms");
    }
}
