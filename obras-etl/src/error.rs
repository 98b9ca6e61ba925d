//! Error types for obras-etl

use std::time::Duration;
use thiserror::Error;

/// Upstream fetch failure for one page request
#[derive(Debug, Error)]
pub enum FetchError {
    /// Connection, timeout or body-read failure
    #[error("Transport error on page {page}: {message}")]
    Transport { page: u32, message: String },

    /// HTTP 429
    #[error("Rate limited on page {page}")]
    RateLimited { page: u32 },

    /// Any other non-success HTTP status
    #[error("Upstream returned {status} on page {page}: {body}")]
    Status { page: u32, status: u16, body: String },

    /// Response body is not the expected JSON shape
    #[error("Cannot decode page {page}: {message}")]
    Decode { page: u32, message: String },

    /// Client could not be constructed
    #[error("HTTP client setup failed: {0}")]
    Setup(String),
}

impl FetchError {
    /// Backoff before retrying the same page, or `None` if fatal
    ///
    /// Rate limiting waits `rate_limit_backoff`; transport errors and
    /// server-side (5xx) statuses wait `transport_backoff`.
    pub fn retry_delay(&self, rate_limit_backoff: Duration, transport_backoff: Duration) -> Option<Duration> {
        match self {
            FetchError::RateLimited { .. } => Some(rate_limit_backoff),
            FetchError::Transport { .. } => Some(transport_backoff),
            FetchError::Status { status, .. } if *status >= 500 => Some(transport_backoff),
            _ => None,
        }
    }
}

/// Pipeline-level failure; aborts the run with a non-zero exit
#[derive(Debug, Error)]
pub enum EtlError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Store(#[from] obras_common::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    const RATE: Duration = Duration::from_secs(60);
    const TRANSPORT: Duration = Duration::from_secs(30);

    #[test]
    fn test_rate_limit_uses_long_backoff() {
        let err = FetchError::RateLimited { page: 2 };
        assert_eq!(err.retry_delay(RATE, TRANSPORT), Some(RATE));
    }

    #[test]
    fn test_server_errors_are_transient() {
        let err = FetchError::Status { page: 0, status: 503, body: String::new() };
        assert_eq!(err.retry_delay(RATE, TRANSPORT), Some(TRANSPORT));

        let err = FetchError::Transport { page: 0, message: "timed out".into() };
        assert_eq!(err.retry_delay(RATE, TRANSPORT), Some(TRANSPORT));
    }

    #[test]
    fn test_client_errors_and_bad_bodies_are_fatal() {
        let err = FetchError::Status { page: 0, status: 404, body: "not found".into() };
        assert_eq!(err.retry_delay(RATE, TRANSPORT), None);

        let err = FetchError::Decode { page: 1, message: "expected object".into() };
        assert_eq!(err.retry_delay(RATE, TRANSPORT), None);
    }
}
