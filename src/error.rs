use std::time::Duration;

use thiserror::Error;

/// Failure taxonomy shared by both API clients.
///
/// `Auth` aborts the whole run. `RateLimited` and `Transient` are retried
/// with backoff and degrade to a per-entity failure once attempts are
/// exhausted. `Validation` and `NotFound` are never retried.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("rate limited")]
    RateLimited { retry_after: Option<Duration> },

    #[error("transient network error: {0}")]
    Transient(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),
}

impl ApiError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, ApiError::RateLimited { .. } | ApiError::Transient(_))
    }

    /// Classify a non-success HTTP response into the taxonomy.
    pub fn from_status(status: reqwest::StatusCode, context: &str, retry_after: Option<Duration>) -> Self {
        match status.as_u16() {
            401 | 403 => ApiError::Auth(context.to_string()),
            404 => ApiError::NotFound(context.to_string()),
            429 => ApiError::RateLimited { retry_after },
            400 | 422 => ApiError::Validation(context.to_string()),
            _ => ApiError::Transient(format!("{context}: HTTP {status}")),
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            // Unexpected payload shape from the API is a validation failure,
            // not something a retry will fix.
            ApiError::Validation(format!("unexpected response shape: {err}"))
        } else {
            ApiError::Transient(err.to_string())
        }
    }
}
