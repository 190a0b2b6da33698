//! Recognizer error types.

use thiserror::Error;

pub type RecognizerResult<T> = Result<T, RecognizerError>;

/// Retry classification of a recognizer failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Timeout, rate limit, or server-side hiccup; worth retrying
    Transient,
    /// The request itself is bad; retrying cannot help
    Permanent,
}

#[derive(Debug, Error)]
pub enum RecognizerError {
    #[error("Recognizer unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Rate limited by recognizer")]
    RateLimited { retry_after_ms: Option<u64> },

    #[error("Timeout after {0} seconds")]
    Timeout(u64),

    #[error("Recognizer returned {status}: {message}")]
    RequestFailed { status: u16, message: String },

    #[error("Media rejected: {0}")]
    Rejected(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl RecognizerError {
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::ServiceUnavailable(msg.into())
    }

    pub fn rejected(msg: impl Into<String>) -> Self {
        Self::Rejected(msg.into())
    }

    /// Map a non-success HTTP status to an error.
    pub fn from_status(status: u16, message: impl Into<String>, retry_after_ms: Option<u64>) -> Self {
        match status {
            429 => Self::RateLimited { retry_after_ms },
            503 => Self::ServiceUnavailable(message.into()),
            _ => Self::RequestFailed {
                status,
                message: message.into(),
            },
        }
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            RecognizerError::ServiceUnavailable(_)
            | RecognizerError::RateLimited { .. }
            | RecognizerError::Timeout(_)
            | RecognizerError::Network(_) => ErrorClass::Transient,
            RecognizerError::RequestFailed { status, .. } if *status >= 500 || *status == 408 => {
                ErrorClass::Transient
            }
            _ => ErrorClass::Permanent,
        }
    }

    pub fn is_transient(&self) -> bool {
        self.class() == ErrorClass::Transient
    }

    /// Server-requested delay before the next attempt, if any.
    pub fn retry_after_ms(&self) -> Option<u64> {
        match self {
            RecognizerError::RateLimited { retry_after_ms } => *retry_after_ms,
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert!(RecognizerError::from_status(429, "slow down", None).is_transient());
        assert!(RecognizerError::from_status(503, "down", None).is_transient());
        assert!(RecognizerError::from_status(502, "bad gateway", None).is_transient());
        assert!(!RecognizerError::from_status(400, "bad media", None).is_transient());
        assert!(!RecognizerError::from_status(404, "no such object", None).is_transient());
    }

    #[test]
    fn test_rejected_is_permanent() {
        assert_eq!(RecognizerError::rejected("corrupt").class(), ErrorClass::Permanent);
        assert_eq!(
            RecognizerError::InvalidResponse("garbage".into()).class(),
            ErrorClass::Permanent
        );
    }

    #[test]
    fn test_retry_after() {
        let err = RecognizerError::from_status(429, "", Some(1500));
        assert_eq!(err.retry_after_ms(), Some(1500));
        assert_eq!(RecognizerError::Timeout(30).retry_after_ms(), None);
    }
}
