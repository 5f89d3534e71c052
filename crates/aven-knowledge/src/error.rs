//! Retrieval error taxonomy.
//!
//! Callers treat every variant the same way (fall back to canned answers);
//! the distinction exists for logging.

use std::time::Duration;

use aven_core::error::AvenError;

/// Errors from a knowledge retrieval call.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RetrievalError {
    #[error("retrieval timed out after {}ms", .0.as_millis())]
    Timeout(Duration),
    #[error("retrieval service unavailable: {0}")]
    Unavailable(String),
    #[error("malformed retrieval response: {0}")]
    MalformedResponse(String),
}

impl RetrievalError {
    /// Short label for structured log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            RetrievalError::Timeout(_) => "timeout",
            RetrievalError::Unavailable(_) => "unavailable",
            RetrievalError::MalformedResponse(_) => "malformed_response",
        }
    }
}

impl From<reqwest::Error> for RetrievalError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            RetrievalError::MalformedResponse(err.to_string())
        } else {
            RetrievalError::Unavailable(err.to_string())
        }
    }
}

impl From<serde_json::Error> for RetrievalError {
    fn from(err: serde_json::Error) -> Self {
        RetrievalError::MalformedResponse(err.to_string())
    }
}

impl From<RetrievalError> for AvenError {
    fn from(err: RetrievalError) -> Self {
        AvenError::Retrieval(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retrieval_error_display() {
        let err = RetrievalError::Timeout(Duration::from_secs(10));
        assert_eq!(err.to_string(), "retrieval timed out after 10000ms");

        let err = RetrievalError::Unavailable("connection refused".to_string());
        assert_eq!(
            err.to_string(),
            "retrieval service unavailable: connection refused"
        );

        let err = RetrievalError::MalformedResponse("missing field `results`".to_string());
        assert_eq!(
            err.to_string(),
            "malformed retrieval response: missing field `results`"
        );
    }

    #[test]
    fn test_kind_labels() {
        assert_eq!(RetrievalError::Timeout(Duration::ZERO).kind(), "timeout");
        assert_eq!(
            RetrievalError::Unavailable(String::new()).kind(),
            "unavailable"
        );
        assert_eq!(
            RetrievalError::MalformedResponse(String::new()).kind(),
            "malformed_response"
        );
    }

    #[test]
    fn test_json_error_is_malformed() {
        let err: RetrievalError = serde_json::from_str::<serde_json::Value>("not json")
            .unwrap_err()
            .into();
        assert!(matches!(err, RetrievalError::MalformedResponse(_)));
    }

    #[test]
    fn test_into_aven_error() {
        let err: AvenError = RetrievalError::Unavailable("down".to_string()).into();
        assert!(matches!(err, AvenError::Retrieval(_)));
        assert!(err.to_string().contains("down"));
    }
}
