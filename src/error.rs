use std::time::Duration;
use thiserror::Error;

/// Error taxonomy for the resolution engine.
///
/// Per-source and per-backend errors are contained at their boundary and
/// turned into failed attempts; only configuration problems propagate out
/// of a resolution call.
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors (permanent, propagate to the caller)
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid input: {field} - {reason}")]
    InvalidInput { field: String, reason: String },

    // Input that cannot be classified even as a title query
    #[error("Invalid identifier: {reason}")]
    InvalidIdentifier { reason: String },

    // Network errors (transient - should retry)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Source {source_name} transient failure: {reason}")]
    TransientSource { source_name: String, reason: String },

    #[error("Timeout after {timeout:?}")]
    Timeout { timeout: Duration },

    #[error("Rate limit exceeded: retry after {retry_after:?}")]
    RateLimitExceeded { retry_after: Duration },

    // Source errors that will not improve on retry
    #[error("Source {source_name} permanent failure: HTTP {status}")]
    PermanentSource { source_name: String, status: u16 },

    // The source answered but holds nothing usable for this article
    #[error("Source {source_name} returned no usable content")]
    NoContent { source_name: String },

    // PDF pipeline fed something that is not a PDF
    #[error("Extraction error: {reason}")]
    Extraction { reason: String },

    // Response body could not be interpreted
    #[error("Parse error in {context}: {message}")]
    Parse { context: String, message: String },

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error categorization for retry strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Permanent errors - should not retry
    Permanent,
    /// Transient errors - safe to retry
    Transient,
    /// Rate limited - retry with backoff
    RateLimited,
}

impl Error {
    /// Categorize error for retry logic
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Config(_)
            | Error::InvalidInput { .. }
            | Error::InvalidIdentifier { .. }
            | Error::PermanentSource { .. }
            | Error::NoContent { .. }
            | Error::Extraction { .. }
            | Error::Parse { .. }
            | Error::Serde(_) => ErrorCategory::Permanent,

            Error::RateLimitExceeded { .. } => ErrorCategory::RateLimited,

            Error::Http(_)
            | Error::TransientSource { .. }
            | Error::Timeout { .. }
            | Error::Io(_) => ErrorCategory::Transient,
        }
    }

    /// Check if error is retryable
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Transient | ErrorCategory::RateLimited
        )
    }

    /// Get suggested retry delay for rate limited errors
    #[must_use]
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Error::RateLimitExceeded { retry_after } => Some(*retry_after),
            _ => None,
        }
    }

    /// Classify an HTTP status code from a source into an engine error.
    ///
    /// 429 is rate limited, other 4xx are permanent, everything else
    /// (5xx and oddballs) is transient.
    #[must_use]
    pub fn from_status(source_name: &str, status: u16) -> Self {
        match status {
            429 => Error::RateLimitExceeded {
                retry_after: Duration::from_secs(60),
            },
            400..=499 => Error::PermanentSource {
                source_name: source_name.to_string(),
                status,
            },
            _ => Error::TransientSource {
                source_name: source_name.to_string(),
                reason: format!("HTTP {status}"),
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permanent_errors_not_retryable() {
        let err = Error::PermanentSource {
            source_name: "publisher".to_string(),
            status: 404,
        };
        assert_eq!(err.category(), ErrorCategory::Permanent);
        assert!(!err.is_retryable());
        assert_eq!(err.to_string(), "Source publisher permanent failure: HTTP 404");

        let err = Error::NoContent {
            source_name: "europe_pmc".to_string(),
        };
        assert_eq!(err.category(), ErrorCategory::Permanent);
        assert!(!err.is_retryable());

        let err = Error::Extraction {
            reason: "not a PDF".to_string(),
        };
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_transient_errors_retryable() {
        let err = Error::TransientSource {
            source_name: "europe_pmc".to_string(),
            reason: "HTTP 503".to_string(),
        };
        assert_eq!(err.category(), ErrorCategory::Transient);
        assert!(err.is_retryable());
        assert_eq!(
            err.to_string(),
            "Source europe_pmc transient failure: HTTP 503"
        );

        let err = Error::Timeout {
            timeout: Duration::from_secs(15),
        };
        assert!(err.is_retryable());
    }

    #[test]
    fn test_status_classification() {
        assert!(matches!(
            Error::from_status("pmc", 429),
            Error::RateLimitExceeded { .. }
        ));
        assert!(matches!(
            Error::from_status("pmc", 403),
            Error::PermanentSource { status: 403, .. }
        ));
        assert!(matches!(
            Error::from_status("pmc", 502),
            Error::TransientSource { .. }
        ));
    }

    #[test]
    fn test_rate_limit_retry_after() {
        let err = Error::RateLimitExceeded {
            retry_after: Duration::from_secs(60),
        };
        assert_eq!(err.retry_after(), Some(Duration::from_secs(60)));
        assert_eq!(err.category(), ErrorCategory::RateLimited);
    }
}
