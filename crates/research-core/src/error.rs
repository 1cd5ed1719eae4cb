//! Error types for research-core

use std::time::Duration;
use thiserror::Error;

/// Result type alias for research-core
pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy shared by every stage of the pipeline
///
/// Only [`Error::Validation`] ever reaches the caller of a research request.
/// Everything else is captured by the branch or synthesizer that observed it
/// and turned into a `failed` or `degraded` report.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// The request did not yield a usable ticker
    #[error("Validation failed: {0}")]
    Validation(String),

    /// A data provider, search tool or reasoning service failed
    #[error("{provider} failed: {message}")]
    Upstream {
        /// Name of the failing collaborator (e.g. "fmp", "tavily", "openai")
        provider: String,
        /// Human-readable cause
        message: String,
    },

    /// An external call exceeded its deadline
    #[error("{operation} timed out after {}ms", .after.as_millis())]
    Timeout {
        /// What was being waited on
        operation: String,
        /// The deadline that elapsed
        after: Duration,
    },

    /// Reasoning-service output did not match the expected shape
    #[error("Failed to parse {expected}: {message}")]
    Parse {
        /// Name of the expected payload
        expected: String,
        /// Why parsing failed
        message: String,
    },

    /// The tool loop used up its round-trip budget
    #[error("Tool loop exceeded its bound of {0} round trips")]
    LoopBoundExceeded(usize),

    /// Malformed input handed to a pure computation
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Generic error message
    #[error("{0}")]
    Generic(String),
}

impl Error {
    /// Create an upstream error for the named collaborator
    pub fn upstream(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Upstream {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create a parse error for the named payload
    pub fn parse(expected: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            expected: expected.into(),
            message: message.into(),
        }
    }

    /// Create a timeout error
    pub fn timeout(operation: impl Into<String>, after: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            after,
        }
    }

    /// Whether this error came from outside the process (upstream or timeout)
    pub fn is_upstream(&self) -> bool {
        matches!(self, Self::Upstream { .. } | Self::Timeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::upstream("fmp", "HTTP 500");
        assert_eq!(err.to_string(), "fmp failed: HTTP 500");

        let err = Error::timeout("price history fetch", Duration::from_secs(10));
        assert_eq!(err.to_string(), "price history fetch timed out after 10000ms");

        let err = Error::LoopBoundExceeded(4);
        assert_eq!(err.to_string(), "Tool loop exceeded its bound of 4 round trips");
    }

    #[test]
    fn test_is_upstream() {
        assert!(Error::upstream("tavily", "down").is_upstream());
        assert!(Error::timeout("search", Duration::from_millis(5)).is_upstream());
        assert!(!Error::parse("news report", "missing field").is_upstream());
        assert!(!Error::Validation("no ticker".to_string()).is_upstream());
    }
}
