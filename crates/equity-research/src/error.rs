//! Error types for equity research operations

use thiserror::Error;

/// Errors raised inside this crate's data clients and helpers
///
/// Crossing into the pipeline they become [`research_core::Error`], which is
/// what branches turn into `failed`/`degraded` reports.
#[derive(Debug, Error)]
pub enum ResearchError {
    /// Provider answered with an error payload or status
    #[error("{provider} API error: {message}")]
    ApiError {
        /// Provider name
        provider: String,
        /// Error details
        message: String,
    },

    /// Data not available for the requested symbol
    #[error("Data not available for {symbol}: {reason}")]
    DataUnavailable {
        /// Ticker that was queried
        symbol: String,
        /// Why nothing came back
        reason: String,
    },

    /// Rate limit exceeded for API
    #[error("Rate limit exceeded for {provider}")]
    RateLimitExceeded {
        /// Provider name
        provider: String,
    },

    /// Network or HTTP error
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Prompt template error
    #[error("Template error: {0}")]
    TemplateError(#[from] minijinja::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Error from the shared pipeline types
    #[error(transparent)]
    Core(#[from] research_core::Error),
}

/// Result type alias for equity research operations
pub type Result<T> = std::result::Result<T, ResearchError>;

impl ResearchError {
    /// Create an API error for the named provider
    pub fn api(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ApiError {
            provider: provider.into(),
            message: message.into(),
        }
    }
}

/// Convert ResearchError to research_core::Error
impl From<ResearchError> for research_core::Error {
    fn from(err: ResearchError) -> Self {
        use research_core::Error as CoreError;

        match err {
            ResearchError::Core(inner) => inner,
            ResearchError::ApiError { provider, message } => CoreError::upstream(provider, message),
            ResearchError::RateLimitExceeded { ref provider } => {
                CoreError::upstream(provider.clone(), err.to_string())
            }
            e @ (ResearchError::DataUnavailable { .. } | ResearchError::NetworkError(_)) => {
                CoreError::upstream("market data", e.to_string())
            }
            ResearchError::JsonError(e) => CoreError::parse("provider response", e.to_string()),
            ResearchError::ConfigError(msg) => CoreError::InvalidInput(msg),
            ResearchError::TemplateError(e) => CoreError::Generic(format!("Template error: {e}")),
        }
    }
}

/// Convert anyhow::Error (configuration helpers) to ResearchError
impl From<anyhow::Error> for ResearchError {
    fn from(err: anyhow::Error) -> Self {
        ResearchError::ConfigError(format!("{err:#}"))
    }
}
