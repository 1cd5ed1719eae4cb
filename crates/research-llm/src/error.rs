//! Errors raised while talking to the reasoning service

use thiserror::Error;

/// Result type for reasoning-service operations
pub type Result<T> = std::result::Result<T, LLMError>;

/// Reasoning-service failures, as reported by a provider
#[derive(Error, Debug)]
pub enum LLMError {
    /// The call did not complete (transport error, 5xx, empty reply)
    #[error("API request failed: {0}")]
    RequestFailed(String),

    /// The provider rejected the credentials
    #[error("Invalid API key or authentication failed")]
    AuthenticationFailed,

    /// The provider is throttling this key
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// The provider rejected the request body
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The configured model does not exist for this provider
    #[error("Model not found: {0}")]
    ModelNotFound(String),

    /// Request or reply JSON could not be (de)serialized
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Transport-level failure from the HTTP client
    #[cfg(feature = "openai")]
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// The reply parsed but had no usable choice or message
    #[error("Unexpected response format: {0}")]
    UnexpectedResponse(String),

    /// The provider could not be set up (missing key, bad base URL)
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}

/// Reasoning failures are upstream failures from the pipeline's point of view
impl From<LLMError> for research_core::Error {
    fn from(err: LLMError) -> Self {
        research_core::Error::upstream("reasoning service", err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversion_to_core_error() {
        let err: research_core::Error = LLMError::RateLimitExceeded("slow down".to_string()).into();
        match err {
            research_core::Error::Upstream { provider, message } => {
                assert_eq!(provider, "reasoning service");
                assert!(message.contains("slow down"));
            }
            other => panic!("Expected Upstream, got {other:?}"),
        }
    }
}
