//! Single-shot reasoning calls

use crate::config::ResearchConfig;
use crate::reports::{Validate, parse_payload};
use research_core::{Error, Result};
use research_llm::{CompletionRequest, Message, ReasoningService};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Asks the reasoning service one question at a time, under a deadline
#[derive(Clone)]
pub struct ReasoningClient {
    service: Arc<dyn ReasoningService>,
    model: String,
    max_tokens: usize,
    temperature: f32,
    timeout: Duration,
}

impl ReasoningClient {
    /// Create a client using the model settings in `config`
    pub fn new(service: Arc<dyn ReasoningService>, config: &ResearchConfig) -> Self {
        Self {
            service,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            timeout: config.reasoning_timeout,
        }
    }

    /// The underlying service
    pub fn service(&self) -> Arc<dyn ReasoningService> {
        Arc::clone(&self.service)
    }

    /// Text of the service's answer
    pub async fn ask(&self, system: &str, user: &str) -> Result<String> {
        let request = CompletionRequest::builder(&self.model)
            .system(system)
            .add_message(Message::user(user))
            .max_tokens(self.max_tokens)
            .temperature(self.temperature)
            .build();

        let response = tokio::time::timeout(self.timeout, self.service.complete(request))
            .await
            .map_err(|_| Error::timeout("reasoning call", self.timeout))??;

        if response.is_truncated() {
            warn!(
                service = self.service.name(),
                max_tokens = self.max_tokens,
                "Answer cut off by the completion budget"
            );
        }
        let text = response.message.text().unwrap_or_default();
        debug!(
            service = self.service.name(),
            chars = text.len(),
            preview = %text.chars().take(120).collect::<String>(),
            "Reasoning answer"
        );
        Ok(text)
    }

    /// Answer parsed and range-checked into `T`
    ///
    /// Service failures and parse failures are both errors; callers tell them
    /// apart with [`Error::Parse`].
    pub async fn ask_structured<T>(&self, system: &str, user: &str, expected: &str) -> Result<T>
    where
        T: DeserializeOwned + Validate,
    {
        let text = self.ask(system, user).await?;
        parse_payload(&text, expected)
    }
}

impl std::fmt::Debug for ReasoningClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReasoningClient")
            .field("service", &self.service.name())
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}
