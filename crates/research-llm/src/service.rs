//! Reasoning service trait definition

use crate::{CompletionRequest, CompletionResponse, Result};
use async_trait::async_trait;

/// Trait for reasoning services
///
/// A reasoning service turns a conversation (plus an optional list of tools
/// it may ask to call) into the next assistant message. Implementations are
/// injected into every component that needs one; nothing in the pipeline
/// reaches for a global client.
#[async_trait]
pub trait ReasoningService: Send + Sync {
    /// Generate the next assistant message
    ///
    /// # Arguments
    ///
    /// * `request` - Conversation, system prompt, tools and sampling parameters
    ///
    /// # Returns
    ///
    /// The assistant's message, which may contain text, tool-use blocks or both
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse>;

    /// Service name (e.g. "openai"), used in logs and error reports
    fn name(&self) -> &str;
}
