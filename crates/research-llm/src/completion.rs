//! Completion request and response types

use crate::{ContentBlock, Message, ToolCall, ToolSpec};
use serde::{Deserialize, Serialize};

/// Default completion budget when the caller sets none
pub const DEFAULT_MAX_TOKENS: usize = 1024;

/// One turn asked of the reasoning service
///
/// Carries the whole conversation so far; services are stateless between
/// calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// Model identifier (provider-specific)
    pub model: String,

    /// Role instructions for this call
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    /// Conversation so far, oldest first
    pub messages: Vec<Message>,

    /// Tools the service may ask to call, in preference order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolSpec>,

    /// Completion budget
    pub max_tokens: usize,

    /// Sampling temperature; `None` leaves the provider default
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

impl CompletionRequest {
    /// Start a request for `model`
    pub fn builder(model: impl Into<String>) -> CompletionRequestBuilder {
        CompletionRequestBuilder {
            request: Self {
                model: model.into(),
                system: None,
                messages: Vec::new(),
                tools: Vec::new(),
                max_tokens: DEFAULT_MAX_TOKENS,
                temperature: None,
            },
        }
    }

    /// Names of the offered tools, in preference order
    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name.as_str()).collect()
    }

    /// Whether the service may call `name` in this turn
    pub fn offers_tool(&self, name: &str) -> bool {
        self.tools.iter().any(|t| t.name == name)
    }
}

/// Chained construction of a [`CompletionRequest`]
#[derive(Debug, Clone)]
pub struct CompletionRequestBuilder {
    request: CompletionRequest,
}

impl CompletionRequestBuilder {
    /// Replace the conversation
    pub fn messages(mut self, messages: Vec<Message>) -> Self {
        self.request.messages = messages;
        self
    }

    /// Append one message
    pub fn add_message(mut self, message: Message) -> Self {
        self.request.messages.push(message);
        self
    }

    /// Set the role instructions
    pub fn system(mut self, system: impl Into<String>) -> Self {
        self.request.system = Some(system.into());
        self
    }

    /// Set the completion budget
    pub fn max_tokens(mut self, max_tokens: usize) -> Self {
        self.request.max_tokens = max_tokens;
        self
    }

    /// Set the temperature
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.request.temperature = Some(temperature);
        self
    }

    /// Offer tools, most preferred first
    pub fn tools(mut self, tools: Vec<ToolSpec>) -> Self {
        self.request.tools = tools;
        self
    }

    /// Finish the request
    pub fn build(self) -> CompletionRequest {
        self.request
    }
}

/// The service's next assistant message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    /// Text, tool-use blocks or both
    pub message: Message,

    /// Why generation stopped
    pub stop_reason: StopReason,

    /// Tokens consumed by the call
    pub usage: TokenUsage,
}

impl CompletionResponse {
    /// A plain text answer
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            message: Message::assistant(text),
            stop_reason: StopReason::EndTurn,
            usage: TokenUsage::default(),
        }
    }

    /// An answer that requests one or more tool calls
    pub fn tool_calls(calls: Vec<ToolCall>) -> Self {
        Self {
            message: Message::assistant_blocks(calls.into_iter().map(ContentBlock::from).collect()),
            stop_reason: StopReason::ToolUse,
            usage: TokenUsage::default(),
        }
    }

    /// The answer was cut off by the completion budget
    ///
    /// A truncated structured answer will not parse, so callers log this
    /// next to the parse failure.
    pub fn is_truncated(&self) -> bool {
        self.stop_reason == StopReason::MaxTokens
    }
}

/// Why the service stopped generating
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Finished its turn
    EndTurn,
    /// Ran out of completion budget
    MaxTokens,
    /// Wants tools run before continuing
    ToolUse,
}

/// Token counts reported by the provider
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Prompt tokens
    pub input_tokens: usize,
    /// Completion tokens
    pub output_tokens: usize,
}

impl TokenUsage {
    /// Prompt plus completion tokens
    pub fn total(&self) -> usize {
        self.input_tokens + self.output_tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::schema;
    use serde_json::json;

    #[test]
    fn test_builder() {
        let request = CompletionRequest::builder("gpt-4o-mini")
            .add_message(Message::user("analyze NVDA"))
            .system("You are a research analyst")
            .max_tokens(2048)
            .temperature(0.0)
            .build();

        assert_eq!(request.model, "gpt-4o-mini");
        assert_eq!(request.messages.len(), 1);
        assert_eq!(request.max_tokens, 2048);
        assert_eq!(request.temperature, Some(0.0));
        assert!(request.tool_names().is_empty());

        let request = CompletionRequest::builder("gpt-4o-mini").build();
        assert_eq!(request.max_tokens, DEFAULT_MAX_TOKENS);
        assert_eq!(request.temperature, None);
    }

    #[test]
    fn test_tool_order_is_kept() {
        let spec = |name: &str| ToolSpec::new(name, "search", schema::object(json!({}), &[]));
        let request = CompletionRequest::builder("gpt-4o-mini")
            .tools(vec![spec("tavily_news_search"), spec("fmp_news_search")])
            .build();

        assert_eq!(request.tool_names(), vec!["tavily_news_search", "fmp_news_search"]);
        assert!(request.offers_tool("fmp_news_search"));
        assert!(!request.offers_tool("web_search"));
        assert!(!serde_json::to_value(&request).unwrap()["tools"].is_null());
    }

    #[test]
    fn test_tool_call_response() {
        let response = CompletionResponse::tool_calls(vec![ToolCall::new(
            "c1",
            "search",
            json!({"query": "NVDA"}),
        )]);
        assert_eq!(response.stop_reason, StopReason::ToolUse);
        assert_eq!(response.message.tool_calls().len(), 1);

        let response = CompletionResponse::text("{}");
        assert!(!response.message.has_tool_calls());
        assert!(!response.is_truncated());
    }

    #[test]
    fn test_usage_total() {
        let usage = TokenUsage {
            input_tokens: 1200,
            output_tokens: 300,
        };
        assert_eq!(usage.total(), 1500);
    }
}
