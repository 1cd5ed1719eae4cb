//! Reasoning-service abstraction for the equity research pipeline
//!
//! This crate provides provider-agnostic types for talking to the reasoning
//! service (an LLM). It includes:
//!
//! - Message types, including tool-use and tool-result blocks
//! - Completion request/response types
//! - Tool specs for function calling
//! - The [`ReasoningService`] trait
//! - Strict parsing of structured (JSON) answers
//! - An OpenAI-compatible provider (behind the `openai` feature)

pub mod completion;
pub mod error;
pub mod messages;
pub mod service;
pub mod structured;
pub mod tools;

// Re-export main types
pub use completion::{CompletionRequest, CompletionResponse, StopReason, TokenUsage};
pub use error::{LLMError, Result};
pub use messages::{ContentBlock, Message, MessageContent, Role, ToolCall};
pub use service::ReasoningService;
pub use structured::parse_structured;
pub use tools::ToolSpec;

#[cfg(feature = "openai")]
pub mod providers;
