//! Concrete reasoning-service implementations

pub mod openai;

pub use openai::{OpenAIConfig, OpenAIProvider};
