//! The tool seam between the reasoning loop and external services

use async_trait::async_trait;
use research_core::Result;
use serde_json::Value;

/// A tool the reasoning service can ask to call
///
/// Tools take structured JSON input and return structured JSON output or an
/// error. An empty result (e.g. a search with zero hits) is a success.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Run the tool on arguments chosen by the reasoning service
    ///
    /// Arguments that do not match [`Tool::input_schema`] are an
    /// `InvalidInput` error, which the loop records as a failed call.
    async fn execute(&self, params: Value) -> Result<Value>;

    /// Unique name within a registry
    fn name(&self) -> &str;

    /// What the tool does, shown to the reasoning service
    fn description(&self) -> &str;

    /// JSON Schema of the expected input
    fn input_schema(&self) -> Value;
}
