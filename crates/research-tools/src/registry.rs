//! Ordered tool registry
//!
//! Registration order is significant: it is the preference order shown to the
//! reasoning service (primary tool first, fallbacks after).

use crate::Tool;
use std::sync::Arc;

/// Registry of available tools, in preference order
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool at the end of the preference list
    ///
    /// Registering a name that already exists replaces that tool in place.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        match self.tools.iter().position(|t| t.name() == tool.name()) {
            Some(index) => {
                tracing::debug!(tool = %tool.name(), "Replacing registered tool");
                self.tools[index] = tool;
            }
            None => self.tools.push(tool),
        }
    }

    /// Builder-style registration
    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.register(tool);
        self
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.name() == name).cloned()
    }

    /// All tools, in preference order
    pub fn list_tools(&self) -> &[Arc<dyn Tool>] {
        &self.tools
    }

    /// Tool names, in preference order
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    /// Get the number of registered tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::{Value, json};

    struct NamedTool {
        name: &'static str,
        marker: u8,
    }

    #[async_trait]
    impl Tool for NamedTool {
        async fn execute(&self, _params: Value) -> research_core::Result<Value> {
            Ok(json!({ "marker": self.marker }))
        }

        fn name(&self) -> &str {
            self.name
        }

        fn description(&self) -> &str {
            "test tool"
        }

        fn input_schema(&self) -> Value {
            json!({"type": "object"})
        }
    }

    fn tool(name: &'static str, marker: u8) -> Arc<dyn Tool> {
        Arc::new(NamedTool { name, marker })
    }

    #[test]
    fn test_preserves_registration_order() {
        let registry = ToolRegistry::new()
            .with_tool(tool("primary", 0))
            .with_tool(tool("fallback", 0))
            .with_tool(tool("last_resort", 0));

        assert_eq!(registry.names(), vec!["primary", "fallback", "last_resort"]);
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_replace_keeps_position() {
        let mut registry = ToolRegistry::new()
            .with_tool(tool("primary", 1))
            .with_tool(tool("fallback", 1));
        registry.register(tool("primary", 2));

        assert_eq!(registry.names(), vec!["primary", "fallback"]);
        let primary = registry.get("primary").unwrap();
        let result = tokio_test::block_on(primary.execute(json!({}))).unwrap();
        assert_eq!(result["marker"], 2);
    }

    #[test]
    fn test_unknown_tool() {
        let registry = ToolRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.get("nope").is_none());
    }
}
