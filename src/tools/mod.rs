//! Local functions the model may call

mod weather;

pub use weather::{WeatherTool, expand_city_query};

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::request::{ToolCall, ToolSpec};
use crate::{Error, Result};

/// A function exposed to the model
#[async_trait]
pub trait Tool: Send + Sync {
    /// Declaration sent with chat requests
    fn spec(&self) -> ToolSpec;

    /// Run the tool with parsed JSON arguments
    ///
    /// # Errors
    ///
    /// Returns [`Error::Tool`] if the arguments are unusable
    async fn call(&self, arguments: serde_json::Value) -> Result<String>;
}

/// Tools available to a conversation, by name
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool under its declared name
    #[must_use]
    pub fn with(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.insert(tool.spec().name, tool);
        self
    }

    /// Declarations of every registered tool, sorted by name
    #[must_use]
    pub fn specs(&self) -> Vec<ToolSpec> {
        let mut specs: Vec<ToolSpec> = self.tools.values().map(|t| t.spec()).collect();
        specs.sort_by(|a, b| a.name.cmp(&b.name));
        specs
    }

    /// Execute a model-requested call
    ///
    /// Failures are rendered as text so the model can see them.
    pub async fn execute(&self, call: &ToolCall) -> String {
        match self.try_execute(call).await {
            Ok(output) => output,
            Err(e) => {
                tracing::warn!(tool = %call.name, error = %e, "tool call failed");
                format!("Error: {e}")
            }
        }
    }

    async fn try_execute(&self, call: &ToolCall) -> Result<String> {
        let tool = self
            .tools
            .get(&call.name)
            .ok_or_else(|| Error::Tool(format!("unknown function {}", call.name)))?;

        let arguments: serde_json::Value = if call.arguments.trim().is_empty() {
            serde_json::Value::Object(serde_json::Map::new())
        } else {
            serde_json::from_str(&call.arguments)
                .map_err(|e| Error::Tool(format!("invalid arguments: {e}")))?
        };

        tracing::debug!(tool = %call.name, "executing tool");
        tool.call(arguments).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &str, arguments: &str) -> ToolCall {
        ToolCall {
            id: "call_1".to_string(),
            name: name.to_string(),
            arguments: arguments.to_string(),
        }
    }

    #[tokio::test]
    async fn test_unknown_tool_is_reported() {
        let registry = ToolRegistry::new().with(Arc::new(WeatherTool));
        let output = registry.execute(&call("getTide", "{}")).await;
        assert!(output.starts_with("Error:"));
        assert!(output.contains("getTide"));
    }

    #[tokio::test]
    async fn test_bad_arguments_are_reported() {
        let registry = ToolRegistry::new().with(Arc::new(WeatherTool));
        let output = registry.execute(&call("getWeather", "{not json")).await;
        assert!(output.contains("invalid arguments"));
    }

    #[tokio::test]
    async fn test_dispatch_by_name() {
        let registry = ToolRegistry::new().with(Arc::new(WeatherTool));
        let output = registry
            .execute(&call("getWeather", r#"{"location":"Tokyo"}"#))
            .await;
        assert!(output.starts_with("The weather in Tokyo on "));
        assert_eq!(registry.specs().len(), 1);
    }
}
