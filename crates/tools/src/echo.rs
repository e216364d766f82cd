//! Echo tool — returns its input verbatim.
//!
//! Mostly useful for smoke-testing a model's tool calling end to end
//! without touching the filesystem or the network.

use async_trait::async_trait;
use workloom_core::error::ToolError;
use workloom_core::tool::{Tool, ToolOutput};

pub struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Echo the provided text back unchanged. Useful for testing."
    }

    fn parameters(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "text": {
                    "type": "string",
                    "description": "The text to echo back"
                }
            },
            "required": ["text"]
        })
    }

    async fn execute(
        &self,
        arguments: serde_json::Value,
    ) -> std::result::Result<ToolOutput, ToolError> {
        let text = arguments
            .get("text")
            .and_then(|v| v.as_str())
            .unwrap_or_default();
        Ok(ToolOutput::text(text))
    }
}
