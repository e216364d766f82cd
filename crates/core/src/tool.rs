//! Tool trait and registry — the capabilities an agent may invoke.
//!
//! The registry is read-only after construction: an `Arc<ToolRegistry>` is
//! shared across concurrent agent loop runs with no registry-global mutable
//! state. A failing tool never crashes the loop; failures come back as
//! `ToolError` values the loop folds into the transcript.

use crate::error::ToolError;
use crate::model::ToolSpec;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The output of a successful tool execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolOutput {
    /// Human/model-readable result text
    pub content: String,

    /// Optional structured payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl ToolOutput {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            data: None,
        }
    }
}

/// The core Tool trait.
///
/// Each tool implements this trait and is registered in a `ToolRegistry`
/// before the agent loop is constructed.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "file_read").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the model).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters(&self) -> serde_json::Value;

    /// Execute the tool with validated arguments.
    async fn execute(
        &self,
        arguments: serde_json::Value,
    ) -> std::result::Result<ToolOutput, ToolError>;

    /// Convert this tool into a spec for the model.
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters(),
        }
    }
}

/// A registry of available tools.
///
/// The agent loop uses this to:
/// 1. Get tool specs to send to the model
/// 2. Validate arguments before touching an executor
/// 3. Look up and run tools when the model requests them
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Registering a name twice is a configuration error,
    /// not a runtime condition.
    pub fn register(&mut self, tool: Box<dyn Tool>) -> std::result::Result<(), ToolError> {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            return Err(ToolError::Duplicate(name));
        }
        self.tools.insert(name, tool);
        Ok(())
    }

    /// Whether a tool with this name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// All tool specs, for sending to the model.
    pub fn specs(&self) -> Vec<ToolSpec> {
        self.tools.values().map(|t| t.spec()).collect()
    }

    /// List all registered tool names.
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    /// Parse and validate raw arguments against the tool's declared schema.
    ///
    /// Never invokes the executor. Checks that the text is JSON, that every
    /// `required` property is present, and that declared primitive types
    /// match.
    pub fn validate(
        &self,
        name: &str,
        raw_arguments: &str,
    ) -> std::result::Result<serde_json::Value, ToolError> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;

        let raw = if raw_arguments.trim().is_empty() {
            "{}"
        } else {
            raw_arguments
        };
        let args: serde_json::Value =
            serde_json::from_str(raw).map_err(|e| ToolError::InvalidArguments {
                tool_name: name.to_string(),
                reason: format!("arguments are not valid JSON: {e}"),
            })?;

        check_against_schema(&tool.parameters(), &args).map_err(|reason| {
            ToolError::InvalidArguments {
                tool_name: name.to_string(),
                reason,
            }
        })?;

        Ok(args)
    }

    /// Run a tool with already-validated arguments.
    ///
    /// Executor failures come back as `ToolError::ExecutionFailed`; they are
    /// never allowed to escape as anything the loop cannot fold into a tool
    /// message.
    pub async fn invoke(
        &self,
        name: &str,
        arguments: serde_json::Value,
    ) -> std::result::Result<ToolOutput, ToolError> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;

        tool.execute(arguments)
            .await
            .map_err(|e| match e {
                failed @ ToolError::ExecutionFailed { .. } => failed,
                other => ToolError::ExecutionFailed {
                    tool_name: name.to_string(),
                    reason: other.to_string(),
                },
            })
    }
}

/// Structural check of `args` against a JSON-Schema-shaped `schema`.
///
/// Covers the subset tools actually declare: a top-level object with
/// `properties` and `required`. Unknown properties pass through untouched;
/// the executor is free to ignore them.
fn check_against_schema(
    schema: &serde_json::Value,
    args: &serde_json::Value,
) -> std::result::Result<(), String> {
    let obj = match args.as_object() {
        Some(o) => o,
        None => return Err("expected a JSON object".into()),
    };

    if let Some(required) = schema.get("required").and_then(|r| r.as_array()) {
        for key in required.iter().filter_map(|k| k.as_str()) {
            if !obj.contains_key(key) {
                return Err(format!("missing required field '{key}'"));
            }
        }
    }

    if let Some(props) = schema.get("properties").and_then(|p| p.as_object()) {
        for (key, prop_schema) in props {
            let Some(value) = obj.get(key) else { continue };
            let Some(expected) = prop_schema.get("type").and_then(|t| t.as_str()) else {
                continue;
            };
            if !type_matches(expected, value) {
                return Err(format!(
                    "field '{key}' should be of type {expected}, got {}",
                    type_name(value)
                ));
            }
        }
    }

    Ok(())
}

fn type_matches(expected: &str, value: &serde_json::Value) -> bool {
    match expected {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" => value.is_boolean(),
        "array" => value.is_array(),
        "object" => value.is_object(),
        "null" => value.is_null(),
        // Unknown declared type: let the executor decide
        _ => true,
    }
}

fn type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A simple test tool.
    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "Echoes back the input"
        }
        fn parameters(&self) -> serde_json::Value {
            serde_json::json!({
                "type": "object",
                "properties": {
                    "text": { "type": "string" }
                },
                "required": ["text"]
            })
        }
        async fn execute(
            &self,
            arguments: serde_json::Value,
        ) -> std::result::Result<ToolOutput, ToolError> {
            let text = arguments["text"].as_str().unwrap_or("").to_string();
            Ok(ToolOutput::text(text))
        }
    }

    /// A tool whose executor always fails.
    struct BrokenTool;

    #[async_trait]
    impl Tool for BrokenTool {
        fn name(&self) -> &str {
            "broken"
        }
        fn description(&self) -> &str {
            "Always fails"
        }
        fn parameters(&self) -> serde_json::Value {
            serde_json::json!({ "type": "object", "properties": {} })
        }
        async fn execute(
            &self,
            _arguments: serde_json::Value,
        ) -> std::result::Result<ToolOutput, ToolError> {
            Err(ToolError::ExecutionFailed {
                tool_name: "broken".into(),
                reason: "disk on fire".into(),
            })
        }
    }

    fn registry() -> ToolRegistry {
        let mut r = ToolRegistry::new();
        r.register(Box::new(EchoTool)).unwrap();
        r.register(Box::new(BrokenTool)).unwrap();
        r
    }

    #[test]
    fn duplicate_registration_is_an_error() {
        let mut r = ToolRegistry::new();
        r.register(Box::new(EchoTool)).unwrap();
        let err = r.register(Box::new(EchoTool)).unwrap_err();
        assert!(matches!(err, ToolError::Duplicate(name) if name == "echo"));
    }

    #[test]
    fn validate_accepts_well_formed_arguments() {
        let r = registry();
        let args = r.validate("echo", r#"{"text":"hello"}"#).unwrap();
        assert_eq!(args["text"], "hello");
    }

    #[test]
    fn validate_rejects_missing_required_field() {
        let r = registry();
        let err = r.validate("echo", r#"{"other":1}"#).unwrap_err();
        match err {
            ToolError::InvalidArguments { reason, .. } => {
                assert!(reason.contains("text"), "reason: {reason}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn validate_rejects_wrong_type() {
        let r = registry();
        let err = r.validate("echo", r#"{"text":42}"#).unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments { .. }));
    }

    #[test]
    fn validate_rejects_malformed_json() {
        let r = registry();
        let err = r.validate("echo", "{not json").unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments { .. }));
    }

    #[test]
    fn validate_unknown_tool() {
        let r = registry();
        let err = r.validate("nonexistent", "{}").unwrap_err();
        assert!(matches!(err, ToolError::NotFound(_)));
    }

    #[test]
    fn empty_arguments_default_to_empty_object() {
        let r = registry();
        let args = r.validate("broken", "").unwrap();
        assert!(args.as_object().map(|o| o.is_empty()).unwrap_or(false));
    }

    #[tokio::test]
    async fn invoke_runs_the_executor() {
        let r = registry();
        let out = r
            .invoke("echo", serde_json::json!({"text": "hello world"}))
            .await
            .unwrap();
        assert_eq!(out.content, "hello world");
    }

    #[tokio::test]
    async fn invoke_surfaces_execution_failure() {
        let r = registry();
        let err = r.invoke("broken", serde_json::json!({})).await.unwrap_err();
        match err {
            ToolError::ExecutionFailed { reason, .. } => assert!(reason.contains("disk")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn specs_cover_all_tools() {
        let r = registry();
        let mut names: Vec<String> = r.specs().into_iter().map(|s| s.name).collect();
        names.sort();
        assert_eq!(names, vec!["broken", "echo"]);
    }
}
