//! LanguageModel port — the abstraction over LLM backends.
//!
//! A `LanguageModel` takes a transcript plus the tool specs the agent has
//! registered and returns one turn: either a plain reply or a batch of
//! tool-call requests. The two cases are a discriminated enum so callers
//! must handle both; there is no "empty tool_calls means reply" convention.

use crate::error::ModelError;
use crate::message::{Message, ToolCallRequest};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A tool definition sent to the model so it knows what it can call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    /// The tool name
    pub name: String,

    /// Description of what the tool does
    pub description: String,

    /// JSON Schema describing the tool's parameters
    pub parameters: serde_json::Value,
}

/// One completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelRequest {
    /// The model to use (e.g., "gpt-4o", "anthropic/claude-sonnet-4")
    pub model: String,

    /// The full transcript so far, in append order
    pub messages: Vec<Message>,

    /// Tools the model may request
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolSpec>,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

fn default_temperature() -> f32 {
    0.7
}

/// What the model did with its turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelTurn {
    /// A final text reply; the loop terminates on this.
    Reply { content: String },

    /// One or more tool-call requests, in the order the model emitted them.
    /// `content` carries any prose the model produced alongside the calls.
    ToolUse {
        content: Option<String>,
        calls: Vec<ToolCallRequest>,
    },
}

impl ModelTurn {
    /// Convenience accessor used in logs and tests.
    pub fn is_tool_use(&self) -> bool {
        matches!(self, ModelTurn::ToolUse { .. })
    }
}

/// Token usage statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// A complete response from a model backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelResponse {
    /// The discriminated turn
    pub turn: ModelTurn,

    /// Which model actually responded (may differ from requested)
    pub model: String,

    /// Token usage, when the backend reports it
    pub usage: Option<Usage>,
}

/// The language-model port.
///
/// The agent loop calls `complete()` without knowing which backend is in
/// use. Failures here are fatal to the loop run; the queue engine owns
/// retry policy.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// A human-readable name for this backend (e.g., "openai", "ollama").
    fn name(&self) -> &str;

    /// Send the transcript and tool specs, get one turn back.
    async fn complete(
        &self,
        request: ModelRequest,
    ) -> std::result::Result<ModelResponse, ModelError>;
}
