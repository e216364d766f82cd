//! Workflow events — the ordered, replayable trail of one agent run.
//!
//! Events for a given workflow are totally ordered by publish order, never
//! by wall clock. Each kind is a tagged enum variant so adding a kind is a
//! compile-time-checked change everywhere events are matched.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of one end-to-end agent-driven run.
pub type WorkflowId = String;

/// Where a workflow currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Running,
    Completed,
    /// The agent hit its step ceiling — cut off, not failed.
    TimedOut,
    Failed,
}

/// One event in a workflow's trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowEvent {
    /// Which workflow this belongs to
    pub workflow_id: WorkflowId,

    /// What happened
    #[serde(flatten)]
    pub kind: EventKind,

    /// When it was published
    pub timestamp: DateTime<Utc>,
}

impl WorkflowEvent {
    pub fn new(workflow_id: impl Into<WorkflowId>, kind: EventKind) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            kind,
            timestamp: Utc::now(),
        }
    }

    /// The SSE event name for this kind.
    pub fn event_name(&self) -> &'static str {
        match &self.kind {
            EventKind::Status { .. } => "status",
            EventKind::AssistantMessage { .. } => "assistant_message",
            EventKind::ToolCall { .. } => "tool.call",
            EventKind::ToolResult { .. } => "tool.result",
            EventKind::Reasoning { .. } => "reasoning",
            EventKind::WorkflowState { .. } => "workflow.state",
            EventKind::WorkflowError { .. } => "workflow.error",
        }
    }
}

/// The closed set of workflow event kinds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    /// Free-form progress note
    Status { message: String },

    /// The agent produced a final or intermediate text reply
    AssistantMessage { content: String },

    /// The agent is invoking a tool
    ToolCall {
        id: String,
        name: String,
        input: serde_json::Value,
    },

    /// A tool invocation finished
    ToolResult {
        id: String,
        name: String,
        output: String,
        success: bool,
    },

    /// Model prose emitted alongside tool calls
    Reasoning { content: String },

    /// Lifecycle transition
    WorkflowState { state: RunState },

    /// A workflow-level failure observers should see in real time
    WorkflowError { message: String },
}
