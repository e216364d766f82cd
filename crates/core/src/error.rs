//! Error types for the WorkLoom domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum; the top-level `Error`
//! aggregates them with `#[from]` conversions.

use thiserror::Error;

/// The top-level error type for all WorkLoom operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Language-model port errors ---
    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Queue errors ---
    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    // --- Event bus errors ---
    #[error("Bus error: {0}")]
    Bus(#[from] BusError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Failures surfaced by the language-model port.
///
/// These are fatal to an agent loop run: the loop never retries them.
/// Retry policy lives in the queue engine, which sees the job fail and
/// re-runs the processor from a clean state.
#[derive(Debug, Clone, Error)]
pub enum ModelError {
    #[error("API request failed: {message} (status: {status_code})")]
    Api { status_code: u16, message: String },

    #[error("Rate limited by model endpoint, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Model endpoint not configured: {0}")]
    NotConfigured(String),

    #[error("Malformed model response: {0}")]
    MalformedResponse(String),
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("A tool named '{0}' is already registered")]
    Duplicate(String),

    #[error("Invalid arguments for tool '{tool_name}': {reason}")]
    InvalidArguments { tool_name: String, reason: String },

    #[error("Tool execution failed: {tool_name} — {reason}")]
    ExecutionFailed { tool_name: String, reason: String },
}

#[derive(Debug, Clone, Error)]
pub enum QueueError {
    #[error("Unknown queue: {0}")]
    UnknownQueue(String),

    #[error("Queue already exists: {0}")]
    AlreadyExists(String),

    #[error("Queue '{0}' already has a worker attached")]
    WorkerAttached(String),

    #[error("Queue '{0}' is shutting down and not accepting jobs")]
    ShuttingDown(String),

    #[error("Unknown job '{job_id}' on queue '{queue}'")]
    UnknownJob { queue: String, job_id: String },
}

#[derive(Debug, Clone, Error)]
pub enum BusError {
    #[error("Workflow '{0}' was cleaned up; publishing to it is a lifecycle bug")]
    StaleCleanup(String),

    #[error("No event log for workflow '{0}'")]
    UnknownWorkflow(String),
}
