//! # WorkLoom Core
//!
//! Domain types, ports, and error definitions for the WorkLoom agent job
//! runner. This crate has **zero framework dependencies** — it defines the
//! domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every subsystem boundary is a trait here (`LanguageModel`, `Tool`,
//! `JobProcessor` in the queue crate). Implementations live in their
//! respective crates, so the dependency graph points inward and every port
//! can be mocked in tests.

pub mod error;
pub mod event;
pub mod job;
pub mod message;
pub mod model;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::{BusError, Error, ModelError, QueueError, Result, ToolError};
pub use event::{EventKind, RunState, WorkflowEvent, WorkflowId};
pub use job::{Job, JobState, JobStatus};
pub use message::{Message, Role, ToolCallRequest, Transcript};
pub use model::{LanguageModel, ModelRequest, ModelResponse, ModelTurn, ToolSpec, Usage};
pub use tool::{Tool, ToolOutput, ToolRegistry};
