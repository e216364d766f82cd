//! # WorkLoom Agent
//!
//! The agent reasoning loop: drive a model/tool cycle over an owned
//! transcript until the model stops requesting tools or the step ceiling
//! is reached, publishing workflow events along the way.

pub mod loop_runner;

pub use loop_runner::{AgentLoop, LoopOutcome};
