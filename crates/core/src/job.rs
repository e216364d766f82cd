//! Job types — one unit of queued work, usually one workflow execution.
//!
//! The queue engine owns job lifecycle state exclusively; these are the
//! value types it hands out.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A unit of work handed to a processor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// The queue this job belongs to
    pub queue: String,

    /// Caller-supplied idempotency key. At most one live instance per
    /// (queue, job_id) pair.
    pub job_id: String,

    /// Opaque payload the processor interprets
    pub payload: serde_json::Value,

    /// Which attempt this is, starting at 1. Retries increment it; the
    /// processor itself never sees state from a previous attempt.
    pub attempt: u32,

    /// When the job was first enqueued
    pub enqueued_at: DateTime<Utc>,
}

/// Job lifecycle: `Enqueued → Active → (Completed | Failed)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Enqueued,
    Active,
    Completed,
    Failed,
}

impl JobState {
    /// A live job blocks re-enqueue of the same id; a terminal one doesn't.
    pub fn is_live(&self) -> bool {
        matches!(self, JobState::Enqueued | JobState::Active)
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_live()
    }
}

/// The externally visible status of a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStatus {
    pub state: JobState,

    /// Attempts made so far (0 until the first dispatch)
    pub attempts: u32,

    /// Processor result, present once `Completed`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,

    /// Why the job failed, present once `Failed`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

impl JobStatus {
    pub fn enqueued() -> Self {
        Self {
            state: JobState::Enqueued,
            attempts: 0,
            result: None,
            failure_reason: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_liveness() {
        assert!(JobState::Enqueued.is_live());
        assert!(JobState::Active.is_live());
        assert!(JobState::Completed.is_terminal());
        assert!(JobState::Failed.is_terminal());
    }

    #[test]
    fn status_serialization_omits_empty_fields() {
        let status = JobStatus::enqueued();
        let json = serde_json::to_string(&status).unwrap();
        assert!(json.contains(r#""state":"enqueued""#));
        assert!(!json.contains("failure_reason"));
        assert!(!json.contains("result"));
    }
}
