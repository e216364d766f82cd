//! The queue-side worker: turns a trigger job into an agent run.
//!
//! Each attempt builds a fresh transcript and a fresh loop, so a retry
//! never sees half-finished state from the attempt before it. Workflow
//! lifecycle transitions are published to the bus as the run progresses;
//! observers see `running → (completed | timed_out | failed)`.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};
use workloom_agent::{AgentLoop, LoopOutcome};
use workloom_bus::SharedBus;
use workloom_core::event::{EventKind, RunState, WorkflowEvent};
use workloom_core::job::Job;
use workloom_core::message::{Message, Transcript};
use workloom_core::model::LanguageModel;
use workloom_core::tool::ToolRegistry;
use workloom_queue::JobProcessor;

const SYSTEM_PROMPT: &str = "You are a capable assistant running as a background workflow. \
Use the available tools when they help, and finish with a clear text answer.";

/// What a workflow trigger job carries.
#[derive(Debug, Deserialize)]
struct TriggerPayload {
    workflow_id: String,
    prompt: String,
}

/// Runs agent workflows off the queue.
pub struct AgentJobProcessor {
    model: Arc<dyn LanguageModel>,
    model_name: String,
    temperature: f32,
    max_tokens: Option<u32>,
    max_steps: u32,
    /// Mirrors the queue's own setting so the final attempt publishes a
    /// terminal `failed` state instead of another retry notice.
    max_attempts: u32,
    tools: Arc<ToolRegistry>,
    bus: SharedBus,
}

impl AgentJobProcessor {
    pub fn new(
        model: Arc<dyn LanguageModel>,
        model_name: impl Into<String>,
        tools: Arc<ToolRegistry>,
        bus: SharedBus,
    ) -> Self {
        Self {
            model,
            model_name: model_name.into(),
            temperature: 0.7,
            max_tokens: None,
            max_steps: 8,
            max_attempts: 3,
            tools,
            bus,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_max_steps(mut self, max_steps: u32) -> Self {
        self.max_steps = max_steps.max(1);
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    async fn publish(&self, workflow_id: &str, kind: EventKind) -> anyhow::Result<()> {
        self.bus
            .publish(WorkflowEvent::new(workflow_id, kind))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl JobProcessor for AgentJobProcessor {
    async fn process(&self, job: &Job) -> anyhow::Result<serde_json::Value> {
        let payload: TriggerPayload = serde_json::from_value(job.payload.clone())?;
        let workflow_id = payload.workflow_id.as_str();

        self.publish(
            workflow_id,
            EventKind::WorkflowState {
                state: RunState::Running,
            },
        )
        .await?;

        let mut transcript = Transcript::new();
        transcript.push(Message::system(SYSTEM_PROMPT));
        transcript.push(Message::user(&payload.prompt));

        let mut agent = AgentLoop::new(
            self.model.clone(),
            &self.model_name,
            self.tools.clone(),
            self.bus.clone(),
            workflow_id,
        )
        .with_max_steps(self.max_steps)
        .with_temperature(self.temperature);
        if let Some(max_tokens) = self.max_tokens {
            agent = agent.with_max_tokens(max_tokens);
        }

        match agent.run(&mut transcript).await {
            Ok(LoopOutcome::Completed { reply }) => {
                self.publish(
                    workflow_id,
                    EventKind::WorkflowState {
                        state: RunState::Completed,
                    },
                )
                .await?;
                info!(workflow_id, "Workflow completed");
                Ok(serde_json::json!({ "reply": reply }))
            }
            Ok(LoopOutcome::MaxStepsReached) => {
                self.publish(
                    workflow_id,
                    EventKind::WorkflowState {
                        state: RunState::TimedOut,
                    },
                )
                .await?;
                warn!(workflow_id, "Workflow hit its step ceiling");
                Ok(serde_json::json!({ "truncated": true }))
            }
            Err(e) => {
                self.publish(
                    workflow_id,
                    EventKind::WorkflowError {
                        message: e.to_string(),
                    },
                )
                .await?;
                if job.attempt >= self.max_attempts {
                    self.publish(
                        workflow_id,
                        EventKind::WorkflowState {
                            state: RunState::Failed,
                        },
                    )
                    .await?;
                }
                Err(e.into())
            }
        }
    }
}
