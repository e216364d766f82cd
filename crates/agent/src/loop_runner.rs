//! The agent loop implementation.
//!
//! An explicit iterative loop with a step counter — never recursion — so
//! the step ceiling is trivially enforceable and `MaxStepsReached` is a
//! first-class outcome distinct from normal completion.

use std::sync::Arc;
use tracing::{debug, info, warn};
use workloom_bus::WorkflowBus;
use workloom_core::error::ToolError;
use workloom_core::event::{EventKind, WorkflowEvent};
use workloom_core::message::{Message, ToolCallRequest, Transcript};
use workloom_core::model::{LanguageModel, ModelRequest, ModelTurn};
use workloom_core::tool::ToolRegistry;

/// How an agent loop run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum LoopOutcome {
    /// The model produced a final text reply.
    Completed { reply: String },

    /// The step ceiling was hit while the model was still requesting
    /// tools. Cut off, not failed: callers mark the workflow `timed_out`.
    MaxStepsReached,
}

/// The core agent loop: orchestrates model calls and tool execution for
/// one workflow.
pub struct AgentLoop {
    /// The language-model port
    model: Arc<dyn LanguageModel>,

    /// Which model to request
    model_name: String,

    /// Sampling temperature
    temperature: f32,

    /// Max tokens per model response
    max_tokens: Option<u32>,

    /// Tool registry (read-only, shared across loops)
    tools: Arc<ToolRegistry>,

    /// Event bus for the workflow trail
    bus: Arc<WorkflowBus>,

    /// The workflow this run belongs to
    workflow_id: String,

    /// Hard ceiling on model turns
    max_steps: u32,
}

impl AgentLoop {
    pub fn new(
        model: Arc<dyn LanguageModel>,
        model_name: impl Into<String>,
        tools: Arc<ToolRegistry>,
        bus: Arc<WorkflowBus>,
        workflow_id: impl Into<String>,
    ) -> Self {
        Self {
            model,
            model_name: model_name.into(),
            temperature: 0.7,
            max_tokens: None,
            tools,
            bus,
            workflow_id: workflow_id.into(),
            max_steps: 8,
        }
    }

    /// Set the hard ceiling on model turns.
    pub fn with_max_steps(mut self, max_steps: u32) -> Self {
        self.max_steps = max_steps.max(1);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    async fn publish(&self, kind: EventKind) -> workloom_core::Result<()> {
        self.bus
            .publish(WorkflowEvent::new(self.workflow_id.clone(), kind))
            .await?;
        Ok(())
    }

    /// Run the loop over `transcript` to a terminal outcome.
    ///
    /// Each iteration sends the full transcript plus tool specs to the
    /// model. A reply terminates the loop; tool-call requests are executed
    /// sequentially in emission order, each answered by exactly one `tool`
    /// message, before the next model turn is requested.
    ///
    /// Model-port failures are fatal here and propagate to the caller —
    /// retry policy belongs to the queue engine, not the loop.
    pub async fn run(&self, transcript: &mut Transcript) -> workloom_core::Result<LoopOutcome> {
        info!(
            workflow_id = %self.workflow_id,
            messages = transcript.len(),
            max_steps = self.max_steps,
            "Agent loop starting"
        );

        let tool_specs = self.tools.specs();

        for step in 1..=self.max_steps {
            debug!(workflow_id = %self.workflow_id, step, "Requesting model turn");

            let request = ModelRequest {
                model: self.model_name.clone(),
                messages: transcript.messages().to_vec(),
                tools: tool_specs.clone(),
                temperature: self.temperature,
                max_tokens: self.max_tokens,
            };

            let response = self.model.complete(request).await?;

            match response.turn {
                ModelTurn::Reply { content } => {
                    transcript.push(Message::assistant(&content));
                    self.publish(EventKind::AssistantMessage {
                        content: content.clone(),
                    })
                    .await?;
                    info!(workflow_id = %self.workflow_id, steps = step, "Agent loop completed");
                    return Ok(LoopOutcome::Completed { reply: content });
                }
                ModelTurn::ToolUse { content, calls } => {
                    if let Some(prose) = content.as_deref().filter(|c| !c.is_empty()) {
                        self.publish(EventKind::Reasoning {
                            content: prose.to_string(),
                        })
                        .await?;
                    }
                    transcript.push(Message::assistant_tool_use(content, calls.clone()));

                    // Every request of this turn is answered before the
                    // next model call — no interleaving.
                    for call in &calls {
                        self.execute_call(transcript, call).await?;
                    }
                }
            }
        }

        warn!(
            workflow_id = %self.workflow_id,
            max_steps = self.max_steps,
            "Step ceiling reached, cutting the loop off"
        );
        self.publish(EventKind::Status {
            message: format!("step ceiling of {} model turns reached", self.max_steps),
        })
        .await?;
        Ok(LoopOutcome::MaxStepsReached)
    }

    /// Answer one tool-call request with exactly one `tool` message.
    ///
    /// Unknown tools, invalid arguments, and executor failures are all
    /// recovered locally: the model sees a readable error and the loop
    /// continues.
    async fn execute_call(
        &self,
        transcript: &mut Transcript,
        call: &ToolCallRequest,
    ) -> workloom_core::Result<()> {
        let input = serde_json::from_str::<serde_json::Value>(&call.raw_arguments)
            .unwrap_or_else(|_| serde_json::Value::String(call.raw_arguments.clone()));
        self.publish(EventKind::ToolCall {
            id: call.id.clone(),
            name: call.name.clone(),
            input,
        })
        .await?;

        let (output, success) = match self.tools.validate(&call.name, &call.raw_arguments) {
            Err(ToolError::NotFound(name)) => {
                warn!(workflow_id = %self.workflow_id, tool = %name, "Model referenced unknown tool");
                (format!("Tool not found: {name}"), false)
            }
            Err(e) => {
                debug!(workflow_id = %self.workflow_id, tool = %call.name, error = %e, "Argument validation failed");
                (format!("Invalid arguments: {e}"), false)
            }
            Ok(args) => match self.tools.invoke(&call.name, args).await {
                Ok(out) => (out.content, true),
                Err(e) => {
                    warn!(workflow_id = %self.workflow_id, tool = %call.name, error = %e, "Tool execution failed");
                    (format!("Error: {e}"), false)
                }
            },
        };

        transcript.push(Message::tool_result(&call.id, &output));
        self.publish(EventKind::ToolResult {
            id: call.id.clone(),
            name: call.name.clone(),
            output,
            success,
        })
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use workloom_core::error::ModelError;
    use workloom_core::message::Role;
    use workloom_core::model::{ModelResponse, Usage};
    use workloom_core::tool::{Tool, ToolOutput};

    /// A model that replays a fixed script of turns.
    struct ScriptedModel {
        script: Mutex<VecDeque<Result<ModelTurn, ModelError>>>,
        calls: AtomicU32,
    }

    impl ScriptedModel {
        fn new(turns: Vec<Result<ModelTurn, ModelError>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(turns.into()),
                calls: AtomicU32::new(0),
            })
        }

        fn turns_taken(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LanguageModel for ScriptedModel {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn complete(
            &self,
            _request: ModelRequest,
        ) -> std::result::Result<ModelResponse, ModelError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let turn = self
                .script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(ModelTurn::ToolUse {
                    content: None,
                    calls: vec![tool_call("call_loop", "echo", r#"{"text":"again"}"#)],
                }))?;
            Ok(ModelResponse {
                turn,
                model: "scripted-1".into(),
                usage: Some(Usage {
                    prompt_tokens: 10,
                    completion_tokens: 5,
                    total_tokens: 15,
                }),
            })
        }
    }

    fn tool_call(id: &str, name: &str, args: &str) -> ToolCallRequest {
        ToolCallRequest {
            id: id.into(),
            name: name.into(),
            raw_arguments: args.into(),
        }
    }

    struct EchoTool {
        invocations: Arc<AtomicU32>,
    }

    impl EchoTool {
        fn boxed() -> (Box<Self>, Arc<AtomicU32>) {
            let invocations = Arc::new(AtomicU32::new(0));
            (
                Box::new(Self {
                    invocations: invocations.clone(),
                }),
                invocations,
            )
        }
    }

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
                "properties": { "text": { "type": "string" } },
                "required": ["text"]
            })
        }
        async fn execute(
            &self,
            arguments: serde_json::Value,
        ) -> std::result::Result<ToolOutput, ToolError> {
            self.invocations.fetch_add(1, Ordering::SeqCst);
            Ok(ToolOutput::text(
                arguments["text"].as_str().unwrap_or("").to_string(),
            ))
        }
    }

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
                reason: "executor blew up".into(),
            })
        }
    }

    fn registry() -> Arc<ToolRegistry> {
        let mut r = ToolRegistry::new();
        let (echo, _) = EchoTool::boxed();
        r.register(echo).unwrap();
        r.register(Box::new(BrokenTool)).unwrap();
        Arc::new(r)
    }

    fn agent(model: Arc<ScriptedModel>, bus: Arc<WorkflowBus>) -> AgentLoop {
        AgentLoop::new(model, "scripted-1", registry(), bus, "wf-test")
    }

    /// Every tool-call request must be answered by exactly one tool message
    /// with the matching id before the next assistant message.
    fn assert_calls_paired(transcript: &Transcript) {
        let mut pending: Vec<String> = Vec::new();
        for msg in transcript.messages() {
            match msg.role {
                Role::Assistant => {
                    assert!(
                        pending.is_empty(),
                        "model turn requested while calls {pending:?} were unanswered"
                    );
                    pending = msg.tool_calls.iter().map(|c| c.id.clone()).collect();
                }
                Role::Tool => {
                    let id = msg.tool_call_id.as_deref().expect("tool message without call id");
                    let pos = pending
                        .iter()
                        .position(|p| p == id)
                        .unwrap_or_else(|| panic!("unmatched tool result for '{id}'"));
                    pending.remove(pos);
                }
                _ => {}
            }
        }
        assert!(pending.is_empty(), "unanswered calls at end: {pending:?}");
    }

    #[tokio::test]
    async fn echo_then_done() {
        let model = ScriptedModel::new(vec![
            Ok(ModelTurn::ToolUse {
                content: None,
                calls: vec![tool_call("call_1", "echo", r#"{"text":"hi"}"#)],
            }),
            Ok(ModelTurn::Reply {
                content: "done".into(),
            }),
        ]);
        let bus = Arc::new(WorkflowBus::default());
        let mut transcript = Transcript::new();
        transcript.push(Message::user("say hi"));

        let outcome = agent(model, bus).run(&mut transcript).await.unwrap();
        assert_eq!(
            outcome,
            LoopOutcome::Completed {
                reply: "done".into()
            }
        );

        // user, assistant(tool call), tool("hi"), assistant("done")
        let msgs = transcript.messages();
        assert_eq!(msgs.len(), 4);
        assert_eq!(msgs[1].role, Role::Assistant);
        assert_eq!(msgs[1].tool_calls.len(), 1);
        assert_eq!(msgs[2].role, Role::Tool);
        assert_eq!(msgs[2].text(), "hi");
        assert_eq!(msgs[2].tool_call_id.as_deref(), Some("call_1"));
        assert_eq!(msgs[3].text(), "done");
        assert_calls_paired(&transcript);
    }

    #[tokio::test]
    async fn multiple_calls_answered_in_emission_order() {
        let model = ScriptedModel::new(vec![
            Ok(ModelTurn::ToolUse {
                content: Some("running both".into()),
                calls: vec![
                    tool_call("call_a", "echo", r#"{"text":"first"}"#),
                    tool_call("call_b", "echo", r#"{"text":"second"}"#),
                ],
            }),
            Ok(ModelTurn::Reply {
                content: "ok".into(),
            }),
        ]);
        let bus = Arc::new(WorkflowBus::default());
        let mut transcript = Transcript::new();
        transcript.push(Message::user("go"));

        agent(model, bus).run(&mut transcript).await.unwrap();

        let tool_msgs: Vec<&Message> = transcript
            .messages()
            .iter()
            .filter(|m| m.role == Role::Tool)
            .collect();
        assert_eq!(tool_msgs.len(), 2);
        assert_eq!(tool_msgs[0].tool_call_id.as_deref(), Some("call_a"));
        assert_eq!(tool_msgs[0].text(), "first");
        assert_eq!(tool_msgs[1].tool_call_id.as_deref(), Some("call_b"));
        assert_eq!(tool_msgs[1].text(), "second");
        assert_calls_paired(&transcript);
    }

    #[tokio::test]
    async fn failing_executor_does_not_abort_the_loop() {
        let model = ScriptedModel::new(vec![
            Ok(ModelTurn::ToolUse {
                content: None,
                calls: vec![tool_call("call_1", "broken", "{}")],
            }),
            Ok(ModelTurn::Reply {
                content: "recovered".into(),
            }),
        ]);
        let bus = Arc::new(WorkflowBus::default());
        let mut transcript = Transcript::new();
        transcript.push(Message::user("try it"));

        let outcome = agent(model, bus).run(&mut transcript).await.unwrap();
        assert_eq!(
            outcome,
            LoopOutcome::Completed {
                reply: "recovered".into()
            }
        );

        let tool_msg = transcript
            .messages()
            .iter()
            .find(|m| m.role == Role::Tool)
            .expect("tool message present");
        assert!(tool_msg.text().contains("executor blew up"));
        assert_calls_paired(&transcript);
    }

    #[tokio::test]
    async fn unknown_tool_is_reported_not_fatal() {
        let model = ScriptedModel::new(vec![
            Ok(ModelTurn::ToolUse {
                content: None,
                calls: vec![tool_call("call_1", "ghost", "{}")],
            }),
            Ok(ModelTurn::Reply {
                content: "moving on".into(),
            }),
        ]);
        let bus = Arc::new(WorkflowBus::default());
        let mut transcript = Transcript::new();
        transcript.push(Message::user("use the ghost tool"));

        let outcome = agent(model, bus).run(&mut transcript).await.unwrap();
        assert!(matches!(outcome, LoopOutcome::Completed { .. }));

        let tool_msg = transcript
            .messages()
            .iter()
            .find(|m| m.role == Role::Tool)
            .expect("synthesized tool message");
        assert!(tool_msg.text().contains("Tool not found: ghost"));
    }

    #[tokio::test]
    async fn invalid_arguments_skip_the_executor() {
        let model = ScriptedModel::new(vec![
            Ok(ModelTurn::ToolUse {
                content: None,
                calls: vec![tool_call("call_1", "echo", r#"{"text":42}"#)],
            }),
            Ok(ModelTurn::Reply {
                content: "noted".into(),
            }),
        ]);
        let bus = Arc::new(WorkflowBus::default());

        let mut reg = ToolRegistry::new();
        let (echo, invocations) = EchoTool::boxed();
        reg.register(echo).unwrap();
        let agent = AgentLoop::new(model, "scripted-1", Arc::new(reg), bus, "wf-test");

        let mut transcript = Transcript::new();
        transcript.push(Message::user("go"));
        agent.run(&mut transcript).await.unwrap();

        let tool_msg = transcript
            .messages()
            .iter()
            .find(|m| m.role == Role::Tool)
            .expect("validation error tool message");
        assert!(tool_msg.text().contains("Invalid arguments"));
        assert_eq!(invocations.load(Ordering::SeqCst), 0, "executor never ran");
    }

    #[tokio::test]
    async fn step_ceiling_stops_after_exactly_n_turns() {
        // Empty script: the model falls through to "always request a tool".
        let model = ScriptedModel::new(vec![]);
        let bus = Arc::new(WorkflowBus::default());
        let mut transcript = Transcript::new();
        transcript.push(Message::user("loop forever"));

        let outcome = agent(model.clone(), bus)
            .with_max_steps(3)
            .run(&mut transcript)
            .await
            .unwrap();

        assert_eq!(outcome, LoopOutcome::MaxStepsReached);
        assert_eq!(model.turns_taken(), 3, "exactly N model turns, never N+1");
        assert_calls_paired(&transcript);
    }

    #[tokio::test]
    async fn model_failure_is_fatal_and_not_retried() {
        let model = ScriptedModel::new(vec![Err(ModelError::Network(
            "connection reset".into(),
        ))]);
        let bus = Arc::new(WorkflowBus::default());
        let mut transcript = Transcript::new();
        transcript.push(Message::user("hello"));

        let err = agent(model.clone(), bus)
            .run(&mut transcript)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("connection reset"));
        assert_eq!(model.turns_taken(), 1, "the loop never retries the model port");
    }

    #[tokio::test]
    async fn workflow_events_are_published_in_order() {
        let model = ScriptedModel::new(vec![
            Ok(ModelTurn::ToolUse {
                content: Some("thinking".into()),
                calls: vec![tool_call("call_1", "echo", r#"{"text":"hi"}"#)],
            }),
            Ok(ModelTurn::Reply {
                content: "done".into(),
            }),
        ]);
        let bus = Arc::new(WorkflowBus::default());

        let mut transcript = Transcript::new();
        transcript.push(Message::user("go"));
        agent(model, bus.clone()).run(&mut transcript).await.unwrap();

        let history = bus.history("wf-test").await;
        let names: Vec<&str> = history.iter().map(|e| e.event_name()).collect();
        assert_eq!(
            names,
            vec!["reasoning", "tool.call", "tool.result", "assistant_message"]
        );
    }
}
