//! The task coordinator (`spec.md` §4.7): owns one task's [`Workflow`],
//! stages its four nodes, and drives preparation, the ReAct engine,
//! auto-review, and persistence in sequence.
//!
//! Grounded on `neuron-orch-kit::OrchestratedRunner` and
//! `neuron-orch-local::LocalOrch`: a single entry point that assembles
//! the pipeline's stages and always returns a result, never a bare
//! error, because every early return still carries a workflow snapshot.

use crate::error::CoordError;
use cortex_core::ports::{Listener, SessionStore};
use cortex_core::task_state::TaskState;
use cortex_core::workflow_model::WorkflowSnapshot;
use cortex_core::id::IdGenerator;
use cortex_prep::{PrepareRequest, Preparer};
use cortex_react::{Engine, EngineConfig, ReactError, StopReason};
use cortex_reviewer::Reviewer;
use cortex_workflow::{Translator, Workflow, WorkflowContext};
use layer0::hook::Hook;
use layer0::id::{SessionId, TaskId, WorkflowId};
use layer0::session::{Message, MessageSource, Role};
use layer0::usage::Assessment;
use serde_json::json;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// One task invocation for [`Coordinator::execute_task`].
pub struct ExecuteTaskRequest {
    /// Session this task runs against. Always concrete — the
    /// create-on-empty convenience [`PrepareRequest::session_id`]
    /// offers is a preparer-internal affordance; a coordinator caller
    /// always knows which session it's continuing.
    pub session_id: SessionId,
    /// The task this invocation answers.
    pub task_id: TaskId,
    /// Parent task, when this is a subagent invocation.
    pub parent_task_id: Option<TaskId>,
    /// Free-text description of what the task should accomplish.
    pub task_description: String,
    /// The base system prompt before any persona override.
    pub base_system_prompt: String,
    /// Whether this invocation runs inside a subagent context.
    pub is_subagent: bool,
    /// Task state snapshot to inherit from, for subagent invocations.
    pub inherited_state: Option<TaskState>,
    /// Persona preset name from the calling context.
    pub persona_context: Option<String>,
    /// Tool preset name from the calling context.
    pub tool_preset_context: Option<String>,
    /// Nesting depth: 0 for a top-level task.
    pub agent_level: u32,
    /// Receiver of this task's translated workflow events.
    pub listener: Arc<dyn Listener>,
    /// Cooperative cancellation, checked at every engine suspension point.
    pub cancellation: CancellationToken,
}

/// The terminal outcome of one [`Coordinator::execute_task`] call.
#[derive(Debug, Clone)]
pub enum TaskOutcome {
    /// The task ran to completion, possibly after reviewer-driven rework.
    Succeeded {
        /// The final assistant answer.
        answer: String,
        /// Why the last engine invocation stopped.
        stop_reason: StopReason,
        /// Iterations completed across every attempt, original plus rework.
        iterations_completed: u32,
        /// The reviewer's final assessment of `answer`.
        review: Assessment,
    },
    /// A stage failed before a final answer could be produced.
    Failed {
        /// A human-readable description of what went wrong.
        error: String,
    },
    /// The run was cancelled before it completed.
    Cancelled,
}

/// Everything [`Coordinator::execute_task`] returns: the outcome plus
/// the workflow's final snapshot, attached on every path including
/// early failure and cancellation (`spec.md` §5).
#[derive(Debug, Clone)]
pub struct ExecuteTaskResult {
    /// How the task ended.
    pub outcome: TaskOutcome,
    /// The workflow's node-by-node state at the point of return.
    pub snapshot: WorkflowSnapshot,
    /// Cumulative tokens consumed across every model call this task made.
    pub tokens_used: u64,
}

/// Drives one task end to end: `prepare` -> `execute` -> `summarize` ->
/// `persist`, against a workflow it creates and owns for the task's
/// lifetime.
///
/// Stateless across calls aside from its collaborators — one
/// `Coordinator` is typically built once per process and shared via
/// `Arc` across concurrently executing tasks, each of which gets its
/// own `Workflow`.
pub struct Coordinator {
    preparer: Arc<Preparer>,
    session_store: Arc<dyn SessionStore>,
    reviewer: Arc<Reviewer>,
    hooks: Vec<Arc<dyn Hook>>,
    engine_config: EngineConfig,
    ids: IdGenerator,
}

impl Coordinator {
    /// Build a coordinator from its collaborators.
    ///
    /// `session_store` must be the same store instance `preparer` was
    /// built with — `Preparer` doesn't expose the one it holds, and the
    /// persist stage needs its own handle to save the final session.
    pub fn new(
        preparer: Arc<Preparer>,
        session_store: Arc<dyn SessionStore>,
        reviewer: Arc<Reviewer>,
        hooks: Vec<Arc<dyn Hook>>,
        engine_config: EngineConfig,
    ) -> Self {
        Self {
            preparer,
            session_store,
            reviewer,
            hooks,
            engine_config,
            ids: IdGenerator::new(),
        }
    }

    /// Run one task to completion.
    pub async fn execute_task(&self, req: ExecuteTaskRequest) -> ExecuteTaskResult {
        let run_id = self.ids.next(now_millis());
        let workflow_id = WorkflowId::new(format!("wf-{}", req.task_id.as_str()));
        let context = WorkflowContext {
            run_id: run_id.clone(),
            session_id: req.session_id.clone(),
            task_id: req.task_id.clone(),
            parent_task_id: req.parent_task_id.clone(),
            agent_level: req.agent_level,
        };
        let workflow = Arc::new(Workflow::new(workflow_id.clone(), context));
        let translator = Arc::new(Translator::new(Arc::clone(&req.listener)));
        workflow.add_listener(translator).await;

        for node in ["prepare", "execute", "summarize", "persist"] {
            if let Err(err) = workflow.add_node(node, None).await {
                return self
                    .finalize(&workflow, TaskOutcome::Failed { error: err.to_string() }, 0)
                    .await;
            }
        }

        if workflow.start_node("prepare").await.is_err() {
            return self
                .finalize(&workflow, TaskOutcome::Failed { error: "prepare node already started".into() }, 0)
                .await;
        }

        let prepare_request = PrepareRequest {
            session_id: Some(req.session_id.clone()),
            task_id: req.task_id.clone(),
            parent_task_id: req.parent_task_id.clone(),
            task_description: req.task_description.clone(),
            base_system_prompt: req.base_system_prompt.clone(),
            is_subagent: req.is_subagent,
            inherited_state: req.inherited_state.clone(),
            persona_context: req.persona_context.clone(),
            tool_preset_context: req.tool_preset_context.clone(),
            workflow_id: workflow_id.clone(),
            run_id: run_id.clone(),
            agent_level: req.agent_level,
            listener: Arc::clone(&req.listener),
        };

        let mut env = match self.preparer.prepare(prepare_request).await {
            Ok(env) => env,
            Err(err) => {
                let err = CoordError::from(err);
                workflow
                    .complete_node_failure("prepare", Some(json!({"error": err.to_string()})))
                    .await
                    .ok();
                self.fail_remaining(&workflow, &["execute", "summarize", "persist"], &err.to_string())
                    .await;
                return self
                    .finalize(&workflow, TaskOutcome::Failed { error: err.to_string() }, 0)
                    .await;
            }
        };
        workflow.complete_node_success("prepare", None).await.ok();

        env.state.messages.push(Message::new(
            Role::User,
            req.task_description.clone(),
            MessageSource::UserInput,
        ));

        if workflow.start_node("execute").await.is_err() {
            return self
                .finalize(&workflow, TaskOutcome::Failed { error: "execute node already started".into() }, env.state.tokens_used)
                .await;
        }

        let mut engine_config = self.engine_config.clone();
        engine_config.attempt = 0;
        let engine = Engine::new(Arc::clone(&workflow), self.build_hooks(), engine_config.clone());

        let react_result = match engine.solve(&mut env.state, &env.services, &req.cancellation).await {
            Ok(result) => result,
            Err(ReactError::Cancelled) => {
                self.fail_remaining(&workflow, &["summarize", "persist"], "cancelled").await;
                return self
                    .finalize(&workflow, TaskOutcome::Cancelled, env.state.tokens_used)
                    .await;
            }
            Err(err) => {
                let err = CoordError::from(err);
                self.fail_remaining(&workflow, &["summarize", "persist"], &err.to_string())
                    .await;
                return self
                    .finalize(&workflow, TaskOutcome::Failed { error: err.to_string() }, env.state.tokens_used)
                    .await;
            }
        };
        workflow
            .complete_node_success(
                "execute",
                Some(json!({
                    "stop_reason": react_result.stop_reason.as_str(),
                    "iterations_completed": react_result.iterations_completed,
                })),
            )
            .await
            .ok();

        if workflow.start_node("summarize").await.is_err() {
            return self
                .finalize(&workflow, TaskOutcome::Failed { error: "summarize node already started".into() }, env.state.tokens_used)
                .await;
        }

        let mut answer = last_assistant_text(&env.state.messages);
        let mut stop_reason = react_result.stop_reason;
        let mut iterations_completed = react_result.iterations_completed;
        let mut assessment = self
            .reviewer
            .assess(&answer, stop_reason, iterations_completed);
        let mut attempts_made = 0u32;

        while assessment.needs_rework && self.reviewer.rework_allowed(attempts_made) {
            attempts_made += 1;

            let prompt = self
                .reviewer
                .build_rework_prompt(&req.task_description, &assessment, &answer);
            env.state
                .messages
                .push(Message::new(Role::User, prompt, MessageSource::UserInput));
            env.state
                .feedback_signals
                .push(format!("rework attempt {attempts_made}: {:?} ({:.2})", assessment.grade, assessment.score));

            let mut rework_config = engine_config.clone();
            rework_config.attempt = attempts_made;
            let rework_engine = Engine::new(Arc::clone(&workflow), self.build_hooks(), rework_config);

            match rework_engine.solve(&mut env.state, &env.services, &req.cancellation).await {
                Ok(result) => {
                    stop_reason = result.stop_reason;
                    iterations_completed += result.iterations_completed;
                    answer = last_assistant_text(&env.state.messages);
                    assessment = self.reviewer.assess(&answer, stop_reason, result.iterations_completed);
                }
                Err(ReactError::Cancelled) => {
                    workflow
                        .complete_node_failure("summarize", Some(json!({"error": "cancelled"})))
                        .await
                        .ok();
                    self.fail_remaining(&workflow, &["persist"], "cancelled").await;
                    return self
                        .finalize(&workflow, TaskOutcome::Cancelled, env.state.tokens_used)
                        .await;
                }
                Err(err) => {
                    let err = CoordError::from(err);
                    workflow
                        .complete_node_failure("summarize", Some(json!({"error": err.to_string()})))
                        .await
                        .ok();
                    self.fail_remaining(&workflow, &["persist"], &err.to_string()).await;
                    return self
                        .finalize(&workflow, TaskOutcome::Failed { error: err.to_string() }, env.state.tokens_used)
                        .await;
                }
            }
        }

        workflow
            .complete_node_success(
                "summarize",
                Some(json!({
                    "grade": format!("{:?}", assessment.grade),
                    "score": assessment.score,
                    "attempts_made": attempts_made,
                })),
            )
            .await
            .ok();

        if workflow.start_node("persist").await.is_err() {
            return self
                .finalize(&workflow, TaskOutcome::Failed { error: "persist node already started".into() }, env.state.tokens_used)
                .await;
        }

        if req.is_subagent {
            workflow
                .complete_node_success("persist", Some(json!({"skipped": true})))
                .await
                .ok();
        } else {
            let mut session = env.session;
            session.messages = std::mem::take(&mut env.state.messages);

            let mut messages: Vec<Message> = session.persistable_messages().cloned().collect();
            for msg in &mut messages {
                for attachment in msg.attachments.drain(..) {
                    session.attachments.entry(attachment.name.clone()).or_insert(attachment);
                }
            }
            session.messages = messages;

            session
                .metadata
                .insert("session_id".to_string(), session.id.as_str().to_string());
            session.metadata.insert("last_task_id".to_string(), req.task_id.as_str().to_string());
            match &req.parent_task_id {
                Some(parent) => {
                    session
                        .metadata
                        .insert("last_parent_task_id".to_string(), parent.as_str().to_string());
                }
                None => {
                    session.metadata.remove("last_parent_task_id");
                }
            }
            session.updated_at = now_millis();

            match self.session_store.save(&session).await {
                Ok(()) => {
                    workflow.complete_node_success("persist", None).await.ok();
                }
                Err(err) => {
                    let err = CoordError::from(err);
                    workflow
                        .complete_node_failure("persist", Some(json!({"error": err.to_string()})))
                        .await
                        .ok();
                    return self
                        .finalize(&workflow, TaskOutcome::Failed { error: err.to_string() }, env.state.tokens_used)
                        .await;
                }
            }
        }

        let outcome = TaskOutcome::Succeeded {
            answer,
            stop_reason,
            iterations_completed,
            review: assessment,
        };
        self.finalize(&workflow, outcome, env.state.tokens_used).await
    }

    fn build_hooks(&self) -> cortex_react::HookRegistry {
        let mut registry = cortex_react::HookRegistry::new();
        for hook in &self.hooks {
            registry.add(Arc::clone(hook));
        }
        registry
    }

    async fn fail_remaining(&self, workflow: &Workflow, nodes: &[&str], reason: &str) {
        for node in nodes {
            workflow
                .complete_node_failure(node, Some(json!({"error": reason})))
                .await
                .ok();
        }
    }

    async fn finalize(&self, workflow: &Workflow, outcome: TaskOutcome, tokens_used: u64) -> ExecuteTaskResult {
        ExecuteTaskResult {
            snapshot: workflow.snapshot().await,
            outcome,
            tokens_used,
        }
    }
}

fn last_assistant_text(messages: &[Message]) -> String {
    messages
        .iter()
        .rev()
        .find(|m| m.role == Role::Assistant)
        .map(|m| m.content.clone())
        .unwrap_or_default()
}

fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cortex_core::ports::ModelClientFactory;
    use cortex_core::test_utils::{EchoModelClient, InMemorySessionStore};
    use cortex_cost::{CostTracker, PricingTable};
    use cortex_context::SlidingWindow;
    use cortex_preset::PresetCatalog;
    use cortex_prep::PrepConfig;
    use cortex_tool::Registry;

    struct EchoFactory {
        client: Arc<dyn cortex_core::ports::ModelClient>,
    }

    impl ModelClientFactory for EchoFactory {
        fn get_client(&self) -> Arc<dyn cortex_core::ports::ModelClient> {
            Arc::clone(&self.client)
        }

        fn get_isolated_client(&self) -> Arc<dyn cortex_core::ports::ModelClient> {
            Arc::clone(&self.client)
        }

        fn disable_retry(&self) {}
    }

    struct EmptyCatalog;

    impl PresetCatalog for EmptyCatalog {
        fn persona(&self, _name: &str) -> Option<String> {
            None
        }

        fn tool_names(&self, _name: &str) -> Option<Vec<String>> {
            None
        }
    }

    fn build_coordinator(store: Arc<InMemorySessionStore>, min_passing_score: f64) -> Coordinator {
        let preparer = Arc::new(Preparer::new(
            store.clone(),
            Arc::new(EchoFactory {
                client: Arc::new(EchoModelClient::new("echo-model")),
            }),
            Arc::new(SlidingWindow::new()),
            Arc::new(Registry::new()),
            Arc::new(EmptyCatalog),
            None,
            Arc::new(CostTracker::new()),
            Arc::new(PricingTable::empty()),
            PrepConfig {
                enable_pre_analysis: false,
                enable_rag_preload: false,
                ..PrepConfig::default()
            },
        ));
        let reviewer = Arc::new(Reviewer::new(cortex_reviewer::ReviewerConfig {
            min_passing_score,
            ..cortex_reviewer::ReviewerConfig::default()
        }));
        Coordinator::new(
            preparer,
            store,
            reviewer,
            vec![],
            EngineConfig {
                max_iterations: 3,
                ..EngineConfig::default()
            },
        )
    }

    fn basic_request(session_id: SessionId) -> ExecuteTaskRequest {
        ExecuteTaskRequest {
            session_id,
            task_id: TaskId::new("task-1"),
            parent_task_id: None,
            task_description: "Explain how sliding window compression works in detail, please.".into(),
            base_system_prompt: "You are a helpful assistant.".into(),
            is_subagent: false,
            inherited_state: None,
            persona_context: None,
            tool_preset_context: None,
            agent_level: 0,
            listener: Arc::new(cortex_core::ports::NullListener),
            cancellation: CancellationToken::new(),
        }
    }

    #[tokio::test]
    async fn happy_path_completes_all_four_stages_and_persists() {
        let store = Arc::new(InMemorySessionStore::new());
        let session = store.create().await.unwrap();
        let coordinator = build_coordinator(Arc::clone(&store), 0.0);

        let req = basic_request(session.id.clone());
        let result = coordinator.execute_task(req).await;

        match &result.outcome {
            TaskOutcome::Succeeded { answer, .. } => assert!(answer.starts_with("echo:")),
            other => panic!("expected Succeeded, got {other:?}"),
        }
        assert_eq!(result.snapshot.phase, cortex_core::NodeStatus::Succeeded);
        for node in ["prepare", "execute", "summarize", "persist"] {
            assert_eq!(result.snapshot.nodes[node].status, cortex_core::NodeStatus::Succeeded);
        }

        let saved = store.get(&session.id).await.unwrap();
        assert!(saved.messages.iter().any(|m| m.role == Role::Assistant));
        assert_eq!(saved.metadata.get("last_task_id").map(String::as_str), Some("task-1"));
    }

    #[tokio::test]
    async fn short_answer_triggers_rework_then_succeeds() {
        let store = Arc::new(InMemorySessionStore::new());
        let session = store.create().await.unwrap();
        let coordinator = build_coordinator(Arc::clone(&store), 0.99);

        let req = basic_request(session.id.clone());
        let result = coordinator.execute_task(req).await;

        match &result.outcome {
            TaskOutcome::Succeeded { review, .. } => assert_eq!(review.notes.is_empty(), false),
            other => panic!("expected Succeeded, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn subagent_invocation_skips_persist() {
        let store = Arc::new(InMemorySessionStore::new());
        let session = store.create().await.unwrap();
        let coordinator = build_coordinator(Arc::clone(&store), 0.0);

        let mut req = basic_request(session.id.clone());
        req.is_subagent = true;
        req.parent_task_id = Some(TaskId::new("parent-1"));

        let result = coordinator.execute_task(req).await;

        assert!(matches!(result.outcome, TaskOutcome::Succeeded { .. }));
        assert_eq!(
            result.snapshot.nodes["persist"].output,
            Some(serde_json::json!({"skipped": true}))
        );

        let saved = store.get(&session.id).await.unwrap();
        assert!(saved.messages.is_empty());
    }

    #[tokio::test]
    async fn prepare_failure_fails_remaining_nodes_from_pending() {
        let store = Arc::new(InMemorySessionStore::new());
        let coordinator = build_coordinator(Arc::clone(&store), 0.0);

        let mut req = basic_request(SessionId::new("does-not-exist"));
        req.persona_context = None;

        let result = coordinator.execute_task(req).await;

        assert!(matches!(result.outcome, TaskOutcome::Failed { .. }));
        for node in ["execute", "summarize", "persist"] {
            assert_eq!(result.snapshot.nodes[node].status, cortex_core::NodeStatus::Failed);
        }
    }
}
