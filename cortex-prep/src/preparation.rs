//! The Execution Preparation pipeline itself (`spec.md` §4.5): the
//! eight-step algorithm [`Preparer::prepare`] runs before every ReAct
//! invocation, top-level or subagent.

use crate::analysis::{self, TaskAnalysis};
use crate::error::PrepError;
use crate::history;
use crate::rag::{self, RagDirectives};
use cortex_core::event::NodeKind;
use cortex_core::ports::{ContextManager, FunctionCallParser, Listener, ModelClient, ModelClientFactory, SessionStore};
use cortex_core::task_state::TaskState;
use cortex_core::EventEnvelope;
use cortex_cost::{CostTrackingClient, CostTracker, PricingTable};
use cortex_preset::{PresetCatalog, Resolver};
use cortex_tool::{Limiter, Registry};
use layer0::id::{SessionId, TaskId, WorkflowId};
use layer0::session::Session;
use serde_json::json;
use std::sync::Arc;

/// Tunables for [`Preparer`]. One instance is typically built once per
/// process and shared across tasks.
#[derive(Debug, Clone)]
pub struct PrepConfig {
    /// The model's context window, in tokens, used both for compression
    /// (step 2) and history recall's summarize/inline threshold (step 5).
    pub token_limit: u64,
    /// Whether to run pre-analysis (step 4) at all.
    pub enable_pre_analysis: bool,
    /// Whether to run RAG preload (step 8) at all.
    pub enable_rag_preload: bool,
    /// Persona preset name from static configuration (lowest priority).
    pub persona_config: Option<String>,
    /// Tool preset name from static configuration (lowest priority).
    pub tool_preset_config: Option<String>,
    /// Name of the tool that spawns a subagent, removed before preset
    /// filtering when preparing a subagent invocation.
    pub subagent_tool_name: String,
    /// Bound on concurrently executing tool calls (`<= 0` means unbounded).
    pub tool_concurrency_limit: i64,
}

impl Default for PrepConfig {
    fn default() -> Self {
        Self {
            token_limit: 128_000,
            enable_pre_analysis: true,
            enable_rag_preload: true,
            persona_config: None,
            tool_preset_config: None,
            subagent_tool_name: "spawn_subagent".to_string(),
            tool_concurrency_limit: 0,
        }
    }
}

/// One preparation request.
pub struct PrepareRequest {
    /// Session id to load, or `None`/empty to create a fresh session.
    pub session_id: Option<SessionId>,
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
    /// Persona preset name from the calling context (highest priority).
    pub persona_context: Option<String>,
    /// Tool preset name from the calling context (highest priority).
    pub tool_preset_context: Option<String>,
    /// The workflow this preparation pass runs under, for diagnostic
    /// envelopes.
    pub workflow_id: WorkflowId,
    /// Correlation id for the enclosing run.
    pub run_id: String,
    /// Nesting depth: 0 for a top-level task.
    pub agent_level: u32,
    /// Translator-wrapped listener shared with the engine and workflow.
    pub listener: Arc<dyn Listener>,
}

/// Everything a ReAct invocation needs to run, assembled by
/// [`Preparer::prepare`].
pub struct ExecutionEnvironment {
    /// The task's working state.
    pub state: TaskState,
    /// The model/tools/parser/limiter the engine drives.
    pub services: cortex_react::Services,
    /// The context manager, for any window-building the caller does
    /// beyond what preparation already ran.
    pub context: Arc<dyn ContextManager>,
    /// The (possibly freshly created) session, with recall history
    /// appended to its working copy.
    pub session: Session,
    /// Pre-analysis result, if pre-analysis ran and parsed successfully.
    pub task_analysis: Option<TaskAnalysis>,
    /// RAG directives derived from pre-analysis, if any were found.
    pub rag_directives: Option<RagDirectives>,
}

/// Runs the eight-step Execution Preparation algorithm.
pub struct Preparer {
    session_store: Arc<dyn SessionStore>,
    model_factory: Arc<dyn ModelClientFactory>,
    context: Arc<dyn ContextManager>,
    tool_registry: Arc<Registry>,
    preset_catalog: Arc<dyn PresetCatalog>,
    parser: Option<Arc<dyn FunctionCallParser>>,
    cost_tracker: Arc<CostTracker>,
    pricing: Arc<PricingTable>,
    config: PrepConfig,
}

impl Preparer {
    /// Build a preparer from its external collaborators.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        session_store: Arc<dyn SessionStore>,
        model_factory: Arc<dyn ModelClientFactory>,
        context: Arc<dyn ContextManager>,
        tool_registry: Arc<Registry>,
        preset_catalog: Arc<dyn PresetCatalog>,
        parser: Option<Arc<dyn FunctionCallParser>>,
        cost_tracker: Arc<CostTracker>,
        pricing: Arc<PricingTable>,
        config: PrepConfig,
    ) -> Self {
        Self {
            session_store,
            model_factory,
            context,
            tool_registry,
            preset_catalog,
            parser,
            cost_tracker,
            pricing,
            config,
        }
    }

    /// Run preparation for one task invocation.
    pub async fn prepare(&self, req: PrepareRequest) -> Result<ExecutionEnvironment, PrepError> {
        let mut session = self.acquire_session(&req).await?;

        self.compress_if_needed(&mut session, &req).await?;

        let isolated: Arc<dyn ModelClient> = Arc::new(CostTrackingClient::new(
            self.model_factory.get_isolated_client(),
            session.id.clone(),
            Arc::clone(&self.cost_tracker),
            Arc::clone(&self.pricing),
        ));

        let task_analysis = if self.config.enable_pre_analysis {
            analysis::run_pre_analysis(isolated.as_ref(), &req.task_description).await
        } else {
            None
        };

        let recalled = history::recall_history(&session, self.config.token_limit, self.context.as_ref(), isolated.as_ref()).await;
        session.messages.extend(recalled);

        let mut state = TaskState::new(session.id.clone(), req.base_system_prompt.clone());
        state.messages = session.messages.clone();

        if req.is_subagent {
            if let Some(parent) = &req.inherited_state {
                state.merge_inherited(parent);
            }
        }

        if let Some(persona) = Resolver::resolve_persona(
            req.persona_context.as_deref(),
            self.config.persona_config.as_deref(),
            self.preset_catalog.as_ref(),
        )? {
            state.system_prompt = persona;
        }

        let tool_resolution = Resolver::resolve_tool_preset(
            req.tool_preset_context.as_deref(),
            self.config.tool_preset_config.as_deref(),
            &self.tool_registry,
            req.is_subagent,
            &self.config.subagent_tool_name,
            self.preset_catalog.as_ref(),
        )?;

        if let Some(diagnostic) = &tool_resolution.diagnostic {
            self.emit_diagnostic(
                &req,
                &session.id,
                "diagnostic_tool_filtering",
                json!({
                    "preset_name": diagnostic.preset_name,
                    "original_count": diagnostic.original_count,
                    "filtered_count": diagnostic.filtered_count,
                    "retained_ratio": diagnostic.retained_ratio,
                    "filtered_tool_names": diagnostic.filtered_tool_names,
                }),
            )
            .await;
        }

        let rag_directives = task_analysis.as_ref().and_then(rag::derive_directives);
        if self.config.enable_rag_preload {
            if let Some(directives) = &rag_directives {
                let preload = rag::run_rag_preload(
                    directives,
                    tool_resolution.registry.as_ref(),
                    isolated.as_ref(),
                    session.id.clone(),
                    req.task_id.clone(),
                )
                .await;
                state.messages.extend(preload.messages);
                state.plans.push(format!("retrieval: {}", directives.summary));
                session
                    .metadata
                    .insert("rag_directive_summary".to_string(), directives.summary.clone());
                session.metadata.insert("rag_preload_note".to_string(), preload.note);
            }
        }

        let services = cortex_react::Services {
            model: isolated,
            tools: tool_resolution.registry,
            parser: self.parser.clone(),
            limiter: Arc::new(Limiter::new(self.config.tool_concurrency_limit)),
        };

        Ok(ExecutionEnvironment {
            state,
            services,
            context: Arc::clone(&self.context),
            session,
            task_analysis,
            rag_directives,
        })
    }

    async fn acquire_session(&self, req: &PrepareRequest) -> Result<Session, PrepError> {
        match &req.session_id {
            Some(id) if !id.as_str().is_empty() => Ok(self.session_store.get(id).await?),
            _ => Ok(self.session_store.create().await?),
        }
    }

    async fn compress_if_needed(&self, session: &mut Session, req: &PrepareRequest) -> Result<(), PrepError> {
        if !self.context.should_compress(&session.messages, self.config.token_limit) {
            return Ok(());
        }

        let original_count = session.messages.len();
        let target = self.config.token_limit * 80 / 100;
        let compressed = self.context.compress(&session.messages, target).await?;
        let compressed_count = compressed.len();
        session.messages = compressed;

        let session_id = session.id.clone();
        self.emit_diagnostic(
            req,
            &session_id,
            "diagnostic_context_compression",
            json!({
                "original_count": original_count,
                "compressed_count": compressed_count,
            }),
        )
        .await;

        Ok(())
    }

    async fn emit_diagnostic(
        &self,
        req: &PrepareRequest,
        session_id: &SessionId,
        event: &str,
        payload: serde_json::Value,
    ) {
        let envelope = EventEnvelope::new(
            event,
            req.workflow_id.clone(),
            req.run_id.clone(),
            session_id.clone(),
            req.task_id.clone(),
            req.parent_task_id.clone(),
            req.agent_level,
            now_millis(),
        )
        .with_node("prepare", NodeKind::Node)
        .with_payload(payload);

        req.listener.on_event(envelope).await;
    }
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
    use async_trait::async_trait;
    use cortex_core::error::{ModelError, ToolPortError};
    use cortex_core::ports::{CompletionResponse, ModelClientFactory, ToolDefinition, ToolExecutor, Usage};
    use cortex_core::test_utils::InMemorySessionStore;
    use cortex_core::tool_call::{ToolCall, ToolResult};
    use cortex_cost::{CostTracker, PricingTable};
    use cortex_context::SlidingWindow;
    use cortex_preset::PresetCatalog;
    use layer0::session::{Message, MessageSource, Role};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Mutex as AsyncMutex;

    struct StubTool(&'static str);

    #[async_trait]
    impl ToolExecutor for StubTool {
        fn definition(&self) -> ToolDefinition {
            ToolDefinition::new(self.0.to_string(), "stub", serde_json::json!({"type": "object"}))
        }

        async fn execute(&self, call: &ToolCall) -> Result<ToolResult, ToolPortError> {
            Ok(ToolResult::success(&call.id, "ok"))
        }
    }

    struct ScriptedModelClient {
        model: String,
        responses: AsyncMutex<Vec<CompletionResponse>>,
        calls: AtomicUsize,
    }

    impl ScriptedModelClient {
        fn new(responses: Vec<CompletionResponse>) -> Self {
            Self {
                model: "scripted-model".into(),
                responses: AsyncMutex::new(responses),
                calls: AtomicUsize::new(0),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ModelClient for ScriptedModelClient {
        async fn complete(&self, _request: CompletionRequest) -> Result<CompletionResponse, ModelError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut responses = self.responses.lock().await;
            if responses.is_empty() {
                return Ok(plain_response("no more scripted responses"));
            }
            Ok(responses.remove(0))
        }

        fn model(&self) -> &str {
            &self.model
        }
    }

    struct EchoFactory {
        client: Arc<dyn ModelClient>,
    }

    impl ModelClientFactory for EchoFactory {
        fn get_client(&self) -> Arc<dyn ModelClient> {
            Arc::clone(&self.client)
        }

        fn get_isolated_client(&self) -> Arc<dyn ModelClient> {
            Arc::clone(&self.client)
        }

        fn disable_retry(&self) {}
    }

    struct FakeCatalog {
        persona: Option<(&'static str, &'static str)>,
        tool_preset: Option<(&'static str, Vec<&'static str>)>,
    }

    impl PresetCatalog for FakeCatalog {
        fn persona(&self, name: &str) -> Option<String> {
            self.persona
                .and_then(|(n, text)| if n == name { Some(text.to_string()) } else { None })
        }

        fn tool_names(&self, name: &str) -> Option<Vec<String>> {
            self.tool_preset.as_ref().and_then(|(n, names)| {
                if *n == name {
                    Some(names.iter().map(|s| s.to_string()).collect())
                } else {
                    None
                }
            })
        }
    }

    fn plain_response(content: &str) -> CompletionResponse {
        CompletionResponse {
            content: content.to_string(),
            tool_calls: vec![],
            stop_reason: "end_turn".into(),
            usage: Usage::new(5, 5),
        }
    }

    fn no_analysis_no_rag_config() -> PrepConfig {
        PrepConfig {
            enable_pre_analysis: false,
            enable_rag_preload: false,
            ..PrepConfig::default()
        }
    }

    #[derive(Default)]
    struct RecordingListener {
        events: AsyncMutex<Vec<EventEnvelope>>,
    }

    #[async_trait]
    impl Listener for RecordingListener {
        async fn on_event(&self, event: EventEnvelope) {
            self.events.lock().await.push(event);
        }
    }

    fn build_preparer(
        store: Arc<InMemorySessionStore>,
        client: Arc<dyn ModelClient>,
        catalog: Arc<dyn PresetCatalog>,
        registry: Arc<Registry>,
        config: PrepConfig,
    ) -> Preparer {
        Preparer::new(
            store,
            Arc::new(EchoFactory { client }),
            Arc::new(SlidingWindow::new()),
            registry,
            catalog,
            None,
            Arc::new(CostTracker::new()),
            Arc::new(PricingTable::empty()),
            config,
        )
    }

    fn base_request(workflow_id: WorkflowId, listener: Arc<dyn Listener>) -> PrepareRequest {
        PrepareRequest {
            session_id: None,
            task_id: TaskId::new("task-1"),
            parent_task_id: None,
            task_description: "Summarize the quarterly report.".into(),
            base_system_prompt: "You are a helpful assistant.".into(),
            is_subagent: false,
            inherited_state: None,
            persona_context: None,
            tool_preset_context: None,
            workflow_id,
            run_id: "run-1".into(),
            agent_level: 0,
            listener,
        }
    }

    #[tokio::test]
    async fn creates_a_fresh_session_when_none_requested() {
        let store = Arc::new(InMemorySessionStore::new());
        let preparer = build_preparer(
            Arc::clone(&store),
            Arc::new(ScriptedModelClient::new(vec![])),
            Arc::new(FakeCatalog { persona: None, tool_preset: None }),
            Arc::new(Registry::new()),
            no_analysis_no_rag_config(),
        );

        let req = base_request(WorkflowId::new("wf-1"), Arc::new(cortex_core::ports::NullListener));
        let env = preparer.prepare(req).await.unwrap();

        assert!(store.get(&env.session.id).await.is_ok());
        assert_eq!(env.state.system_prompt, "You are a helpful assistant.");
        assert!(env.task_analysis.is_none());
        assert!(env.rag_directives.is_none());
    }

    #[tokio::test]
    async fn loads_an_existing_session_by_id() {
        let store = Arc::new(InMemorySessionStore::new());
        let existing = store.create().await.unwrap();
        let preparer = build_preparer(
            Arc::clone(&store),
            Arc::new(ScriptedModelClient::new(vec![])),
            Arc::new(FakeCatalog { persona: None, tool_preset: None }),
            Arc::new(Registry::new()),
            no_analysis_no_rag_config(),
        );

        let mut req = base_request(WorkflowId::new("wf-1"), Arc::new(cortex_core::ports::NullListener));
        req.session_id = Some(existing.id.clone());
        let env = preparer.prepare(req).await.unwrap();

        assert_eq!(env.session.id, existing.id);
    }

    #[tokio::test]
    async fn unknown_session_id_fails_preparation() {
        let store = Arc::new(InMemorySessionStore::new());
        let preparer = build_preparer(
            Arc::clone(&store),
            Arc::new(ScriptedModelClient::new(vec![])),
            Arc::new(FakeCatalog { persona: None, tool_preset: None }),
            Arc::new(Registry::new()),
            no_analysis_no_rag_config(),
        );

        let mut req = base_request(WorkflowId::new("wf-1"), Arc::new(cortex_core::ports::NullListener));
        req.session_id = Some(SessionId::new("does-not-exist"));

        let err = preparer.prepare(req).await.unwrap_err();
        assert!(matches!(err, PrepError::SessionStore(_)));
    }

    #[tokio::test]
    async fn compression_trims_history_and_emits_diagnostic() {
        let store = Arc::new(InMemorySessionStore::new());
        let mut session = store.create().await.unwrap();
        for i in 0..200 {
            session.messages.push(Message::new(
                Role::User,
                format!("message number {i} with some padding text to inflate token estimates"),
                MessageSource::UserInput,
            ));
        }
        store.save(&session).await.unwrap();

        let preparer = build_preparer(
            Arc::clone(&store),
            Arc::new(ScriptedModelClient::new(vec![])),
            Arc::new(FakeCatalog { persona: None, tool_preset: None }),
            Arc::new(Registry::new()),
            PrepConfig {
                token_limit: 200,
                ..no_analysis_no_rag_config()
            },
        );

        let listener = Arc::new(RecordingListener::default());
        let mut req = base_request(WorkflowId::new("wf-1"), listener.clone());
        req.session_id = Some(session.id.clone());

        let env = preparer.prepare(req).await.unwrap();

        assert!(env.session.messages.len() < 200);
        let events = listener.events.lock().await;
        assert!(events.iter().any(|e| e.event == "diagnostic_context_compression"));
    }

    #[tokio::test]
    async fn pre_analysis_runs_when_enabled_and_parses_the_model_response() {
        let store = Arc::new(InMemorySessionStore::new());
        let analysis_response = plain_response(
            "<task_analysis><action>summarize</action><goal>report</goal>\
             <approach>read then condense</approach></task_analysis>",
        );
        let client = Arc::new(ScriptedModelClient::new(vec![analysis_response]));
        let preparer = build_preparer(
            Arc::clone(&store),
            client,
            Arc::new(FakeCatalog { persona: None, tool_preset: None }),
            Arc::new(Registry::new()),
            PrepConfig {
                enable_pre_analysis: true,
                enable_rag_preload: false,
                ..PrepConfig::default()
            },
        );

        let req = base_request(WorkflowId::new("wf-1"), Arc::new(cortex_core::ports::NullListener));
        let env = preparer.prepare(req).await.unwrap();

        let analysis = env.task_analysis.expect("pre-analysis should have parsed");
        assert_eq!(analysis.action, "summarize");
    }

    #[tokio::test]
    async fn pre_analysis_disabled_never_calls_the_model() {
        let store = Arc::new(InMemorySessionStore::new());
        let client = Arc::new(ScriptedModelClient::new(vec![]));
        let preparer = build_preparer(
            Arc::clone(&store),
            Arc::clone(&client) as Arc<dyn ModelClient>,
            Arc::new(FakeCatalog { persona: None, tool_preset: None }),
            Arc::new(Registry::new()),
            no_analysis_no_rag_config(),
        );

        let req = base_request(WorkflowId::new("wf-1"), Arc::new(cortex_core::ports::NullListener));
        let env = preparer.prepare(req).await.unwrap();

        assert!(env.task_analysis.is_none());
        assert_eq!(client.call_count(), 0);
    }

    #[tokio::test]
    async fn persona_override_wins_over_base_system_prompt() {
        let store = Arc::new(InMemorySessionStore::new());
        let preparer = build_preparer(
            Arc::clone(&store),
            Arc::new(ScriptedModelClient::new(vec![])),
            Arc::new(FakeCatalog {
                persona: Some(("reviewer", "You are a meticulous reviewer.")),
                tool_preset: None,
            }),
            Arc::new(Registry::new()),
            no_analysis_no_rag_config(),
        );

        let mut req = base_request(WorkflowId::new("wf-1"), Arc::new(cortex_core::ports::NullListener));
        req.persona_context = Some("reviewer".into());
        let env = preparer.prepare(req).await.unwrap();

        assert_eq!(env.state.system_prompt, "You are a meticulous reviewer.");
    }

    #[tokio::test]
    async fn unknown_persona_name_fails_preparation() {
        let store = Arc::new(InMemorySessionStore::new());
        let preparer = build_preparer(
            Arc::clone(&store),
            Arc::new(ScriptedModelClient::new(vec![])),
            Arc::new(FakeCatalog { persona: None, tool_preset: None }),
            Arc::new(Registry::new()),
            no_analysis_no_rag_config(),
        );

        let mut req = base_request(WorkflowId::new("wf-1"), Arc::new(cortex_core::ports::NullListener));
        req.persona_context = Some("nonexistent".into());

        let err = preparer.prepare(req).await.unwrap_err();
        assert!(matches!(err, PrepError::Preset(_)));
    }

    #[tokio::test]
    async fn subagent_removes_spawn_tool_and_merges_inherited_state() {
        let store = Arc::new(InMemorySessionStore::new());
        let registry = Arc::new(Registry::new());
        registry.register(Arc::new(StubTool("spawn_subagent")));
        registry.register(Arc::new(StubTool("echo")));

        let preparer = build_preparer(
            Arc::clone(&store),
            Arc::new(ScriptedModelClient::new(vec![])),
            Arc::new(FakeCatalog { persona: None, tool_preset: None }),
            Arc::clone(&registry),
            no_analysis_no_rag_config(),
        );

        let mut parent_state = TaskState::new(SessionId::new("parent-session"), "parent prompt".into());
        parent_state.plans.push("parent plan".into());

        let mut req = base_request(WorkflowId::new("wf-1"), Arc::new(cortex_core::ports::NullListener));
        req.is_subagent = true;
        req.inherited_state = Some(parent_state);

        let env = preparer.prepare(req).await.unwrap();
        assert!(env.state.plans.iter().any(|p| p == "parent plan"));
        assert!(env.services.tools.get("spawn_subagent").is_none());
        assert!(env.services.tools.get("echo").is_some());
    }

    #[tokio::test]
    async fn tool_preset_filters_registry_and_emits_diagnostic() {
        let store = Arc::new(InMemorySessionStore::new());
        let registry = Arc::new(Registry::new());
        registry.register(Arc::new(StubTool("keep")));
        registry.register(Arc::new(StubTool("drop")));

        let preparer = build_preparer(
            Arc::clone(&store),
            Arc::new(ScriptedModelClient::new(vec![])),
            Arc::new(FakeCatalog {
                persona: None,
                tool_preset: Some(("minimal", vec!["keep"])),
            }),
            registry,
            no_analysis_no_rag_config(),
        );

        let listener = Arc::new(RecordingListener::default());
        let mut req = base_request(WorkflowId::new("wf-1"), listener.clone());
        req.tool_preset_context = Some("minimal".into());

        let env = preparer.prepare(req).await.unwrap();
        assert!(env.services.tools.get("keep").is_some());
        assert!(env.services.tools.get("drop").is_none());

        let events = listener.events.lock().await;
        assert!(events.iter().any(|e| e.event == "diagnostic_tool_filtering"));
    }

    #[tokio::test]
    async fn unknown_tool_preset_fails_preparation() {
        let store = Arc::new(InMemorySessionStore::new());
        let preparer = build_preparer(
            Arc::clone(&store),
            Arc::new(ScriptedModelClient::new(vec![])),
            Arc::new(FakeCatalog { persona: None, tool_preset: None }),
            Arc::new(Registry::new()),
            no_analysis_no_rag_config(),
        );

        let mut req = base_request(WorkflowId::new("wf-1"), Arc::new(cortex_core::ports::NullListener));
        req.tool_preset_context = Some("nonexistent".into());

        let err = preparer.prepare(req).await.unwrap_err();
        assert!(matches!(err, PrepError::Preset(_)));
    }

    #[tokio::test]
    async fn rag_preload_disabled_leaves_directives_unused() {
        let store = Arc::new(InMemorySessionStore::new());
        let analysis_response = plain_response(
            "<task_analysis><action>a</action><goal>g</goal><approach>ap</approach>\
             <retrieval_plan>search the web for recent filings</retrieval_plan></task_analysis>",
        );
        let preparer = build_preparer(
            Arc::clone(&store),
            Arc::new(ScriptedModelClient::new(vec![analysis_response])),
            Arc::new(FakeCatalog { persona: None, tool_preset: None }),
            Arc::new(Registry::new()),
            PrepConfig {
                enable_pre_analysis: true,
                enable_rag_preload: false,
                ..PrepConfig::default()
            },
        );

        let req = base_request(WorkflowId::new("wf-1"), Arc::new(cortex_core::ports::NullListener));
        let env = preparer.prepare(req).await.unwrap();

        // Directives are still derived for callers that want to inspect them,
        // even though the preload pass itself didn't run.
        assert!(env.rag_directives.is_some());
        assert!(!env.session.metadata.contains_key("rag_preload_note"));
    }

    #[tokio::test]
    async fn rag_preload_runs_and_annotates_session_metadata() {
        let store = Arc::new(InMemorySessionStore::new());
        let analysis_response = plain_response(
            "<task_analysis><action>a</action><goal>g</goal><approach>ap</approach>\
             <steps><step external=\"true\">look something up</step></steps></task_analysis>",
        );
        let registry = Arc::new(Registry::new());
        registry.register(Arc::new(StubTool("code_search")));

        let preparer = build_preparer(
            Arc::clone(&store),
            Arc::new(ScriptedModelClient::new(vec![analysis_response])),
            Arc::new(FakeCatalog { persona: None, tool_preset: None }),
            registry,
            PrepConfig {
                enable_pre_analysis: true,
                enable_rag_preload: true,
                ..PrepConfig::default()
            },
        );

        let req = base_request(WorkflowId::new("wf-1"), Arc::new(cortex_core::ports::NullListener));
        let env = preparer.prepare(req).await.unwrap();

        assert!(env.rag_directives.is_some());
        assert!(env.session.metadata.contains_key("rag_preload_note"));
        assert!(env.session.metadata.contains_key("rag_directive_summary"));
        assert!(env.state.plans.iter().any(|p| p.starts_with("retrieval:")));
    }
}
