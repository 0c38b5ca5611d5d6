#![deny(missing_docs)]
//! # cortex — umbrella crate
//!
//! A single import surface for the `cortex-*` agent runtime core: a
//! Coordinator that stages `prepare -> execute -> summarize -> persist`,
//! a bounded ReAct engine that drives a model through tool calls, and a
//! named-node Workflow wrapped by a `workflow.*` event translator.
//!
//! Re-exports protocol and key implementations behind feature flags,
//! plus a [`prelude`] for the happy path.

#[cfg(feature = "core")]
pub use layer0;
#[cfg(feature = "core")]
pub use cortex_core;
#[cfg(feature = "core")]
pub use cortex_tool;
#[cfg(feature = "core")]
pub use cortex_context;
#[cfg(feature = "workflow")]
pub use cortex_workflow;
#[cfg(feature = "cost")]
pub use cortex_cost;
#[cfg(feature = "preset")]
pub use cortex_preset;
#[cfg(feature = "prep")]
pub use cortex_prep;
#[cfg(feature = "react")]
pub use cortex_react;
#[cfg(feature = "reviewer")]
pub use cortex_reviewer;
#[cfg(feature = "coordinator")]
pub use cortex_coordinator;
#[cfg(feature = "state-memory")]
pub use cortex_state_memory;
#[cfg(feature = "state-fs")]
pub use cortex_state_fs;
#[cfg(feature = "provider-anthropic")]
pub use cortex_provider_anthropic;
#[cfg(feature = "provider-openai")]
pub use cortex_provider_openai;

/// Happy-path imports for composing `cortex` runtimes.
pub mod prelude {
    #[cfg(feature = "core")]
    pub use layer0::{
        AgentId, Content, ContentBlock, Hook, HookAction, HookContext, HookPoint, SessionId,
        TaskId, WorkflowId,
    };

    #[cfg(feature = "core")]
    pub use cortex_core::{
        CompletionRequest, CompletionResponse, ContextManager, EventEnvelope, FunctionCallParser,
        Listener, ModelClient, ModelClientFactory, NodeKind, NodeStatus, SessionStore, TaskState,
        ToolCall, ToolChoice, ToolDefinition, ToolExecutor, ToolRegistryPort, ToolResult, Usage,
        WorkflowNode, WorkflowSnapshot,
    };

    #[cfg(feature = "core")]
    pub use cortex_tool::{Limiter, Registry};

    #[cfg(feature = "core")]
    pub use cortex_context::SlidingWindow;

    #[cfg(feature = "workflow")]
    pub use cortex_workflow::{Translator, Workflow, WorkflowContext};

    #[cfg(feature = "cost")]
    pub use cortex_cost::{CostTracker, CostTrackingClient};

    #[cfg(feature = "preset")]
    pub use cortex_preset::{PresetCatalog, Resolver};

    #[cfg(feature = "prep")]
    pub use cortex_prep::{ExecutionEnvironment, PrepConfig, Preparer};

    #[cfg(feature = "react")]
    pub use cortex_react::{Engine, EngineConfig, StopReason};

    #[cfg(feature = "reviewer")]
    pub use cortex_reviewer::{Reviewer, ReviewerConfig};

    #[cfg(feature = "coordinator")]
    pub use cortex_coordinator::{Coordinator, ExecuteTaskRequest, ExecuteTaskResult};

    #[cfg(feature = "state-memory")]
    pub use cortex_state_memory::MemoryStore;

    #[cfg(feature = "state-fs")]
    pub use cortex_state_fs::FsStore;

    #[cfg(feature = "provider-anthropic")]
    pub use cortex_provider_anthropic::Anthropic;

    #[cfg(feature = "provider-openai")]
    pub use cortex_provider_openai::OpenAi;
}
