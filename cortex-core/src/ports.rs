//! External port traits (`spec.md` §6).
//!
//! Every concrete collaborator the coordinator/engine/preparation
//! pipeline depends on is specified here as a narrow, object-safe,
//! `async_trait` port — the same shape as `layer0::StateStore`. Unlike
//! `neuron-turn::Provider` (which is RPITIT and deliberately not
//! object-safe because `ReactOperator<P: Provider>` is generic), these
//! ports are consumed as trait objects: `spec.md`'s `ModelClientFactory`
//! explicitly requires `GetIsolatedClient` to hand back "a distinct
//! instance or a session-safe clone", which only makes sense behind
//! `Arc<dyn ModelClient>`. See DESIGN.md for this departure from the
//! teacher's RPITIT pattern.

use crate::error::{ContextPortError, ModelError, ParserError, SessionStoreError, ToolPortError};
use crate::event::EventEnvelope;
use crate::tool_call::{ToolCall, ToolResult};
use async_trait::async_trait;
use layer0::id::SessionId;
use layer0::session::{Message, Session};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

// ─────────────────────────── Session Store ───────────────────────────

/// `spec.md` §6's Session Store port: `Create`, `Get`, `Save`, `List`, `Delete`.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Create a new, empty session and persist it, returning its id.
    async fn create(&self) -> Result<Session, SessionStoreError>;

    /// Load a session by id.
    async fn get(&self, id: &SessionId) -> Result<Session, SessionStoreError>;

    /// Persist a session, overwriting any prior version.
    async fn save(&self, session: &Session) -> Result<(), SessionStoreError>;

    /// List all known session ids.
    async fn list(&self) -> Result<Vec<SessionId>, SessionStoreError>;

    /// Delete a session. No-op if it doesn't exist.
    async fn delete(&self, id: &SessionId) -> Result<(), SessionStoreError>;
}

// ─────────────────────────── Model Client ────────────────────────────

/// Which tool the model should prefer, if any.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum ToolChoice {
    /// The model decides whether to use a tool.
    Auto,
    /// The model must not use a tool.
    None,
    /// The model must use a tool, any tool.
    Any,
    /// The model must use this specific tool.
    Specific {
        /// The tool name the model must call.
        name: String,
    },
}

/// A tool's schema as presented to the model.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// JSON Schema for the tool's input.
    pub input_schema: serde_json::Value,
}

impl ToolDefinition {
    /// Build a tool definition from its three fields.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: serde_json::Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }
}

/// Request sent through the Model Client port.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// Ordered conversation messages.
    pub messages: Vec<Message>,
    /// Tool definitions available to the model this call.
    #[serde(default)]
    pub tools: Vec<ToolDefinition>,
    /// How the model should use tools.
    pub tool_choice: ToolChoice,
    /// Sampling temperature.
    pub temperature: Option<f64>,
    /// Maximum output tokens.
    pub max_tokens: Option<u32>,
    /// Nucleus sampling parameter.
    pub top_p: Option<f64>,
    /// Sequences that stop generation.
    #[serde(default)]
    pub stop_sequences: Vec<String>,
    /// Opaque metadata, conventionally including `request_id` and `intent`.
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl CompletionRequest {
    /// Build a request with just messages, defaulting every optional
    /// field (no tools, `ToolChoice::Auto`, no sampling overrides).
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            tools: vec![],
            tool_choice: ToolChoice::Auto,
            temperature: None,
            max_tokens: None,
            top_p: None,
            stop_sequences: vec![],
            metadata: serde_json::Value::Null,
        }
    }
}

/// Token usage for a single completion call.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Usage {
    /// Prompt/input tokens.
    pub prompt: u64,
    /// Completion/output tokens.
    pub completion: u64,
    /// Total tokens (prompt + completion).
    pub total: u64,
}

impl Usage {
    /// Build a usage value, deriving `total` from its components.
    pub fn new(prompt: u64, completion: u64) -> Self {
        Self {
            prompt,
            completion,
            total: prompt + completion,
        }
    }
}

/// Response from the Model Client port.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    /// The model's textual content.
    pub content: String,
    /// Ordered tool calls the model requested.
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
    /// Why the model stopped generating (provider-defined string).
    pub stop_reason: String,
    /// Token usage for this call.
    pub usage: Usage,
}

/// A model client: the transport-agnostic completion port.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Send a completion request.
    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, ModelError>;

    /// The model identifier this client targets.
    fn model(&self) -> &str;
}

/// Factory for obtaining model clients, used by Execution Preparation
/// for per-session client isolation (`spec.md` §4.5 step 3).
#[async_trait]
pub trait ModelClientFactory: Send + Sync {
    /// Return the shared default client. May be reused across sessions.
    fn get_client(&self) -> Arc<dyn ModelClient>;

    /// Return a distinct instance or a session-safe clone, suitable for
    /// wrapping with a per-session cost-tracking decorator without
    /// mutating shared client state.
    fn get_isolated_client(&self) -> Arc<dyn ModelClient>;

    /// Disable the client's internal retry behavior, if it has any.
    fn disable_retry(&self);
}

// ─────────────────────────── Tool Registry ────────────────────────────

/// A single registered tool's execution port.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// This tool's definition (name/description/schema).
    fn definition(&self) -> ToolDefinition;

    /// Free-form metadata about this tool (e.g. `{"concurrency_safe": true}`).
    fn metadata(&self) -> serde_json::Value {
        serde_json::Value::Null
    }

    /// Execute the call.
    async fn execute(&self, call: &ToolCall) -> Result<ToolResult, ToolPortError>;
}

/// The Tool Registry port: register/look up/list/unregister tools, and
/// produce filtered views (used by the Preset Resolver and by subagent
/// contexts to remove the subagent-spawning tool).
#[async_trait]
pub trait ToolRegistryPort: Send + Sync {
    /// Register a tool executor, keyed by its own name. Overwrites any
    /// existing registration with the same name.
    fn register(&self, executor: Arc<dyn ToolExecutor>);

    /// Look up a tool executor by name.
    fn get(&self, name: &str) -> Option<Arc<dyn ToolExecutor>>;

    /// List the definitions of every registered tool.
    fn list(&self) -> Vec<ToolDefinition>;

    /// Remove a tool by name. No-op if absent.
    fn unregister(&self, name: &str);

    /// Number of registered tools.
    fn len(&self) -> usize;

    /// Whether the registry has no tools.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ─────────────────────────── Parser / Context ─────────────────────────

/// Parses model content into tool calls when the transport doesn't
/// supply structured tool calls directly.
pub trait FunctionCallParser: Send + Sync {
    /// Attempt to extract tool calls from raw model content.
    fn parse(&self, content: &str) -> Result<Vec<ToolCall>, ParserError>;
}

/// A bounded view of a session's messages prepared for a model call.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Window {
    /// The messages selected for this window.
    pub messages: Vec<Message>,
    /// Estimated token count of `messages`.
    pub estimated_tokens: u64,
}

/// A turn record the context manager may use to inform future windowing
/// decisions (e.g. frequency of topics, recency weighting).
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnRecord {
    /// The session this turn belongs to.
    pub session: SessionId,
    /// The message produced by the turn.
    pub message: Message,
}

/// The Context Manager port: token estimation, compression, and window
/// assembly (`spec.md` §6, §4.5 steps 2 and 5).
#[async_trait]
pub trait ContextManager: Send + Sync {
    /// Estimate the token cost of a message list.
    fn estimate_tokens(&self, messages: &[Message]) -> u64;

    /// Whether `messages` should be compressed given a token `limit`.
    fn should_compress(&self, messages: &[Message], limit: u64) -> bool {
        self.estimate_tokens(messages) > limit
    }

    /// Compress `messages` down toward `target` tokens, returning the
    /// replacement message list.
    async fn compress(
        &self,
        messages: &[Message],
        target: u64,
    ) -> Result<Vec<Message>, ContextPortError>;

    /// Run any provider/source preload needed before building a window
    /// (e.g. warming an embedding index). A no-op for most backends.
    async fn preload(&self) -> Result<(), ContextPortError> {
        Ok(())
    }

    /// Build a bounded window over a session's history for the current task.
    async fn build_window(
        &self,
        session: &Session,
        limit: u64,
    ) -> Result<Window, ContextPortError>;

    /// Record a completed turn, for context managers that learn from
    /// usage patterns. A no-op for stateless strategies.
    async fn record_turn(&self, _record: TurnRecord) -> Result<(), ContextPortError> {
        Ok(())
    }
}

// ─────────────────────────────── Listener ─────────────────────────────

/// The workflow event outbound port.
///
/// Distinct from `layer0::Hook`: `Listener` receives translated
/// `workflow.*` envelopes for observability/UI consumption, while
/// `Hook` observes and can intervene inside the ReAct engine's inner
/// loop. The Event Translator's adapter wraps a user-supplied
/// `Listener` so callers only ever implement this one method.
///
/// Dispatch is synchronous and has no internal queue — a slow listener
/// slows the emitter (`spec.md` §5's backpressure policy). Callers
/// needing buffering wrap this port with their own bounded channel.
#[async_trait]
pub trait Listener: Send + Sync {
    /// Receive one event envelope.
    async fn on_event(&self, event: EventEnvelope);
}

/// A listener that discards every event. Useful when a caller has no
/// observability needs but the coordinator still requires a `Listener`.
pub struct NullListener;

#[async_trait]
impl Listener for NullListener {
    async fn on_event(&self, _event: EventEnvelope) {}
}
