//! The Operator protocol — what one agent does per task.

use crate::{content::Content, duration::DurationMs, effect::Effect, error::OperatorError, id::*};
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// What triggers an operator invocation. Informs context assembly — a
/// scheduled trigger means reconstructing everything from state, while a
/// user message carries conversation context naturally.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    /// Human sent a message.
    User,
    /// Another agent assigned a task.
    Task,
    /// Signal from another workflow/agent.
    Signal,
    /// Cron/schedule triggered.
    Schedule,
    /// System event (file change, webhook, etc.).
    SystemEvent,
    /// Future trigger types.
    Custom(String),
}

/// Input to an operator. Everything the operator needs to execute.
///
/// `OperatorInput` does NOT include conversation history or memory
/// contents — the operator runtime reads those from a `StateStore`
/// during context assembly. It carries the *new* information that
/// triggered this invocation, not the accumulated state.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperatorInput {
    /// The new message/task/signal that triggered this invocation.
    pub message: Content,
    /// What caused this invocation to start.
    pub trigger: TriggerType,
    /// Session for conversation continuity. If None, the invocation is stateless.
    pub session: Option<SessionId>,
    /// Configuration for this specific invocation. None = runtime defaults.
    pub config: Option<OperatorConfig>,
    /// Opaque metadata that passes through the operator unchanged.
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// Per-invocation configuration overrides. Every field is optional —
/// None means "use the implementation's default."
#[non_exhaustive]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OperatorConfig {
    /// Maximum iterations of the inner ReAct loop.
    pub max_turns: Option<u32>,
    /// Maximum cost for this invocation in USD.
    pub max_cost: Option<Decimal>,
    /// Maximum wall-clock time for this invocation.
    pub max_duration: Option<DurationMs>,
    /// Model override (implementation-specific string).
    pub model: Option<String>,
    /// Tool restrictions for this invocation. None = defaults; Some(list) = only these tools.
    pub allowed_tools: Option<Vec<String>>,
    /// Additional system prompt content. Augments, does not replace, the base identity.
    pub system_addendum: Option<String>,
}

/// Why an operator invocation ended.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    /// Model produced a final text response (natural completion).
    Complete,
    /// Hit the max_turns limit.
    MaxTurns,
    /// Hit the cost budget.
    BudgetExhausted,
    /// Wall-clock timeout.
    Timeout,
    /// Observer/guardrail halted execution.
    ObserverHalt {
        /// The reason the observer halted execution.
        reason: String,
    },
    /// Cancelled by the caller's context.
    Cancelled,
    /// Unrecoverable error during execution.
    Error,
    /// Future exit reasons.
    Custom(String),
}

/// Output from an operator invocation.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperatorOutput {
    /// The operator's response content.
    pub message: Content,
    /// Why the invocation ended.
    pub exit_reason: ExitReason,
    /// Execution metadata (cost, tokens, timing).
    pub metadata: OperatorMetadata,
    /// Side-effects the operator wants executed.
    ///
    /// The operator declares effects but does not execute them — the
    /// calling layer (coordinator, orchestrator) decides when and how.
    /// This keeps the operator runtime independent of what surrounds it.
    #[serde(default)]
    pub effects: Vec<Effect>,
}

/// Execution metadata. Every field is concrete (not optional) because
/// every invocation produces this data; implementations that can't track
/// a field use zero/default.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperatorMetadata {
    /// Input tokens consumed.
    pub tokens_in: u64,
    /// Output tokens generated.
    pub tokens_out: u64,
    /// Cost in USD.
    pub cost: Decimal,
    /// Number of ReAct loop iterations used.
    pub turns_used: u32,
    /// Record of each tool call made.
    pub tools_called: Vec<ToolCallRecord>,
    /// Wall-clock duration of the invocation.
    pub duration: DurationMs,
}

/// Record of a single tool invocation within an operator execution.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRecord {
    /// Name of the tool that was called.
    pub name: String,
    /// How long the tool call took.
    pub duration: DurationMs,
    /// Whether the call succeeded.
    pub success: bool,
}

impl Default for OperatorMetadata {
    fn default() -> Self {
        Self {
            tokens_in: 0,
            tokens_out: 0,
            cost: Decimal::ZERO,
            turns_used: 0,
            tools_called: vec![],
            duration: DurationMs::ZERO,
        }
    }
}

impl OperatorInput {
    /// Create a new OperatorInput with required fields.
    pub fn new(message: Content, trigger: TriggerType) -> Self {
        Self {
            message,
            trigger,
            session: None,
            config: None,
            metadata: serde_json::Value::Null,
        }
    }
}

impl OperatorOutput {
    /// Create a new OperatorOutput with required fields.
    pub fn new(message: Content, exit_reason: ExitReason) -> Self {
        Self {
            message,
            exit_reason,
            metadata: OperatorMetadata::default(),
            effects: vec![],
        }
    }
}

impl ToolCallRecord {
    /// Create a new ToolCallRecord.
    pub fn new(name: impl Into<String>, duration: DurationMs, success: bool) -> Self {
        Self {
            name: name.into(),
            duration,
            success,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// THE TRAIT
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Protocol ① — The Operator
///
/// What one agent does per task. Receives input, assembles context,
/// reasons (model call), acts (tool execution), produces output.
///
/// Implementations:
/// - `cortex-coordinator`'s `Coordinator` (full-featured: prepare/execute/summarize/persist)
/// - `cortex-react`'s bare `Engine` (just the ReAct loop, no staging)
/// - A mock (for testing)
///
/// The trait is intentionally one method. The invocation is atomic from
/// the outside — send input, get output. Everything that happens inside
/// is the implementation's concern.
#[async_trait]
pub trait Operator: Send + Sync {
    /// Execute a single operator invocation.
    async fn execute(&self, input: OperatorInput) -> Result<OperatorOutput, OperatorError>;
}
