//! # layer0 — Protocol traits and data model for composable agentic systems
//!
//! This crate defines the boundary traits and wire types that the
//! `cortex-*` crates compose into a deterministic, observable agent
//! runtime: a coordinator that drives a bounded ReAct loop over a
//! language model and a tool registry, under explicit budgets and
//! cancellation, while emitting a structured workflow event stream.
//!
//! ## The Protocols
//!
//! | Protocol | Trait | What it does |
//! |----------|-------|---------------|
//! | ① Operator | [`Operator`] | What one agent does per task |
//! | ② Orchestration | [`Orchestrator`] | How agents compose (delegation, handoff) |
//! | ③ State | [`StateStore`] | How session data persists across tasks |
//!
//! ## The Interfaces
//!
//! | Interface | Types | What it does |
//! |-----------|-------|---------------|
//! | ④ Hooks | [`Hook`], [`HookPoint`], [`HookAction`] | Observation + intervention inside one task |
//! | ⑤ Lifecycle | [`BudgetEvent`], [`CompactionEvent`] | Cross-layer coordination vocabulary |
//!
//! ## Design Principle
//!
//! Every protocol trait is operation-defined, not mechanism-defined.
//! [`Operator::execute`] means "cause this agent to process one task" —
//! not "make an API call" or "run a subprocess." A ReAct engine behind
//! a coordinator, a single-shot completion, and a human-in-the-loop
//! adapter all implement the same trait.
//!
//! ## Dependency Notes
//!
//! This crate depends on `serde_json::Value` for extension data fields
//! (metadata, tool inputs, payloads). JSON is the interchange format at
//! every boundary here; the alternative (generic `T: Serialize`) would
//! complicate trait object safety without practical benefit.

#![deny(missing_docs)]

pub mod content;
pub mod duration;
pub mod effect;
pub mod error;
pub mod hook;
pub mod id;
pub mod lifecycle;
pub mod operator;
pub mod orchestrator;
pub mod session;
pub mod state;
pub mod usage;

#[cfg(feature = "test-utils")]
pub mod test_utils;

pub use content::{Content, ContentBlock};
pub use duration::DurationMs;
pub use effect::{Effect, Scope, SignalPayload};
pub use error::{HookError, OperatorError, OrchError, StateError, WorkflowError};
pub use hook::{Hook, HookAction, HookContext, HookPoint};
pub use id::{AgentId, RunId, ScopeId, SessionId, TaskId, WorkflowId};
pub use lifecycle::{BudgetEvent, CompactionEvent, ObservableEvent};
pub use operator::{
    ExitReason, Operator, OperatorInput, OperatorMetadata, OperatorOutput, ToolCallRecord,
    TriggerType,
};
pub use orchestrator::{Orchestrator, QueryPayload};
pub use session::{Attachment, Message, MessageSource, Role, Session};
pub use state::{SearchResult, StateReader, StateStore};
pub use usage::{Assessment, Grade, UsageRecord};
