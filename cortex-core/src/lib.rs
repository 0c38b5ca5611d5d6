//! # cortex-core — data model and port traits for the cortex agent runtime
//!
//! This crate is the second protocol layer: where [`layer0`] defines the
//! generic Operator/Orchestrator/State boundary traits, `cortex-core`
//! defines the concrete shapes a coordinator-driven ReAct runtime needs
//! (task state, tool calls, workflow nodes, event envelopes, usage
//! records) plus the external ports (session store, model client, tool
//! registry, parser, context manager, listener) every other `cortex-*`
//! crate implements against.
//!
//! No execution logic lives here — only data and seams.

#![deny(missing_docs)]

pub mod checksum;
pub mod error;
pub mod event;
pub mod id;
pub mod ports;
pub mod task_state;
pub mod tool_call;
pub mod workflow_model;

#[cfg(feature = "test-utils")]
pub mod test_utils;

pub use checksum::Checksum;
pub use error::{ContextPortError, ModelError, ParserError, SessionStoreError, ToolPortError};
pub use event::{EventEnvelope, NodeKind};
pub use id::IdGenerator;
pub use ports::{
    CompletionRequest, CompletionResponse, ContextManager, FunctionCallParser, Listener,
    ModelClient, ModelClientFactory, SessionStore, ToolChoice, ToolDefinition, ToolExecutor,
    ToolRegistryPort, Usage, Window,
};
pub use task_state::TaskState;
pub use tool_call::{ToolCall, ToolResult};
pub use workflow_model::{NodeStatus, WorkflowNode, WorkflowSnapshot};
