//! Event envelope — the wire-stable record the translator emits to a [`crate::ports::Listener`].

use layer0::id::{SessionId, TaskId, WorkflowId};
use serde::{Deserialize, Serialize};

/// What kind of thing a workflow node represents, for translation
/// purposes. Distinct from `NodeStatus` — this classifies the node's
/// role, not its lifecycle state.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// A generic workflow node (the four coordinator stages).
    Node,
    /// A labeled step within a node.
    Step,
    /// One ReAct loop iteration.
    Iteration,
    /// A model generation (think) node.
    Generation,
    /// A single tool invocation.
    Tool,
    /// A tool or generation result.
    Result,
    /// A diagnostic (non-fatal, informational) event.
    Diagnostic,
    /// A nested subagent task.
    Subflow,
    /// Initial task input.
    Input,
    /// A produced artifact (attachment, file, blob reference).
    Artifact,
    /// A generated plan.
    Plan,
}

/// Optional counters attached to subflow-related envelopes (`spec.md`
/// §4.2's subflow aggregation). Present only on `workflow.subflow.*`
/// events.
#[non_exhaustive]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubflowCounters {
    /// Total subtasks tracked under this parent.
    pub total: u64,
    /// Subtasks that reached a terminal state (succeeded or failed).
    pub completed: u64,
    /// Subtasks that succeeded.
    pub success: u64,
    /// Subtasks that failed or were cancelled.
    pub failed: u64,
    /// Cumulative tokens across tracked subtasks.
    pub tokens: u64,
    /// Cumulative tool calls across tracked subtasks.
    pub tool_calls: u64,
}

/// A single wire-stable event, the output of the Event Translator.
///
/// `event` is a dotted name from the closed set in `spec.md` §6 (e.g.
/// `workflow.node.started`). The translator forwards envelopes that
/// already carry a `workflow.*` event name untouched — translation is
/// idempotent under re-wrapping.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Dotted event type name.
    pub event: String,
    /// The workflow this event belongs to.
    pub workflow_id: WorkflowId,
    /// Correlation id for one end-to-end run (distinct from `workflow_id`
    /// so retries/replays of the same workflow id can still be told apart).
    pub run_id: String,
    /// The node this event concerns, if any.
    pub node_id: Option<String>,
    /// What kind of node `node_id` is.
    pub node_kind: Option<NodeKind>,
    /// Subflow aggregation counters, present on `workflow.subflow.*` events.
    pub subflow: Option<SubflowCounters>,
    /// Event-specific payload.
    pub payload: serde_json::Value,
    /// When the event was emitted (milliseconds since epoch).
    pub timestamp: u64,
    /// Nesting depth: 0 for the top-level task, N+1 for a subagent
    /// invoked by a depth-N task.
    pub agent_level: u32,
    /// Session the event belongs to.
    pub session_id: SessionId,
    /// Task the event belongs to.
    pub task_id: TaskId,
    /// Parent task, when emitted from within a subagent.
    pub parent_task_id: Option<TaskId>,
}

impl EventEnvelope {
    /// Construct an envelope. `#[non_exhaustive]` blocks struct-literal
    /// construction outside this crate, so callers in `cortex-workflow`,
    /// `cortex-react`, and friends go through this instead.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        event: impl Into<String>,
        workflow_id: WorkflowId,
        run_id: impl Into<String>,
        session_id: SessionId,
        task_id: TaskId,
        parent_task_id: Option<TaskId>,
        agent_level: u32,
        timestamp: u64,
    ) -> Self {
        Self {
            event: event.into(),
            workflow_id,
            run_id: run_id.into(),
            node_id: None,
            node_kind: None,
            subflow: None,
            payload: serde_json::Value::Null,
            timestamp,
            agent_level,
            session_id,
            task_id,
            parent_task_id,
        }
    }

    /// Attach a node id/kind to this envelope (builder-style).
    pub fn with_node(mut self, node_id: impl Into<String>, node_kind: NodeKind) -> Self {
        self.node_id = Some(node_id.into());
        self.node_kind = Some(node_kind);
        self
    }

    /// Attach a payload to this envelope (builder-style).
    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }

    /// Attach subflow aggregation counters to this envelope (builder-style).
    pub fn with_subflow(mut self, subflow: SubflowCounters) -> Self {
        self.subflow = Some(subflow);
        self
    }

    /// Whether this envelope's `event` name is already one of the
    /// translator's output names (`workflow.*`), meaning it should pass
    /// through untouched rather than being re-translated.
    pub fn is_already_translated(&self) -> bool {
        self.event.starts_with("workflow.")
    }
}
