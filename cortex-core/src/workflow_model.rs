//! Workflow node and snapshot data model — pure data; the state machine
//! that mutates these lives in `cortex-workflow`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A node's lifecycle state. Transitions are strictly
/// `Pending -> Running -> {Succeeded | Failed}`; re-entry into an
/// already-terminal or already-running state is a contract violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    /// Added but not yet started.
    Pending,
    /// Started, not yet complete.
    Running,
    /// Completed without error.
    Succeeded,
    /// Completed with an error.
    Failed,
}

impl NodeStatus {
    /// Whether this status is terminal (`Succeeded` or `Failed`).
    pub fn is_terminal(&self) -> bool {
        matches!(self, NodeStatus::Succeeded | NodeStatus::Failed)
    }
}

/// A single unit of work within a workflow.
///
/// `id` is unique within its workflow. `input`/`output`/`error` are
/// opaque JSON payloads — the workflow engine doesn't interpret them,
/// only stores and snapshots them.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowNode {
    /// Unique id within the owning workflow.
    pub id: String,
    /// Current lifecycle status.
    pub status: NodeStatus,
    /// Opaque input payload.
    pub input: Option<serde_json::Value>,
    /// Opaque output payload, present once `Succeeded`.
    pub output: Option<serde_json::Value>,
    /// Opaque error payload, present once `Failed`.
    pub error: Option<serde_json::Value>,
    /// When the node transitioned to `Running` (milliseconds since epoch).
    pub started_at: Option<u64>,
    /// When the node reached a terminal state (milliseconds since epoch).
    pub completed_at: Option<u64>,
}

impl WorkflowNode {
    /// Create a new, pending node with the given id and input.
    pub fn new(id: impl Into<String>, input: Option<serde_json::Value>) -> Self {
        Self {
            id: id.into(),
            status: NodeStatus::Pending,
            input,
            output: None,
            error: None,
            started_at: None,
            completed_at: None,
        }
    }
}

/// Deterministic, consistent view of a workflow at a point in time.
///
/// Must be produced from a single read under the workflow's read lock
/// so that `order`, `nodes`, and the derived `phase`/timing fields are
/// mutually consistent.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowSnapshot {
    /// The workflow's id.
    pub id: String,
    /// Derived phase (see `cortex_workflow::phase_of`).
    pub phase: NodeStatus,
    /// Node ids in insertion order.
    pub order: Vec<String>,
    /// Node snapshots, same order as `order`.
    pub nodes: HashMap<String, WorkflowNode>,
    /// Earliest `started_at` across all nodes, if any node has started.
    pub started_at: Option<u64>,
    /// Latest `completed_at` across all nodes, once the phase is terminal.
    pub completed_at: Option<u64>,
    /// Total duration in milliseconds: `now - started_at` while running,
    /// `completed_at - started_at` once terminal.
    pub duration_ms: Option<u64>,
    /// Count of nodes in each status.
    pub status_histogram: HashMap<String, usize>,
}
