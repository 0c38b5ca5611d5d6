//! The Workflow state machine (`spec.md` §4.1).

use cortex_core::event::{EventEnvelope, NodeKind};
use cortex_core::ports::Listener;
use cortex_core::workflow_model::{NodeStatus, WorkflowNode, WorkflowSnapshot};
use layer0::id::{SessionId, TaskId, WorkflowId};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};

/// Errors raised by workflow node transitions.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// A node with this id already exists.
    #[error("node already exists: {0}")]
    DuplicateNode(String),

    /// No node with this id is registered.
    #[error("unknown node: {0}")]
    UnknownNode(String),

    /// The requested transition isn't legal from the node's current state.
    #[error("illegal transition for node {node}: {from:?} -> {to:?}")]
    IllegalTransition {
        /// The node the transition was attempted on.
        node: String,
        /// The node's status before the attempted transition.
        from: NodeStatus,
        /// The status that was requested.
        to: NodeStatus,
    },
}

/// Ambient task-local context a workflow stamps onto every event it emits.
///
/// `spec.md` §5: task id, parent task id, session id, and agent level are
/// carried in the caller's context and read at the point of emission,
/// rather than threaded through every call. A `Workflow` is constructed
/// once per task, so it holds this context for its whole lifetime.
#[derive(Debug, Clone)]
pub struct WorkflowContext {
    /// Correlates one end-to-end run, distinct from the workflow id.
    pub run_id: String,
    /// Session this workflow's task belongs to.
    pub session_id: SessionId,
    /// The task this workflow drives.
    pub task_id: TaskId,
    /// Parent task, when this workflow belongs to a subagent invocation.
    pub parent_task_id: Option<TaskId>,
    /// Nesting depth: 0 for the top-level task.
    pub agent_level: u32,
}

impl WorkflowContext {
    /// Build a top-level (non-subagent) context at depth 0.
    pub fn top_level(run_id: impl Into<String>, session_id: SessionId, task_id: TaskId) -> Self {
        Self {
            run_id: run_id.into(),
            session_id,
            task_id,
            parent_task_id: None,
            agent_level: 0,
        }
    }
}

struct NodeSlot {
    node: Mutex<WorkflowNode>,
}

struct Inner {
    order: Vec<String>,
    nodes: HashMap<String, NodeSlot>,
}

/// A named-node DAG (implicitly a list) whose nodes track lifecycle
/// state, with a synchronous, registration-ordered listener fan-out.
///
/// Node transitions are guarded by each node's own `tokio::sync::Mutex`;
/// the workflow-wide `RwLock` only protects the shared order/map
/// structure, so concurrent transitions on distinct nodes never
/// contend with each other (`spec.md` §5).
pub struct Workflow {
    id: WorkflowId,
    context: WorkflowContext,
    inner: RwLock<Inner>,
    listeners: RwLock<Vec<Arc<dyn Listener>>>,
}

impl Workflow {
    /// Create a new, empty workflow.
    pub fn new(id: WorkflowId, context: WorkflowContext) -> Self {
        Self {
            id,
            context,
            inner: RwLock::new(Inner {
                order: Vec::new(),
                nodes: HashMap::new(),
            }),
            listeners: RwLock::new(Vec::new()),
        }
    }

    /// This workflow's id.
    pub fn id(&self) -> &WorkflowId {
        &self.id
    }

    /// The ambient context stamped onto every emitted event.
    pub fn context(&self) -> &WorkflowContext {
        &self.context
    }

    /// Register a listener. Dispatch order follows registration order.
    pub async fn add_listener(&self, listener: Arc<dyn Listener>) {
        self.listeners.write().await.push(listener);
    }

    /// Add a new, pending node. Fails if a node with this id already exists.
    pub async fn add_node(
        &self,
        id: impl Into<String>,
        input: Option<serde_json::Value>,
    ) -> Result<(), WorkflowError> {
        let id = id.into();
        {
            let mut inner = self.inner.write().await;
            if inner.nodes.contains_key(&id) {
                return Err(WorkflowError::DuplicateNode(id));
            }
            inner.order.push(id.clone());
            inner.nodes.insert(
                id.clone(),
                NodeSlot {
                    node: Mutex::new(WorkflowNode::new(id.clone(), input.clone())),
                },
            );
        }
        self.emit_node_event("node_added", &id, NodeKind::Node, input)
            .await?;
        self.emit_workflow_updated().await;
        Ok(())
    }

    /// Transition a node from `Pending` to `Running`.
    pub async fn start_node(&self, id: &str) -> Result<(), WorkflowError> {
        let now = now_millis();
        {
            let inner = self.inner.read().await;
            let slot = inner
                .nodes
                .get(id)
                .ok_or_else(|| WorkflowError::UnknownNode(id.to_string()))?;
            let mut node = slot.node.lock().await;
            if node.status != NodeStatus::Pending {
                return Err(WorkflowError::IllegalTransition {
                    node: id.to_string(),
                    from: node.status,
                    to: NodeStatus::Running,
                });
            }
            node.status = NodeStatus::Running;
            node.started_at = Some(now);
        }
        self.emit_node_event("node_started", id, NodeKind::Node, None)
            .await?;
        self.emit_workflow_updated().await;
        Ok(())
    }

    /// Transition a node from `Running` to `Succeeded`.
    pub async fn complete_node_success(
        &self,
        id: &str,
        output: Option<serde_json::Value>,
    ) -> Result<(), WorkflowError> {
        let now = now_millis();
        {
            let inner = self.inner.read().await;
            let slot = inner
                .nodes
                .get(id)
                .ok_or_else(|| WorkflowError::UnknownNode(id.to_string()))?;
            let mut node = slot.node.lock().await;
            if node.status != NodeStatus::Running {
                return Err(WorkflowError::IllegalTransition {
                    node: id.to_string(),
                    from: node.status,
                    to: NodeStatus::Succeeded,
                });
            }
            node.status = NodeStatus::Succeeded;
            node.completed_at = Some(now);
            node.output = output.clone();
        }
        self.emit_node_event("node_succeeded", id, NodeKind::Node, output)
            .await?;
        self.emit_workflow_updated().await;
        Ok(())
    }

    /// Transition a node from `Running` to `Failed`. Also accepts a
    /// `Pending` node (a node that never started, e.g. cancellation
    /// before it was reached) transitioning straight to `Failed`.
    pub async fn complete_node_failure(
        &self,
        id: &str,
        error: Option<serde_json::Value>,
    ) -> Result<(), WorkflowError> {
        let now = now_millis();
        {
            let inner = self.inner.read().await;
            let slot = inner
                .nodes
                .get(id)
                .ok_or_else(|| WorkflowError::UnknownNode(id.to_string()))?;
            let mut node = slot.node.lock().await;
            if node.status.is_terminal() {
                return Err(WorkflowError::IllegalTransition {
                    node: id.to_string(),
                    from: node.status,
                    to: NodeStatus::Failed,
                });
            }
            if node.status == NodeStatus::Pending {
                node.started_at = Some(now);
            }
            node.status = NodeStatus::Failed;
            node.completed_at = Some(now);
            node.error = error.clone();
        }
        self.emit_node_event("node_failed", id, NodeKind::Node, error)
            .await?;
        self.emit_workflow_updated().await;
        Ok(())
    }

    /// A deterministic, single-read snapshot of every node's current state.
    pub async fn snapshot(&self) -> WorkflowSnapshot {
        let inner = self.inner.read().await;
        let mut nodes = HashMap::with_capacity(inner.order.len());
        for id in &inner.order {
            let slot = inner.nodes.get(id).expect("order and nodes stay in sync");
            let node = slot.node.lock().await;
            nodes.insert(id.clone(), node.clone());
        }
        build_snapshot(self.id.as_str(), inner.order.clone(), nodes)
    }

    /// Build a bare envelope stamped with this workflow's ambient context,
    /// for callers emitting events outside the node-transition lifecycle
    /// (e.g. tool progress or diagnostics).
    pub fn new_envelope(&self, event: impl Into<String>) -> EventEnvelope {
        EventEnvelope::new(
            event,
            self.id.clone(),
            self.context.run_id.clone(),
            self.context.session_id.clone(),
            self.context.task_id.clone(),
            self.context.parent_task_id.clone(),
            self.context.agent_level,
            now_millis(),
        )
    }

    /// Dispatch an envelope to every registered listener, in order.
    pub async fn emit(&self, envelope: EventEnvelope) {
        let listeners = self.listeners.read().await;
        for listener in listeners.iter() {
            listener.on_event(envelope.clone()).await;
        }
    }

    async fn emit_node_event(
        &self,
        event: &str,
        node_id: &str,
        node_kind: NodeKind,
        payload: Option<serde_json::Value>,
    ) -> Result<(), WorkflowError> {
        let envelope = self
            .new_envelope(event)
            .with_node(node_id, node_kind)
            .with_payload(payload.unwrap_or(serde_json::Value::Null));
        self.emit(envelope).await;
        Ok(())
    }

    async fn emit_workflow_updated(&self) {
        let snapshot = self.snapshot().await;
        let payload = serde_json::to_value(&snapshot).unwrap_or(serde_json::Value::Null);
        let envelope = self.new_envelope("workflow_updated").with_payload(payload);
        self.emit(envelope).await;
    }
}

/// Pure function over a node snapshot list computing the derived phase
/// (`spec.md` §3): any failed -> `Failed`; all succeeded -> `Succeeded`;
/// any running, or any succeeded with others still pending -> `Running`;
/// otherwise `Pending`.
pub fn phase_of(order: &[String], nodes: &HashMap<String, WorkflowNode>) -> NodeStatus {
    if order.is_empty() {
        return NodeStatus::Pending;
    }
    let statuses: Vec<NodeStatus> = order.iter().map(|id| nodes[id].status).collect();
    if statuses.iter().any(|s| *s == NodeStatus::Failed) {
        return NodeStatus::Failed;
    }
    if statuses.iter().all(|s| *s == NodeStatus::Succeeded) {
        return NodeStatus::Succeeded;
    }
    let any_running = statuses.iter().any(|s| *s == NodeStatus::Running);
    let any_succeeded = statuses.iter().any(|s| *s == NodeStatus::Succeeded);
    let any_pending = statuses.iter().any(|s| *s == NodeStatus::Pending);
    if any_running || (any_succeeded && any_pending) {
        return NodeStatus::Running;
    }
    NodeStatus::Pending
}

fn build_snapshot(
    id: &str,
    order: Vec<String>,
    nodes: HashMap<String, WorkflowNode>,
) -> WorkflowSnapshot {
    let phase = phase_of(&order, &nodes);

    let started_at = order
        .iter()
        .filter_map(|id| nodes[id].started_at)
        .min();

    let completed_at = if phase.is_terminal() {
        order.iter().filter_map(|id| nodes[id].completed_at).max()
    } else {
        None
    };

    let duration_ms = started_at.map(|start| {
        let end = completed_at.unwrap_or_else(now_millis);
        end.saturating_sub(start)
    });

    let mut status_histogram: HashMap<String, usize> = HashMap::new();
    for id in &order {
        let key = match nodes[id].status {
            NodeStatus::Pending => "pending",
            NodeStatus::Running => "running",
            NodeStatus::Succeeded => "succeeded",
            NodeStatus::Failed => "failed",
        };
        *status_histogram.entry(key.to_string()).or_insert(0) += 1;
    }

    WorkflowSnapshot {
        id: id.to_string(),
        phase,
        order,
        nodes,
        started_at,
        completed_at,
        duration_ms,
        status_histogram,
    }
}

fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
