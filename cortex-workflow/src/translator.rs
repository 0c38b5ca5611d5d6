//! Event Translator (`spec.md` §4.2): domain events in, wire-stable
//! `workflow.*` envelopes out.

use async_trait::async_trait;
use cortex_core::event::{NodeKind, SubflowCounters};
use cortex_core::ports::Listener;
use cortex_core::workflow_model::WorkflowSnapshot;
use cortex_core::EventEnvelope;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// The key subflow aggregation is grouped under: parent task id, falling
/// back to task id, falling back to session id.
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub struct SubflowKey(String);

impl SubflowKey {
    fn of(event: &EventEnvelope) -> Self {
        let key = event
            .parent_task_id
            .as_ref()
            .map(|id| id.as_str().to_string())
            .unwrap_or_else(|| event.task_id.as_str().to_string());
        Self(key)
    }
}

#[derive(Debug, Clone, Default)]
struct IndexState {
    tool_calls: u64,
    tokens: u64,
    done: bool,
    success: bool,
}

#[derive(Debug, Default)]
struct SubflowAgg {
    by_index: HashMap<String, IndexState>,
}

impl SubflowAgg {
    fn counters(&self) -> SubflowCounters {
        let mut counters = SubflowCounters::default();
        counters.total = self.by_index.len() as u64;
        for state in self.by_index.values() {
            if state.done {
                counters.completed += 1;
                if state.success {
                    counters.success += 1;
                } else {
                    counters.failed += 1;
                }
            }
            counters.tokens += state.tokens;
            counters.tool_calls += state.tool_calls;
        }
        counters
    }
}

/// Wraps a downstream [`Listener`] and is itself one, translating raw
/// domain events into `workflow.*` envelopes. Safe to share via `Arc`
/// and attached from multiple emitters (workflow, engine, preparation)
/// without any of them knowing a translator sits in between.
pub struct Translator {
    downstream: Arc<dyn Listener>,
    subflows: Mutex<HashMap<SubflowKey, SubflowAgg>>,
}

impl Translator {
    /// Wrap `downstream`, starting with empty subflow aggregation state.
    pub fn new(downstream: Arc<dyn Listener>) -> Self {
        Self {
            downstream,
            subflows: Mutex::new(HashMap::new()),
        }
    }

    async fn translate(&self, event: &EventEnvelope) -> Vec<EventEnvelope> {
        if event.is_already_translated() {
            return vec![event.clone()];
        }

        match event.event.as_str() {
            "node_added" => vec![],
            "node_started" => self.node_transition(event, "workflow.node.started"),
            "node_succeeded" => self.node_transition(event, "workflow.node.completed"),
            "node_failed" => self.node_transition(event, "workflow.node.failed"),
            "workflow_updated" => {
                let mut out = event.clone();
                out.event = "workflow.lifecycle.updated".to_string();
                out.node_id = None;
                out.node_kind = None;
                out.payload = sanitize_snapshot_payload(&out.payload);
                vec![out]
            }
            "tool_started" => self.passthrough(event, "workflow.tool.started", Some(NodeKind::Tool)),
            "tool_progress" => self.passthrough(event, "workflow.tool.progress", Some(NodeKind::Tool)),
            "tool_completed" => self.passthrough(event, "workflow.tool.completed", Some(NodeKind::Tool)),
            "generation_delta" => {
                self.passthrough(event, "workflow.node.output.delta", Some(NodeKind::Generation))
            }
            "generation_summary" => {
                self.passthrough(event, "workflow.node.output.summary", Some(NodeKind::Generation))
            }
            "result_final" => self.passthrough(event, "workflow.result.final", Some(NodeKind::Result)),
            "result_cancelled" => {
                self.passthrough(event, "workflow.result.cancelled", Some(NodeKind::Result))
            }
            "diagnostic_context_compression" => self.passthrough(
                event,
                "workflow.diagnostic.context_compression",
                Some(NodeKind::Diagnostic),
            ),
            "diagnostic_tool_filtering" => self.passthrough(
                event,
                "workflow.diagnostic.tool_filtering",
                Some(NodeKind::Diagnostic),
            ),
            "diagnostic_environment_snapshot" => self.passthrough(
                event,
                "workflow.diagnostic.environment_snapshot",
                Some(NodeKind::Diagnostic),
            ),
            "diagnostic_sandbox_progress" => self.passthrough(
                event,
                "workflow.diagnostic.sandbox_progress",
                Some(NodeKind::Diagnostic),
            ),
            "diagnostic_error" => self.passthrough(
                event,
                "workflow.diagnostic.error",
                Some(NodeKind::Diagnostic),
            ),
            "input_received" => self.passthrough(event, "workflow.input.received", Some(NodeKind::Input)),
            "plan_generated" => self.passthrough(event, "workflow.plan.generated", Some(NodeKind::Plan)),
            "artifact_manifest" => {
                self.passthrough(event, "workflow.artifact.manifest", Some(NodeKind::Artifact))
            }
            "subflow_tool_completed" => self.subflow(event, SubflowUpdate::ToolCompleted).await,
            "subflow_result_final" => self.subflow(event, SubflowUpdate::Final).await,
            "subflow_cancelled" | "subflow_failed" => {
                self.subflow(event, SubflowUpdate::Terminated).await
            }
            // Unknown domain events are dropped rather than forwarded
            // verbatim: everything downstream of this translator expects
            // the closed `workflow.*` vocabulary.
            _ => vec![],
        }
    }

    fn node_transition(&self, event: &EventEnvelope, translated_name: &str) -> Vec<EventEnvelope> {
        let Some(node_id) = event.node_id.as_deref() else {
            return vec![];
        };
        let Some(kind) = classify_node_kind(node_id) else {
            return vec![];
        };
        let mut out = event.clone();
        out.event = translated_name.to_string();
        out.node_kind = Some(kind);
        vec![out]
    }

    fn passthrough(
        &self,
        event: &EventEnvelope,
        translated_name: &str,
        node_kind: Option<NodeKind>,
    ) -> Vec<EventEnvelope> {
        let mut out = event.clone();
        out.event = translated_name.to_string();
        if node_kind.is_some() {
            out.node_kind = node_kind;
        }
        vec![out]
    }

    async fn subflow(&self, event: &EventEnvelope, update: SubflowUpdate) -> Vec<EventEnvelope> {
        let Some(index) = subflow_index(event) else {
            return vec![];
        };
        let key = SubflowKey::of(event);

        let (counters, completed_now) = {
            let mut subflows = self.subflows.lock().await;
            let agg = subflows.entry(key).or_default();
            let state = agg.by_index.entry(index).or_default();
            let completed_now = match update {
                SubflowUpdate::ToolCompleted => {
                    state.tool_calls += 1;
                    false
                }
                SubflowUpdate::Final => {
                    state.tokens += subflow_tokens(event);
                    state.done = true;
                    state.success = true;
                    true
                }
                SubflowUpdate::Terminated => {
                    state.done = true;
                    state.success = false;
                    true
                }
            };
            (agg.counters(), completed_now)
        };

        let mut out = event.clone();
        out.event = if completed_now {
            "workflow.subflow.completed".to_string()
        } else {
            "workflow.subflow.progress".to_string()
        };
        out.node_kind = Some(NodeKind::Subflow);
        out.subflow = Some(counters);
        vec![out]
    }
}

enum SubflowUpdate {
    ToolCompleted,
    Final,
    Terminated,
}

fn subflow_index(event: &EventEnvelope) -> Option<String> {
    event
        .payload
        .get("index")
        .map(|v| match v {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        })
}

fn subflow_tokens(event: &EventEnvelope) -> u64 {
    event
        .payload
        .get("tokens")
        .and_then(|v| v.as_u64())
        .unwrap_or(0)
}

#[async_trait]
impl Listener for Translator {
    async fn on_event(&self, event: EventEnvelope) {
        for translated in self.translate(&event).await {
            self.downstream.on_event(translated).await;
        }
    }
}

/// Classify a node id per the workflow node id grammar (`spec.md` §6):
/// `prepare | execute | summarize | persist | react:context |
/// react:iter:<k>:think | react:iter:<k>:tools |
/// react:iter:<k>:tool:<tool_name>:<index> | react:finalize`.
///
/// Returns `None` for the `react:iter:<k>:tools` recorder-only
/// aggregate node, which must never appear in translated envelopes or
/// sanitized snapshot payloads.
pub(crate) fn classify_node_kind(node_id: &str) -> Option<NodeKind> {
    let parts: Vec<&str> = node_id.split(':').collect();
    match parts.as_slice() {
        ["prepare"] | ["execute"] | ["summarize"] | ["persist"] => Some(NodeKind::Node),
        ["react", "context"] => Some(NodeKind::Step),
        ["react", "finalize"] => Some(NodeKind::Step),
        ["react", "iter", _, "think"] => Some(NodeKind::Generation),
        ["react", "iter", _, "tools"] => None,
        ["react", "iter", _, "tool", _, _] => Some(NodeKind::Tool),
        _ => Some(NodeKind::Node),
    }
}

fn sanitize_snapshot_payload(payload: &serde_json::Value) -> serde_json::Value {
    let Ok(mut snapshot) = serde_json::from_value::<WorkflowSnapshot>(payload.clone()) else {
        return payload.clone();
    };

    snapshot.order.retain(|id| classify_node_kind(id).is_some());
    snapshot.nodes.retain(|id, _| classify_node_kind(id).is_some());

    let mut histogram = HashMap::new();
    for id in &snapshot.order {
        let key = match snapshot.nodes[id].status {
            cortex_core::NodeStatus::Pending => "pending",
            cortex_core::NodeStatus::Running => "running",
            cortex_core::NodeStatus::Succeeded => "succeeded",
            cortex_core::NodeStatus::Failed => "failed",
        };
        *histogram.entry(key.to_string()).or_insert(0) += 1;
    }
    snapshot.status_histogram = histogram;

    serde_json::to_value(&snapshot).unwrap_or_else(|_| payload.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use layer0::id::{SessionId, TaskId, WorkflowId};
    use tokio::sync::Mutex as TokioMutex;

    struct Capture {
        events: TokioMutex<Vec<EventEnvelope>>,
    }

    impl Capture {
        fn new() -> Self {
            Self {
                events: TokioMutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Listener for Capture {
        async fn on_event(&self, event: EventEnvelope) {
            self.events.lock().await.push(event);
        }
    }

    fn base_event(name: &str) -> EventEnvelope {
        EventEnvelope::new(
            name,
            WorkflowId::new("wf1"),
            "run1",
            SessionId::new("s1"),
            TaskId::new("t1"),
            None,
            0,
            1000,
        )
    }

    #[tokio::test]
    async fn already_translated_events_pass_through_untouched() {
        let capture = Arc::new(Capture::new());
        let translator = Translator::new(capture.clone());

        let mut pre_translated = base_event("workflow.node.started");
        pre_translated.node_id = Some("prepare".into());
        translator.on_event(pre_translated.clone()).await;

        let events = capture.events.lock().await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event, "workflow.node.started");
    }

    #[tokio::test]
    async fn node_added_is_dropped() {
        let capture = Arc::new(Capture::new());
        let translator = Translator::new(capture.clone());

        let mut event = base_event("node_added");
        event.node_id = Some("prepare".into());
        translator.on_event(event).await;

        assert!(capture.events.lock().await.is_empty());
    }

    #[tokio::test]
    async fn recorder_only_tools_aggregate_node_is_suppressed() {
        let capture = Arc::new(Capture::new());
        let translator = Translator::new(capture.clone());

        let mut event = base_event("node_started");
        event.node_id = Some("react:iter:1:tools".into());
        translator.on_event(event).await;

        assert!(capture.events.lock().await.is_empty());
    }

    #[tokio::test]
    async fn individual_tool_node_is_preserved_with_tool_kind() {
        let capture = Arc::new(Capture::new());
        let translator = Translator::new(capture.clone());

        let mut event = base_event("node_succeeded");
        event.node_id = Some("react:iter:1:tool:echo:0".into());
        translator.on_event(event).await;

        let events = capture.events.lock().await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event, "workflow.node.completed");
        assert_eq!(events[0].node_kind, Some(NodeKind::Tool));
    }

    #[tokio::test]
    async fn subflow_aggregation_matches_documented_scenario() {
        let capture = Arc::new(Capture::new());
        let translator = Translator::new(capture.clone());

        let mut tool_done = base_event("subflow_tool_completed");
        tool_done.payload = serde_json::json!({"index": 0});
        translator.on_event(tool_done).await;

        let mut final_done = base_event("subflow_result_final");
        final_done.payload = serde_json::json!({"index": 0, "tokens": 400});
        translator.on_event(final_done).await;

        let mut cancelled = base_event("subflow_cancelled");
        cancelled.payload = serde_json::json!({"index": 1});
        translator.on_event(cancelled).await;

        let events = capture.events.lock().await;
        assert_eq!(events.len(), 3);

        assert_eq!(events[0].event, "workflow.subflow.progress");
        let c0 = events[0].subflow.as_ref().unwrap();
        assert_eq!(c0.tool_calls, 1);
        assert_eq!(c0.completed, 0);

        assert_eq!(events[1].event, "workflow.subflow.completed");
        let c1 = events[1].subflow.as_ref().unwrap();
        assert_eq!(c1.tokens, 400);
        assert_eq!(c1.success, 1);
        assert_eq!(c1.completed, 1);

        assert_eq!(events[2].event, "workflow.subflow.completed");
        let c2 = events[2].subflow.as_ref().unwrap();
        assert_eq!(c2.failed, 1);
        assert_eq!(c2.completed, 2);
        assert_eq!(c2.total, 2);
        assert_eq!(c2.tokens, 400);
    }

    #[tokio::test]
    async fn subflow_key_falls_back_to_task_then_session() {
        let capture = Arc::new(Capture::new());
        let translator = Translator::new(capture.clone());

        let mut a = base_event("subflow_tool_completed");
        a.payload = serde_json::json!({"index": 0});
        a.parent_task_id = Some(TaskId::new("parent-1"));

        let mut b = base_event("subflow_tool_completed");
        b.payload = serde_json::json!({"index": 0});
        b.parent_task_id = Some(TaskId::new("parent-1"));

        translator.on_event(a).await;
        translator.on_event(b).await;

        let events = capture.events.lock().await;
        // Same (index, parent) pair twice increments the same counter.
        let c = events[1].subflow.as_ref().unwrap();
        assert_eq!(c.tool_calls, 2);
        assert_eq!(c.total, 1);
    }
}
