//! Tool call and tool result — the model-facing half of tool execution.

use crate::checksum::Checksum;
use layer0::id::{SessionId, TaskId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A tool invocation requested by the model.
///
/// Invariant (`spec.md` §3): every call id that entered a model turn
/// must have a matching result id in the next turn; the engine
/// synthesizes a failure result for any id the executor didn't answer.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// The model-assigned id for this call; correlates with its result.
    pub id: String,
    /// Name of the tool being invoked.
    pub name: String,
    /// Tool arguments as a JSON object.
    pub arguments: serde_json::Value,
    /// Session this call belongs to.
    pub session: SessionId,
    /// Task this call belongs to.
    pub task: TaskId,
    /// Parent task, when this call happens inside a subagent.
    pub parent_task: Option<TaskId>,
}

impl ToolCall {
    /// Create a tool call with no parent task.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: serde_json::Value,
        session: SessionId,
        task: TaskId,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
            session,
            task,
            parent_task: None,
        }
    }
}

/// The outcome of executing a [`ToolCall`].
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// The id of the call this result answers.
    pub call_id: String,
    /// Textual content returned to the model.
    pub content: String,
    /// Error message, if the tool failed. `content` still carries a
    /// human-readable summary so the model sees a well-formed turn.
    pub error: Option<String>,
    /// Free-form metadata (timing, exit codes, etc).
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    /// Attachments produced by the tool.
    #[serde(default)]
    pub attachments: Vec<ToolAttachmentRef>,
}

impl ToolResult {
    /// Build a successful result.
    pub fn success(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            content: content.into(),
            error: None,
            metadata: HashMap::new(),
            attachments: vec![],
        }
    }

    /// Build a failure result. Used both for real tool failures and
    /// for synthesizing a result when the executor never answered a
    /// call id the model emitted.
    pub fn failure(call_id: impl Into<String>, error: impl Into<String>) -> Self {
        let error = error.into();
        Self {
            call_id: call_id.into(),
            content: format!("error: {error}"),
            error: Some(error),
            metadata: HashMap::new(),
            attachments: vec![],
        }
    }

    /// A result synthesized because the tool executor never produced
    /// one for a call id the model emitted in this turn.
    pub fn synthesize_missing(call_id: impl Into<String>) -> Self {
        Self::failure(call_id, "no result produced for this tool call")
    }

    /// Whether this result represents a failure.
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// A lightweight reference to an attachment produced by a tool, carrying
/// just enough to be merged into the session's attachment map.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolAttachmentRef {
    /// Logical name, used as the key in the session's attachment map.
    pub name: String,
    /// MIME type.
    pub media_type: String,
    /// Checksum of the attachment's bytes.
    pub checksum: Checksum,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_result_carries_error_and_content() {
        let r = ToolResult::failure("call-1", "boom");
        assert!(r.is_error());
        assert_eq!(r.content, "error: boom");
    }

    #[test]
    fn success_result_has_no_error() {
        let r = ToolResult::success("call-1", "ok");
        assert!(!r.is_error());
    }

    #[test]
    fn synthesized_result_is_an_error() {
        let r = ToolResult::synthesize_missing("call-2");
        assert!(r.is_error());
        assert_eq!(r.call_id, "call-2");
    }
}
