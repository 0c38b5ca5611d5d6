//! Task state — the working memory the ReAct engine mutates per iteration.

use crate::tool_call::ToolResult;
use layer0::id::SessionId;
use layer0::session::{Attachment, Message};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Mutable state threaded through one engine invocation.
///
/// Created by preparation, mutated by the engine on every iteration,
/// and snapshotted (cloned) into the coordinator's result and into any
/// inherited-state merge for a subagent invocation.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskState {
    /// The assembled system prompt for this invocation.
    pub system_prompt: String,
    /// The working message list.
    pub messages: Vec<Message>,
    /// Session this task belongs to.
    pub session: SessionId,
    /// Number of ReAct iterations completed so far.
    pub iteration: u32,
    /// Cumulative tokens consumed so far.
    pub tokens_used: u64,
    /// Results from the most recently executed tool calls.
    pub last_tool_results: Vec<ToolResult>,
    /// Attachments accumulated during this task, prior to session merge.
    pub attachments: Vec<Attachment>,
    /// Plans the agent has formed (free-form, provider-agnostic text).
    pub plans: Vec<String>,
    /// Beliefs the agent holds about the world/task.
    pub beliefs: Vec<String>,
    /// References to external knowledge consulted.
    pub knowledge_refs: Vec<String>,
    /// Free-form world-state key/value snapshot.
    pub world_state: HashMap<String, serde_json::Value>,
    /// Diff applied to `world_state` since the previous snapshot, if tracked.
    pub world_state_diff: HashMap<String, serde_json::Value>,
    /// Free-form feedback signals (e.g. reviewer notes from a prior rework pass).
    pub feedback_signals: Vec<String>,
}

impl TaskState {
    /// Create an empty task state bound to a session with the given
    /// base system prompt.
    pub fn new(session: SessionId, system_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            messages: vec![],
            session,
            iteration: 0,
            tokens_used: 0,
            last_tool_results: vec![],
            attachments: vec![],
            plans: vec![],
            beliefs: vec![],
            knowledge_refs: vec![],
            world_state: HashMap::new(),
            world_state_diff: HashMap::new(),
            feedback_signals: vec![],
        }
    }

    /// Merge inherited state from a parent task (subagent context only).
    /// Clones every field so the parent's state is never aliased.
    pub fn merge_inherited(&mut self, parent: &TaskState) {
        if self.system_prompt.is_empty() {
            self.system_prompt = parent.system_prompt.clone();
        }
        self.messages.splice(0..0, parent.messages.iter().cloned());
        self.attachments.extend(parent.attachments.iter().cloned());
        self.plans.extend(parent.plans.iter().cloned());
        self.beliefs.extend(parent.beliefs.iter().cloned());
        self.knowledge_refs.extend(parent.knowledge_refs.iter().cloned());
        for (k, v) in &parent.world_state {
            self.world_state.entry(k.clone()).or_insert_with(|| v.clone());
        }
        self.feedback_signals.extend(parent.feedback_signals.iter().cloned());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use layer0::id::SessionId;

    #[test]
    fn merge_inherited_clones_not_aliases() {
        let mut parent = TaskState::new(SessionId::new("s1"), "parent prompt");
        parent.plans.push("plan-a".into());

        let mut child = TaskState::new(SessionId::new("s1"), "");
        child.merge_inherited(&parent);

        parent.plans.push("plan-b".into());
        assert_eq!(child.plans, vec!["plan-a".to_string()]);
        assert_eq!(child.system_prompt, "parent prompt");
    }

    #[test]
    fn merge_inherited_prepends_parent_messages() {
        use layer0::session::{Message, MessageSource, Role};

        let mut parent = TaskState::new(SessionId::new("s1"), "p");
        parent
            .messages
            .push(Message::new(Role::User, "hi", MessageSource::UserInput));

        let mut child = TaskState::new(SessionId::new("s1"), "p");
        child
            .messages
            .push(Message::new(Role::Assistant, "child reply", MessageSource::AssistantReply));
        child.merge_inherited(&parent);

        assert_eq!(child.messages.len(), 2);
        assert_eq!(child.messages[0].content, "hi");
    }
}
