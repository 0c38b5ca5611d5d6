//! Session and message types — per-conversation continuity across invocations.

use crate::id::SessionId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A conversation session: the ordered message log, attachments, and
/// metadata a coordinator binds a task to and persists at the end of
/// execution.
///
/// Owned by the session store. Mutated only at persist time — the
/// operator runtime reads a session through `&dyn StateReader` and
/// declares writes as `Effect::WriteMemory`, it never mutates a
/// `Session` value directly.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Opaque session identity.
    pub id: SessionId,
    /// Ordered message log.
    pub messages: Vec<Message>,
    /// Attachments keyed by logical name. Deduplicated at persist time.
    pub attachments: HashMap<String, Attachment>,
    /// Free-form metadata.
    pub metadata: HashMap<String, String>,
    /// Creation timestamp (milliseconds since epoch).
    pub created_at: u64,
    /// Last-updated timestamp (milliseconds since epoch).
    pub updated_at: u64,
}

impl Session {
    /// Create a new, empty session.
    pub fn new(id: SessionId, now: u64) -> Self {
        Self {
            id,
            messages: vec![],
            attachments: HashMap::new(),
            metadata: HashMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Messages eligible for persistence: everything except entries
    /// tagged as transient history recall.
    ///
    /// `user_history` messages exist only to give the model recalled
    /// context for one invocation; persisting them would duplicate
    /// history on every reload.
    pub fn persistable_messages(&self) -> impl Iterator<Item = &Message> {
        self.messages
            .iter()
            .filter(|m| m.source != MessageSource::UserHistory)
    }
}

/// Who/what is speaking in a message.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// System prompt / instructions.
    System,
    /// Human input.
    User,
    /// Model output.
    Assistant,
    /// Tool execution result.
    Tool,
}

/// Where a message came from. Load-bearing: history recall, persistence
/// sanitation, and event routing all branch on this tag.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MessageSource {
    /// The base system prompt assembled for this invocation.
    SystemPrompt,
    /// Verbatim input from the user.
    UserInput,
    /// Recalled prior conversation turns, injected for context. Never persisted.
    UserHistory,
    /// A model-generated reply.
    AssistantReply,
    /// The textual result of a tool call.
    ToolResult,
    /// Diagnostic/internal content, excluded from normal rendering.
    Debug,
}

/// One turn in a session's message log.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Who produced this message.
    pub role: Role,
    /// The message's textual content.
    pub content: String,
    /// Ordered tool calls the model requested, if any.
    #[serde(default)]
    pub tool_calls: Vec<crate::content::ContentBlock>,
    /// Tool results attached to this message, if any.
    #[serde(default)]
    pub tool_results: Vec<crate::content::ContentBlock>,
    /// Attachments carried inline with this message, deduplicated into
    /// the session's attachment map at persist time.
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    /// Free-form metadata.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    /// Why this message exists.
    pub source: MessageSource,
}

impl Message {
    /// Create a new message with required fields and empty extras.
    pub fn new(role: Role, content: impl Into<String>, source: MessageSource) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: vec![],
            tool_results: vec![],
            attachments: vec![],
            metadata: HashMap::new(),
            source,
        }
    }
}

/// A file or blob referenced by a message or session.
///
/// Invariant: once `storage_key` is populated (the attachment has been
/// persisted to external storage), `inline_data` is cleared — the two
/// are mutually exclusive in practice, though both are modeled as
/// `Option` because the transition is a runtime event, not a type-level
/// guarantee.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    /// Logical name, used as the key in a session's attachment map.
    pub name: String,
    /// MIME type.
    pub media_type: String,
    /// Inline base64-encoded data, present only before external persistence.
    pub inline_data: Option<String>,
    /// Key into external blob storage, present only after persistence.
    pub storage_key: Option<String>,
    /// A directly-addressable URI, when the attachment lives at a stable location.
    pub uri: Option<String>,
    /// Size in bytes.
    pub size: u64,
    /// SHA-256 checksum of the attachment's bytes, hex-encoded.
    pub checksum: String,
    /// Where this attachment originated.
    pub source: MessageSource,
}

impl Attachment {
    /// True once the attachment has been persisted to external storage
    /// and its inline data cleared.
    pub fn is_externalized(&self) -> bool {
        self.storage_key.is_some() && self.inline_data.is_none()
    }
}
