//! In-memory/no-op port implementations for testing, behind the
//! `test-utils` feature. Generalizes `layer0::test_utils`'s
//! `EchoOperator`/`InMemoryStore` fakes to the `cortex-core` ports.

use crate::error::{ModelError, SessionStoreError};
use crate::ports::{CompletionRequest, CompletionResponse, ModelClient, SessionStore, Usage};
use async_trait::async_trait;
use layer0::id::SessionId;
use layer0::session::Session;
use std::collections::HashMap;
use std::sync::Mutex;

/// A `SessionStore` backed by a `HashMap` guarded by a `Mutex`.
pub struct InMemorySessionStore {
    sessions: Mutex<HashMap<String, Session>>,
    counter: std::sync::atomic::AtomicU64,
}

impl InMemorySessionStore {
    /// Create a new, empty store.
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            counter: std::sync::atomic::AtomicU64::new(0),
        }
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn create(&self) -> Result<Session, SessionStoreError> {
        let n = self
            .counter
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        let id = SessionId::new(format!("session-{n}"));
        let session = Session::new(id.clone(), 0);
        self.sessions
            .lock()
            .unwrap()
            .insert(id.as_str().to_string(), session.clone());
        Ok(session)
    }

    async fn get(&self, id: &SessionId) -> Result<Session, SessionStoreError> {
        self.sessions
            .lock()
            .unwrap()
            .get(id.as_str())
            .cloned()
            .ok_or_else(|| SessionStoreError::NotFound(id.to_string()))
    }

    async fn save(&self, session: &Session) -> Result<(), SessionStoreError> {
        self.sessions
            .lock()
            .unwrap()
            .insert(session.id.as_str().to_string(), session.clone());
        Ok(())
    }

    async fn list(&self) -> Result<Vec<SessionId>, SessionStoreError> {
        Ok(self
            .sessions
            .lock()
            .unwrap()
            .keys()
            .map(|k| SessionId::new(k.clone()))
            .collect())
    }

    async fn delete(&self, id: &SessionId) -> Result<(), SessionStoreError> {
        self.sessions.lock().unwrap().remove(id.as_str());
        Ok(())
    }
}

/// A `ModelClient` that echoes the last user message back as a final
/// answer, with zero tool calls and fabricated usage. Used to drive the
/// engine end-to-end in tests without a real provider.
pub struct EchoModelClient {
    model: String,
}

impl EchoModelClient {
    /// Create a new echo client reporting the given model name.
    pub fn new(model: impl Into<String>) -> Self {
        Self { model: model.into() }
    }
}

#[async_trait]
impl ModelClient for EchoModelClient {
    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, ModelError> {
        let last_user = request
            .messages
            .iter()
            .rev()
            .find(|m| m.role == layer0::session::Role::User)
            .map(|m| m.content.clone())
            .unwrap_or_default();
        Ok(CompletionResponse {
            content: format!("echo: {last_user}"),
            tool_calls: vec![],
            stop_reason: "end_turn".into(),
            usage: Usage::new(last_user.len() as u64, 8),
        })
    }

    fn model(&self) -> &str {
        &self.model
    }
}
