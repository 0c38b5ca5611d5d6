#![deny(missing_docs)]
//! In-memory implementation of `cortex-core`'s `SessionStore` port.
//!
//! Uses a `HashMap` behind a `RwLock` for concurrent access, the same
//! backing structure `neuron-state-memory`'s `MemoryStore` uses for
//! layer0's scope-keyed `StateStore` — generalized here to the
//! session-keyed shape `cortex-core::ports::SessionStore` requires.

use async_trait::async_trait;
use cortex_core::error::SessionStoreError;
use cortex_core::id::IdGenerator;
use cortex_core::ports::SessionStore;
use layer0::id::SessionId;
use layer0::session::Session;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// In-memory session store backed by a `HashMap` behind a `RwLock`.
///
/// Suitable for testing, prototyping, and single-process use cases
/// where persistence across restarts is not required.
pub struct MemoryStore {
    sessions: RwLock<HashMap<String, Session>>,
    ids: IdGenerator,
}

impl MemoryStore {
    /// Create a new, empty in-memory store.
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ids: IdGenerator::new(),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn create(&self) -> Result<Session, SessionStoreError> {
        let now = crate::now_millis();
        let id = SessionId::new(self.ids.next(now));
        let session = Session::new(id.clone(), now);
        self.sessions
            .write()
            .await
            .insert(id.as_str().to_string(), session.clone());
        Ok(session)
    }

    async fn get(&self, id: &SessionId) -> Result<Session, SessionStoreError> {
        self.sessions
            .read()
            .await
            .get(id.as_str())
            .cloned()
            .ok_or_else(|| SessionStoreError::NotFound(id.to_string()))
    }

    async fn save(&self, session: &Session) -> Result<(), SessionStoreError> {
        self.sessions
            .write()
            .await
            .insert(session.id.as_str().to_string(), session.clone());
        Ok(())
    }

    async fn list(&self) -> Result<Vec<SessionId>, SessionStoreError> {
        Ok(self
            .sessions
            .read()
            .await
            .keys()
            .map(|k| SessionId::new(k.clone()))
            .collect())
    }

    async fn delete(&self, id: &SessionId) -> Result<(), SessionStoreError> {
        self.sessions.write().await.remove(id.as_str());
        Ok(())
    }
}

/// Milliseconds since the Unix epoch, for session timestamps and id generation.
fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
