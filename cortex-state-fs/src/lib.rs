#![deny(missing_docs)]
//! Filesystem-backed implementation of `cortex-core`'s `SessionStore` port.
//!
//! Each session id maps to a `.json` file under the root directory,
//! keyed the same way `neuron-state-fs`'s `FsStore` encodes scope+key
//! pairs into filenames — generalized here to session ids, which are
//! opaque strings with no format requirement, so the same percent-encoding
//! scheme applies directly.

use async_trait::async_trait;
use cortex_core::error::SessionStoreError;
use cortex_core::id::IdGenerator;
use cortex_core::ports::SessionStore;
use layer0::id::SessionId;
use layer0::session::Session;
use std::path::{Path, PathBuf};

/// Filesystem-backed session store.
///
/// Directory layout:
/// ```text
/// root/
///   <url-encoded-session-id>.json
/// ```
pub struct FsStore {
    root: PathBuf,
    ids: IdGenerator,
}

impl FsStore {
    /// Create a new filesystem store rooted at the given directory.
    ///
    /// The directory is created lazily on first write.
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            ids: IdGenerator::new(),
        }
    }

    fn path_for(&self, id: &SessionId) -> PathBuf {
        self.root.join(id_to_filename(id.as_str()))
    }
}

/// Encode an id into a safe filename.
fn id_to_filename(id: &str) -> String {
    let mut encoded = String::new();
    for ch in id.chars() {
        match ch {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' | '.' => encoded.push(ch),
            _ => {
                for byte in ch.to_string().as_bytes() {
                    encoded.push_str(&format!("%{byte:02X}"));
                }
            }
        }
    }
    format!("{encoded}.json")
}

/// Decode a filename back to a session id.
fn filename_to_id(filename: &str) -> Option<String> {
    let name = filename.strip_suffix(".json")?;
    let mut result = Vec::new();
    let bytes = name.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok()?;
            let byte = u8::from_str_radix(hex, 16).ok()?;
            result.push(byte);
            i += 3;
        } else {
            result.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(result).ok()
}

fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[async_trait]
impl SessionStore for FsStore {
    async fn create(&self) -> Result<Session, SessionStoreError> {
        let now = now_millis();
        let id = SessionId::new(self.ids.next(now));
        let session = Session::new(id, now);
        self.save(&session).await?;
        Ok(session)
    }

    async fn get(&self, id: &SessionId) -> Result<Session, SessionStoreError> {
        let path = self.path_for(id);
        match tokio::fs::read_to_string(&path).await {
            Ok(contents) => serde_json::from_str(&contents)
                .map_err(|e| SessionStoreError::Serialization(e.to_string())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(SessionStoreError::NotFound(id.to_string()))
            }
            Err(e) => Err(SessionStoreError::Io(e.to_string())),
        }
    }

    async fn save(&self, session: &Session) -> Result<(), SessionStoreError> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| SessionStoreError::Io(e.to_string()))?;

        let path = self.path_for(&session.id);
        let contents = serde_json::to_string_pretty(session)
            .map_err(|e| SessionStoreError::Serialization(e.to_string()))?;
        tokio::fs::write(&path, contents)
            .await
            .map_err(|e| SessionStoreError::Io(e.to_string()))
    }

    async fn list(&self) -> Result<Vec<SessionId>, SessionStoreError> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => return Err(SessionStoreError::Io(e.to_string())),
        };

        let mut ids = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| SessionStoreError::Io(e.to_string()))?
        {
            if let Some(filename) = entry.file_name().to_str() {
                if let Some(id) = filename_to_id(filename) {
                    ids.push(SessionId::new(id));
                }
            }
        }
        Ok(ids)
    }

    async fn delete(&self, id: &SessionId) -> Result<(), SessionStoreError> {
        let path = self.path_for(id);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SessionStoreError::Io(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_encoding_roundtrip() {
        let ids = ["simple", "time-b36:seq-b36", "has spaces", "emoji🎉"];
        for id in &ids {
            let filename = id_to_filename(id);
            let decoded = filename_to_id(&filename).unwrap();
            assert_eq!(*id, decoded, "roundtrip failed for {id}");
        }
    }

    #[test]
    fn filename_to_id_rejects_non_json() {
        assert!(filename_to_id("test.txt").is_none());
    }

    #[tokio::test]
    async fn create_and_get_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new(dir.path());
        let session = store.create().await.unwrap();
        let loaded = store.get(&session.id).await.unwrap();
        assert_eq!(loaded.id, session.id);
    }

    #[tokio::test]
    async fn get_missing_returns_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new(dir.path());
        let err = store.get(&SessionId::new("missing")).await.unwrap_err();
        assert!(matches!(err, SessionStoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn save_overwrites_existing() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new(dir.path());
        let mut session = store.create().await.unwrap();
        session.metadata.insert("k".into(), "v".into());
        store.save(&session).await.unwrap();

        let loaded = store.get(&session.id).await.unwrap();
        assert_eq!(loaded.metadata.get("k"), Some(&"v".to_string()));
    }

    #[tokio::test]
    async fn delete_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new(dir.path());
        let session = store.create().await.unwrap();
        store.delete(&session.id).await.unwrap();
        assert!(store.get(&session.id).await.is_err());
    }

    #[tokio::test]
    async fn delete_nonexistent_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new(dir.path());
        assert!(store.delete(&SessionId::new("missing")).await.is_ok());
    }

    #[tokio::test]
    async fn list_nonexistent_dir_returns_empty() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("nested");
        let store = FsStore::new(&nested);
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn list_includes_created_sessions() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new(dir.path());
        let a = store.create().await.unwrap();
        let b = store.create().await.unwrap();

        let ids = store.list().await.unwrap();
        assert!(ids.contains(&a.id));
        assert!(ids.contains(&b.id));
    }
}
