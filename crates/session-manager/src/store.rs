//! Storage boundary
//!
//! A key-value surface the manager persists through. Encryption is applied
//! by the manager before `put` and after `get`, never by the store.

use std::path::PathBuf;

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::debug;

use crate::errors::SessionError;

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, id: &str) -> Result<Option<Vec<u8>>, SessionError>;

    async fn put(&self, id: &str, blob: Vec<u8>) -> Result<(), SessionError>;

    async fn delete(&self, id: &str) -> Result<(), SessionError>;

    async fn list(&self) -> Result<Vec<String>, SessionError>;
}

/// Volatile store for tests and ephemeral runs.
#[derive(Default)]
pub struct MemoryStore {
    blobs: DashMap<String, Vec<u8>>,
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn get(&self, id: &str) -> Result<Option<Vec<u8>>, SessionError> {
        Ok(self.blobs.get(id).map(|entry| entry.clone()))
    }

    async fn put(&self, id: &str, blob: Vec<u8>) -> Result<(), SessionError> {
        self.blobs.insert(id.to_string(), blob);
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), SessionError> {
        self.blobs.remove(id);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<String>, SessionError> {
        Ok(self.blobs.iter().map(|entry| entry.key().clone()).collect())
    }
}

/// Durable store: one JSON blob file per session under a directory.
/// Survives process restarts.
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, id: &str) -> PathBuf {
        // Session ids are UUIDs; sanitize anyway so a hostile id cannot
        // escape the store directory.
        let safe: String = id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
            .collect();
        self.root.join(format!("{}.json", safe))
    }

    async fn ensure_root(&self) -> Result<(), SessionError> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| SessionError::Storage(format!("create {}: {}", self.root.display(), e)))
    }
}

#[async_trait]
impl SessionStore for FileStore {
    async fn get(&self, id: &str) -> Result<Option<Vec<u8>>, SessionError> {
        match tokio::fs::read(self.path_for(id)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(SessionError::Storage(format!("read {}: {}", id, e))),
        }
    }

    async fn put(&self, id: &str, blob: Vec<u8>) -> Result<(), SessionError> {
        self.ensure_root().await?;
        let path = self.path_for(id);
        debug!(path = %path.display(), bytes = blob.len(), "persisting session blob");
        tokio::fs::write(&path, blob)
            .await
            .map_err(|e| SessionError::Storage(format!("write {}: {}", id, e)))
    }

    async fn delete(&self, id: &str) -> Result<(), SessionError> {
        match tokio::fs::remove_file(self.path_for(id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SessionError::Storage(format!("delete {}: {}", id, e))),
        }
    }

    async fn list(&self) -> Result<Vec<String>, SessionError> {
        let mut ids = Vec::new();
        let mut dir = match tokio::fs::read_dir(&self.root).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(ids),
            Err(e) => return Err(SessionError::Storage(format!("list: {}", e))),
        };
        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|e| SessionError::Storage(format!("list: {}", e)))?
        {
            let name = entry.file_name().to_string_lossy().into_owned();
            if let Some(id) = name.strip_suffix(".json") {
                ids.push(id.to_string());
            }
        }
        Ok(ids)
    }
}
