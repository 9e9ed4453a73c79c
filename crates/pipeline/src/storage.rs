//! Blob storage for artifact content.
//!
//! Paths handed to a backend are relative (see
//! `studio_core::artifact_path::storage_path`). Backends never interpret
//! them beyond joining them onto their root.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::RwLock;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Invalid storage path '{0}'")]
    InvalidPath(String),

    #[error("Blob not found: {0}")]
    NotFound(String),

    #[error("Storage I/O error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Byte-oriented blob store.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Write `data` at `relative_path`, creating parent directories as needed.
    async fn save_bytes(&self, relative_path: &str, data: &[u8]) -> Result<(), StorageError>;

    async fn load_bytes(&self, relative_path: &str) -> Result<Vec<u8>, StorageError>;

    /// Remove a blob. Removing a missing blob is not an error.
    async fn delete(&self, relative_path: &str) -> Result<(), StorageError>;
}

// ---------------------------------------------------------------------------
// Local filesystem
// ---------------------------------------------------------------------------

/// Stores blobs as files under a root directory.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Join a relative path onto the root, refusing anything that could escape it.
    fn resolve(&self, relative_path: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(relative_path);
        let is_plain = !relative_path.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !is_plain {
            return Err(StorageError::InvalidPath(relative_path.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

fn io_error(path: &str, source: std::io::Error) -> StorageError {
    if source.kind() == ErrorKind::NotFound {
        StorageError::NotFound(path.to_string())
    } else {
        StorageError::Io {
            path: path.to_string(),
            source,
        }
    }
}

#[async_trait]
impl StorageBackend for LocalStorage {
    async fn save_bytes(&self, relative_path: &str, data: &[u8]) -> Result<(), StorageError> {
        let path = self.resolve(relative_path)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io_error(relative_path, e))?;
        }
        tokio::fs::write(&path, data)
            .await
            .map_err(|e| io_error(relative_path, e))?;
        tracing::debug!(path = %relative_path, bytes = data.len(), "Blob written");
        Ok(())
    }

    async fn load_bytes(&self, relative_path: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.resolve(relative_path)?;
        tokio::fs::read(&path)
            .await
            .map_err(|e| io_error(relative_path, e))
    }

    async fn delete(&self, relative_path: &str) -> Result<(), StorageError> {
        let path = self.resolve(relative_path)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error(relative_path, e)),
        }
    }
}

// ---------------------------------------------------------------------------
// In-memory
// ---------------------------------------------------------------------------

/// Keeps blobs in a map. Used by tests and ephemeral deployments.
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored blobs.
    pub async fn len(&self) -> usize {
        self.blobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.blobs.read().await.is_empty()
    }
}

#[async_trait]
impl StorageBackend for InMemoryStorage {
    async fn save_bytes(&self, relative_path: &str, data: &[u8]) -> Result<(), StorageError> {
        if relative_path.is_empty() {
            return Err(StorageError::InvalidPath(relative_path.to_string()));
        }
        self.blobs
            .write()
            .await
            .insert(relative_path.to_string(), data.to_vec());
        Ok(())
    }

    async fn load_bytes(&self, relative_path: &str) -> Result<Vec<u8>, StorageError> {
        self.blobs
            .read()
            .await
            .get(relative_path)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(relative_path.to_string()))
    }

    async fn delete(&self, relative_path: &str) -> Result<(), StorageError> {
        self.blobs.write().await.remove(relative_path);
        Ok(())
    }
}
