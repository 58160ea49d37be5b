//! Object storage abstraction for document binaries
//!
//! Document records live in the backing store; the bytes live behind this
//! trait. The trait is mockable with `mockall` so purge paths can be tested
//! against a storage backend that fails or hangs.
//!
//! ```rust,no_run
//! use agency_desk::storage::{LocalObjectStorage, ObjectStorage};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), agency_desk::storage::StorageError> {
//!     let storage = LocalObjectStorage::new(".agency-desk/objects");
//!     storage.put_object("policy/abc/poliza.pdf", b"%PDF-1.7").await?;
//!     assert!(storage.exists("policy/abc/poliza.pdf").await?);
//!     storage.delete_object("policy/abc/poliza.pdf").await?;
//!     Ok(())
//! }
//! ```
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tracing::debug;

#[cfg(test)]
use mockall::automock;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object '{0}' not found")]
    NotFound(String),

    #[error("invalid object path '{0}'")]
    InvalidPath(String),

    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage backend unavailable: {0}")]
    Unavailable(String),
}

#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Stores `contents` under `path`, replacing any existing object
    async fn put_object(&self, path: &str, contents: &[u8]) -> Result<(), StorageError>;

    /// Deletes the object. Deleting a missing object is `NotFound`.
    async fn delete_object(&self, path: &str) -> Result<(), StorageError>;

    async fn exists(&self, path: &str) -> Result<bool, StorageError>;
}

/// Stores objects as files below a root directory
#[derive(Debug, Clone)]
pub struct LocalObjectStorage {
    root: PathBuf,
}

impl LocalObjectStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Object paths are relative and may not escape the root
    fn resolve(&self, path: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(path);
        let safe = !path.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !safe {
            return Err(StorageError::InvalidPath(path.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait::async_trait]
impl ObjectStorage for LocalObjectStorage {
    async fn put_object(&self, path: &str, contents: &[u8]) -> Result<(), StorageError> {
        let target = self.resolve(path)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&target, contents).await?;
        debug!(path, bytes = contents.len(), "Object stored");
        Ok(())
    }

    async fn delete_object(&self, path: &str) -> Result<(), StorageError> {
        let target = self.resolve(path)?;
        match fs::remove_file(&target).await {
            Ok(()) => {
                debug!(path, "Object deleted");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(path.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, path: &str) -> Result<bool, StorageError> {
        let target = self.resolve(path)?;
        Ok(fs::try_exists(&target).await?)
    }
}
