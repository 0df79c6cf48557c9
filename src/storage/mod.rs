//! Object storage for uploaded images.
//!
//! Uploads are addressed by a relative path and become fetchable through a download URL.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

/// Errors raised by an object storage backend.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("object storage is not configured")]
    NotConfigured,
    #[error("invalid object path: {0}")]
    InvalidPath(String),
    #[error("object not found: {0}")]
    NotFound(String),
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Narrow interface over the object storage service.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Store `data` under `path`, replacing any existing object.
    async fn put(&self, path: &str, data: &[u8]) -> Result<(), StorageError>;

    /// Canonical URL under which the object at `path` can be fetched.
    async fn download_url(&self, path: &str) -> Result<String, StorageError>;
}

/// Storage backed by a local directory whose contents are served under a public URL prefix.
#[derive(Debug, Clone)]
pub struct LocalObjectStorage {
    root: PathBuf,
    public_base: String,
}

impl LocalObjectStorage {
    pub fn new(root: impl Into<PathBuf>, public_base: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_base: public_base.into(),
        }
    }

    /// Resolve an object path below the root, refusing anything that could escape it.
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

#[async_trait]
impl ObjectStorage for LocalObjectStorage {
    async fn put(&self, path: &str, data: &[u8]) -> Result<(), StorageError> {
        let full = self.resolve(path)?;

        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&full, data).await?;

        tracing::debug!("Stored {} ({} bytes)", path, data.len());
        Ok(())
    }

    async fn download_url(&self, path: &str) -> Result<String, StorageError> {
        let full = self.resolve(path)?;

        if !fs::try_exists(&full).await? {
            return Err(StorageError::NotFound(path.to_string()));
        }

        Ok(format!("{}/{}", self.public_base.trim_end_matches('/'), path))
    }
}

/// Storage used when no backend is configured. Every upload fails, so images fall back inline.
#[derive(Debug, Clone, Default)]
pub struct UnconfiguredStorage;

#[async_trait]
impl ObjectStorage for UnconfiguredStorage {
    async fn put(&self, _path: &str, _data: &[u8]) -> Result<(), StorageError> {
        Err(StorageError::NotConfigured)
    }

    async fn download_url(&self, _path: &str) -> Result<String, StorageError> {
        Err(StorageError::NotConfigured)
    }
}
