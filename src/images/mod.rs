//! Image ingestion pipeline.
//!
//! Turns a user-supplied file into a reference that can be stored and redisplayed without
//! further resolution. A remote upload is tried first; if it fails or stalls past the
//! configured timeout, the file is downscaled and inlined as a JPEG data URI instead.
//! A misconfigured storage backend therefore degrades image size, never publishing.

mod encode;
mod race;

pub use encode::*;
pub use race::*;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use base64::{engine::general_purpose, Engine as _};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::storage::{ObjectStorage, StorageError};

/// Errors raised while ingesting an image.
#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("image could not be decoded: {0}")]
    Decode(String),
    #[error("image could not be encoded: {0}")]
    Encode(String),
    #[error("image upload failed: {0}")]
    Upload(#[from] StorageError),
    #[error("image upload did not finish in time")]
    UploadTimedOut,
    #[error("image processing task failed: {0}")]
    Task(String),
}

/// A persisted image reference: a network URL or a self-contained data URI.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageReference(String);

impl ImageReference {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// Whether this reference embeds the image itself.
    pub fn is_inline(&self) -> bool {
        self.0.starts_with("data:")
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl From<String> for ImageReference {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A file selected for upload, consumed by a single save.
#[derive(Debug, Clone)]
pub struct UploadableImage {
    pub file_name: String,
    pub bytes: Arc<[u8]>,
}

impl UploadableImage {
    pub fn new(file_name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes: bytes.into(),
        }
    }
}

/// Wire form of an uploaded file: original name plus base64 content.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadPayload {
    pub file_name: String,
    pub data: String,
}

impl UploadPayload {
    /// Decode the payload. Accepts bare base64 or a full data URI.
    pub fn decode(&self) -> Result<UploadableImage, String> {
        let raw = match self.data.split_once(";base64,") {
            Some((_, b64)) if self.data.starts_with("data:") => b64,
            _ => self.data.as_str(),
        };
        let bytes = general_purpose::STANDARD
            .decode(raw.trim())
            .map_err(|e| format!("{} is not valid base64: {}", self.file_name, e))?;
        if bytes.is_empty() {
            return Err(format!("{} is empty", self.file_name));
        }
        Ok(UploadableImage::new(self.file_name.clone(), bytes))
    }
}

/// Phase of an ingestion, reported for display purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadPhase {
    Uploading,
    FallingBack,
    Done,
}

impl fmt::Display for UploadPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UploadPhase::Uploading => write!(f, "Uploading image..."),
            UploadPhase::FallingBack => write!(f, "Processing image locally..."),
            UploadPhase::Done => write!(f, "Image ready"),
        }
    }
}

/// Receiver of progress updates.
pub trait ProgressSink: Send + Sync {
    fn report(&self, phase: UploadPhase);
}

/// Progress sink that writes each phase to the log.
#[derive(Debug, Clone)]
pub struct LogProgress {
    label: String,
}

impl LogProgress {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }
}

impl ProgressSink for LogProgress {
    fn report(&self, phase: UploadPhase) {
        tracing::debug!("[{}] {}", self.label, phase);
    }
}

/// Tunables of the pipeline.
#[derive(Debug, Clone, Copy)]
pub struct PipelineOptions {
    pub upload_timeout: Duration,
    pub max_width: u32,
    pub jpeg_quality: u8,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            upload_timeout: Duration::from_secs(5),
            max_width: 800,
            jpeg_quality: 70,
        }
    }
}

/// Upload-with-fallback image ingestion.
pub struct ImagePipeline {
    storage: Arc<dyn ObjectStorage>,
    options: PipelineOptions,
}

impl ImagePipeline {
    pub fn new(storage: Arc<dyn ObjectStorage>, options: PipelineOptions) -> Self {
        Self { storage, options }
    }

    /// Resolve the image to store for a save.
    ///
    /// Without a file the existing reference is returned untouched. With one, the remote
    /// upload is raced against the timeout and the inline encoding is used if it loses.
    /// Only the inline encoding can fail, and that failure must abort the save.
    pub async fn resolve_image(
        &self,
        file: Option<UploadableImage>,
        existing: ImageReference,
        prefix: &str,
        progress: &dyn ProgressSink,
    ) -> Result<ImageReference, ImageError> {
        let Some(file) = file else {
            return Ok(existing);
        };

        progress.report(UploadPhase::Uploading);
        match self.try_upload(&file, prefix).await {
            Ok(url) => {
                progress.report(UploadPhase::Done);
                return Ok(ImageReference::new(url));
            }
            Err(e) => {
                tracing::warn!(
                    "Upload of {} failed, falling back to inline encoding: {}",
                    file.file_name,
                    e
                );
            }
        }

        progress.report(UploadPhase::FallingBack);
        let reference = self.encode_fallback(file).await?;
        progress.report(UploadPhase::Done);
        Ok(reference)
    }

    /// Upload without fallback, returning the download URL.
    pub async fn upload_direct(
        &self,
        file: UploadableImage,
        prefix: &str,
    ) -> Result<ImageReference, ImageError> {
        self.try_upload(&file, prefix)
            .await
            .map(ImageReference::new)
    }

    async fn try_upload(&self, file: &UploadableImage, prefix: &str) -> Result<String, ImageError> {
        let path = storage_path(prefix, &file.file_name);
        let storage = Arc::clone(&self.storage);
        let bytes = Arc::clone(&file.bytes);

        let upload = async move {
            storage.put(&path, &bytes).await?;
            storage.download_url(&path).await
        };

        match first_settled(upload, self.options.upload_timeout).await {
            Settled::Finished(result) => Ok(result?),
            Settled::Crashed(msg) => Err(ImageError::Task(msg)),
            Settled::TimedOut => Err(ImageError::UploadTimedOut),
        }
    }

    async fn encode_fallback(&self, file: UploadableImage) -> Result<ImageReference, ImageError> {
        let PipelineOptions {
            max_width,
            jpeg_quality,
            ..
        } = self.options;

        tokio::task::spawn_blocking(move || encode_inline(&file.bytes, max_width, jpeg_quality))
            .await
            .map_err(|e| ImageError::Task(e.to_string()))?
    }
}

/// Unique object path: `{prefix}/{unix_millis}_{short_uuid}_{file_name}`.
pub fn storage_path(prefix: &str, file_name: &str) -> String {
    let base = file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();
    let mut safe: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if safe.trim_matches('.').is_empty() {
        safe = "image".to_string();
    }

    let unique = uuid::Uuid::new_v4().simple().to_string();
    format!(
        "{}/{}_{}_{}",
        prefix.trim_matches('/'),
        Utc::now().timestamp_millis(),
        &unique[..8],
        safe
    )
}
