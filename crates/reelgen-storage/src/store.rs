//! Object store seam used by the pipeline.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::Path;
use std::time::Duration;

use crate::client::R2Client;
use crate::error::{StorageError, StorageResult};

/// A time-limited signed URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedUrl {
    pub url: String,
    pub expires_at: DateTime<Utc>,
}

impl SignedUrl {
    /// Stamp `url` with an expiry `ttl` from `now`.
    pub fn new(url: impl Into<String>, now: DateTime<Utc>, ttl: Duration) -> StorageResult<Self> {
        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|e| StorageError::PresignFailed(format!("invalid TTL: {e}")))?;
        Ok(Self {
            url: url.into(),
            expires_at: now + ttl,
        })
    }
}

/// Durable object storage: put, sign, delete.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put_bytes(&self, key: &str, data: Vec<u8>, content_type: &str) -> StorageResult<()>;

    async fn put_file(&self, key: &str, path: &Path, content_type: &str) -> StorageResult<()>;

    /// Signed GET URL valid for `ttl`.
    async fn sign(&self, key: &str, ttl: Duration) -> StorageResult<SignedUrl>;

    async fn delete(&self, key: &str) -> StorageResult<()>;

    async fn exists(&self, key: &str) -> StorageResult<bool>;
}

#[async_trait]
impl ObjectStore for R2Client {
    async fn put_bytes(&self, key: &str, data: Vec<u8>, content_type: &str) -> StorageResult<()> {
        self.upload_bytes(data, key, content_type).await
    }

    async fn put_file(&self, key: &str, path: &Path, content_type: &str) -> StorageResult<()> {
        self.upload_file(path, key, content_type).await
    }

    async fn sign(&self, key: &str, ttl: Duration) -> StorageResult<SignedUrl> {
        let now = Utc::now();
        let url = self.presign_get(key, ttl).await?;
        SignedUrl::new(url, now, ttl)
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.delete_object(key).await
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        R2Client::exists(self, key).await
    }
}

/// MIME type from a file extension.
pub fn content_type_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        Some("mp4") => "video/mp4",
        Some("json") => "application/json",
        _ => "application/octet-stream",
    }
}

/// Object keys.
pub mod keys {
    /// Reference image generated for one segment.
    pub fn segment_reference(session_id: &str, segment_index: usize, role: &str, ext: &str) -> String {
        format!("sessions/{session_id}/references/segment_{segment_index:02}_{role}.{ext}")
    }

    /// Continuity frame seeding `segment_index`.
    pub fn continuity_frame(session_id: &str, segment_index: usize) -> String {
        format!("sessions/{session_id}/frames/seed_{segment_index:02}.jpg")
    }
}
