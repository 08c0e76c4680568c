//! Durable session records.
//!
//! One directory per session holding the downloaded segments, the assembled
//! and captioned files, and `session.json`. The record is replaced atomically
//! on every transition so a crash leaves the last complete state behind.

use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

use reelgen_media::fs_utils::write_atomic;
use reelgen_models::{Session, SessionId};

use crate::error::{WorkerError, WorkerResult};

pub const SESSION_FILE: &str = "session.json";
pub const ASSEMBLED_FILE: &str = "assembled.mp4";
pub const FINAL_FILE: &str = "final.mp4";

#[derive(Debug, Clone)]
pub struct SessionStore {
    root: PathBuf,
}

impl SessionStore {
    /// `root` holds one subdirectory per session.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn session_dir(&self, session_id: &SessionId) -> PathBuf {
        self.root.join(session_id.as_str())
    }

    pub fn record_path(&self, session_id: &SessionId) -> PathBuf {
        self.session_dir(session_id).join(SESSION_FILE)
    }

    pub fn assembled_path(&self, session_id: &SessionId) -> PathBuf {
        self.session_dir(session_id).join(ASSEMBLED_FILE)
    }

    pub fn final_path(&self, session_id: &SessionId) -> PathBuf {
        self.session_dir(session_id).join(FINAL_FILE)
    }

    pub async fn create_dir(&self, session_id: &SessionId) -> WorkerResult<PathBuf> {
        let dir = self.session_dir(session_id);
        fs::create_dir_all(&dir).await?;
        Ok(dir)
    }

    pub async fn save(&self, session: &Session) -> WorkerResult<()> {
        let bytes = serde_json::to_vec_pretty(session)?;
        write_atomic(self.record_path(&session.session_id), &bytes).await?;
        debug!(session_id = %session.session_id, status = session.status.as_str(), "Session saved");
        Ok(())
    }

    pub async fn load(&self, session_id: &SessionId) -> WorkerResult<Session> {
        let path = self.record_path(session_id);
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(WorkerError::SessionNotFound(session_id.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Session ids with a record on disk.
    pub async fn list(&self) -> WorkerResult<Vec<SessionId>> {
        let mut ids = Vec::new();
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(ids),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            if entry.path().join(SESSION_FILE).is_file() {
                if let Some(name) = entry.file_name().to_str() {
                    ids.push(SessionId::from_string(name));
                }
            }
        }
        ids.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        Ok(ids)
    }
}
