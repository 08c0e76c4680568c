//! Worker error types.

use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

/// Plan validation failure. Raised before any external call is made.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error("Unknown content type '{0}' and no pattern override given")]
    UnknownContentType(String),

    #[error("Content type '{0}' has no fallback dialogue; a script is required")]
    ScriptRequired(String),

    #[error("Script has {actual} segments, preset requires {expected}")]
    ScriptLengthMismatch { expected: usize, actual: usize },

    #[error("Invalid script: {0}")]
    InvalidScript(String),

    #[error("Segment {segment}: dialogue has {count} words, expected {min}-{max}")]
    WordCountOutOfRange {
        segment: usize,
        count: usize,
        min: usize,
        max: usize,
    },

    #[error("Segment {segment}: dialogue contains forbidden term '{term}'")]
    ForbiddenTerm { segment: usize, term: String },

    #[error("Segment {segment}: dialogue is empty")]
    EmptyDialogue { segment: usize },

    #[error("Segment {segment}: missing {field}")]
    MissingField { segment: usize, field: &'static str },

    #[error("Character index {index} out of range ({available} identities)")]
    InvalidCharacterIndex { index: usize, available: usize },

    #[error("Plan segments use different character seeds")]
    MixedCharacterSeeds,

    #[error("Unsupported segment count {0}")]
    UnsupportedSegmentCount(usize),
}

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Plan validation failed: {0}")]
    Plan(#[from] PlanError),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Session {0} is finalized")]
    SessionFinalized(String),

    #[error("Reference image failed: {0}")]
    ReferenceFailed(String),

    /// Signed URL past its expiry. Needs a new reference, not a retry.
    #[error("Reference for segment {segment} expired")]
    ReferenceExpired { segment: usize },

    #[error("Generation timed out for task {task_id} after {attempts} polls")]
    GenerationTimeout { task_id: String, attempts: u32 },

    #[error("Generation failed for task {task_id}: {message}")]
    GenerationFailed { task_id: String, message: String },

    #[error("Session aborted")]
    Aborted,

    #[error("Task state error: {0}")]
    Transition(#[from] reelgen_models::TransitionError),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Storage error: {0}")]
    Storage(#[from] reelgen_storage::StorageError),

    #[error("Service error: {0}")]
    Client(#[from] reelgen_client::ClientError),

    #[error("Media error: {0}")]
    Media(#[from] reelgen_media::MediaError),

    #[error("Session record error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn reference_failed(msg: impl Into<String>) -> Self {
        Self::ReferenceFailed(msg.into())
    }

    pub fn download_failed(msg: impl Into<String>) -> Self {
        Self::DownloadFailed(msg.into())
    }

    /// Check if error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            WorkerError::Client(e) => e.is_transient(),
            WorkerError::Storage(e) => e.is_transient(),
            WorkerError::DownloadFailed(_) => true,
            _ => false,
        }
    }

    /// Rejected before any external call.
    pub fn is_validation(&self) -> bool {
        matches!(self, WorkerError::Plan(_))
    }
}
