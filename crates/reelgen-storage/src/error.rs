//! Object store errors.

use thiserror::Error;

pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object store misconfigured: {0}")]
    ConfigError(String),

    #[error("upload failed: {0}")]
    UploadFailed(String),

    #[error("delete failed: {0}")]
    DeleteFailed(String),

    /// The URL could not be signed; the object is not reachable by the
    /// generation services.
    #[error("signing failed: {0}")]
    PresignFailed(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("R2 request failed: {0}")]
    AwsSdk(String),
}

impl StorageError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn upload_failed(msg: impl Into<String>) -> Self {
        Self::UploadFailed(msg.into())
    }

    pub fn delete_failed(msg: impl Into<String>) -> Self {
        Self::DeleteFailed(msg.into())
    }

    /// Whether repeating the same call may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            StorageError::UploadFailed(_) | StorageError::DeleteFailed(_) | StorageError::AwsSdk(_)
        )
    }
}
