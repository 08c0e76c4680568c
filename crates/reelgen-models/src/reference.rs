//! Persisted reference images.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::cinematography::ShotType;
use crate::script::{Emotion, Role};

/// Reference image persisted behind a signed URL.
///
/// `persisted_url` is the only URL handed to the video service; the
/// ephemeral source URL is kept for diagnostics only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceImage {
    pub segment_index: usize,
    pub role: Role,
    pub shot_type: ShotType,
    pub emotion: Emotion,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ephemeral_source_url: Option<String>,
    pub storage_key: String,
    pub persisted_url: String,
    pub expires_at: DateTime<Utc>,
}

impl ReferenceImage {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Whether the URL is still valid for at least `margin` from `now`.
    pub fn is_valid_for(&self, now: DateTime<Utc>, margin: chrono::Duration) -> bool {
        now + margin < self.expires_at
    }
}
