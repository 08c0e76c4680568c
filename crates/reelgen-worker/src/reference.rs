//! Reference images: per-segment generation, stored identities, continuity
//! frames. Every URL handed to the video service is a signed URL from the
//! object store.

use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use reelgen_client::{ArtifactDownloader, ImageGenerationService};
use reelgen_media::fs_utils::remove_if_exists;
use reelgen_models::{ReferenceImage, SegmentSpec, SessionId};
use reelgen_storage::{content_type_for, keys, ObjectStore, SignedUrl};

use crate::error::{WorkerError, WorkerResult};
use crate::metrics;
use crate::planner::prompt::image_prompt;

pub struct ReferenceImageProvider {
    images: Arc<dyn ImageGenerationService>,
    downloader: Arc<dyn ArtifactDownloader>,
    store: Arc<dyn ObjectStore>,
    presenter: String,
    ttl: Duration,
    scratch_dir: PathBuf,
}

impl ReferenceImageProvider {
    pub fn new(
        images: Arc<dyn ImageGenerationService>,
        downloader: Arc<dyn ArtifactDownloader>,
        store: Arc<dyn ObjectStore>,
        presenter: impl Into<String>,
        ttl: Duration,
        scratch_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            images,
            downloader,
            store,
            presenter: presenter.into(),
            ttl,
            scratch_dir: scratch_dir.into(),
        }
    }

    /// Generate, persist and sign a reference image for one segment.
    ///
    /// The local copy is always removed. A persistence failure is an error:
    /// the ephemeral generator URL is never used in its place.
    pub async fn generate(&self, session_id: &SessionId, spec: &SegmentSpec) -> WorkerResult<ReferenceImage> {
        let shot = spec.cinematography.shot_type;
        let prompt = image_prompt(&self.presenter, shot, spec.emotion, &spec.dialogue);
        let source_url = self.images.generate(&prompt, shot).await?;

        let local = self
            .scratch_dir
            .join(session_id.as_str())
            .join(format!("reference_{:02}_{}.png", spec.index, spec.role));
        let key = keys::segment_reference(session_id.as_str(), spec.index, spec.role.as_str(), "png");

        let persisted = async {
            if let Some(parent) = local.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| WorkerError::reference_failed(format!("scratch dir: {e}")))?;
            }
            self.downloader
                .download(&source_url, &local)
                .await
                .map_err(|e| WorkerError::reference_failed(format!("download: {e}")))?;
            self.store
                .put_file(&key, &local, content_type_for(&local))
                .await
                .map_err(|e| WorkerError::reference_failed(format!("upload {key}: {e}")))?;
            self.store
                .sign(&key, self.ttl)
                .await
                .map_err(|e| WorkerError::reference_failed(format!("sign {key}: {e}")))
        }
        .await;

        if let Err(e) = remove_if_exists(&local).await {
            warn!(path = %local.display(), "Failed to remove temporary reference: {}", e);
        }
        let signed = persisted?;

        metrics::record_reference_generated();
        info!(
            session_id = %session_id,
            segment = spec.index,
            shot = shot.as_str(),
            "Reference image persisted"
        );
        Ok(ReferenceImage {
            segment_index: spec.index,
            role: spec.role,
            shot_type: shot,
            emotion: spec.emotion,
            ephemeral_source_url: Some(source_url),
            storage_key: key,
            persisted_url: signed.url,
            expires_at: signed.expires_at,
        })
    }

    /// Signed URL for an object already in the store (identity portraits).
    pub async fn sign_stored(&self, storage_key: &str) -> WorkerResult<SignedUrl> {
        Ok(self.store.sign(storage_key, self.ttl).await?)
    }

    /// Upload a continuity frame seeding `segment_index` and sign it.
    pub async fn persist_frame(
        &self,
        session_id: &SessionId,
        segment_index: usize,
        frame: &Path,
    ) -> WorkerResult<SignedUrl> {
        let key = keys::continuity_frame(session_id.as_str(), segment_index);
        self.store.put_file(&key, frame, content_type_for(frame)).await?;
        Ok(self.store.sign(&key, self.ttl).await?)
    }

    /// Reuse `existing` only while it stays valid for `margin`.
    pub fn reusable(existing: Option<&ReferenceImage>, margin: Duration) -> Option<&ReferenceImage> {
        let margin = chrono::Duration::from_std(margin).unwrap_or_else(|_| chrono::Duration::zero());
        existing.filter(|r| r.is_valid_for(Utc::now(), margin))
    }
}
