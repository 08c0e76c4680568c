//! Last-frame extraction for continuity seeding.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::fs;
use tracing::{debug, info, warn};

use crate::error::{MediaError, MediaResult};
use crate::toolkit::EncodingToolkit;

/// How far before the end of the clip the last frame is taken.
pub const LAST_FRAME_OFFSET_SECS: f64 = 0.1;

const FRAME_EXTENSION: &str = "jpg";

/// Seek position of the last frame. Never negative.
pub fn last_frame_seek(duration: f64) -> f64 {
    if !duration.is_finite() {
        return 0.0;
    }
    (duration - LAST_FRAME_OFFSET_SECS).max(0.0)
}

/// Extracts last frames into a frames directory and purges old ones.
pub struct ContinuityExtractor {
    toolkit: Arc<dyn EncodingToolkit>,
    frames_dir: PathBuf,
}

impl ContinuityExtractor {
    pub fn new(toolkit: Arc<dyn EncodingToolkit>, frames_dir: impl Into<PathBuf>) -> Self {
        Self {
            toolkit,
            frames_dir: frames_dir.into(),
        }
    }

    pub fn frames_dir(&self) -> &Path {
        &self.frames_dir
    }

    /// Where the last frame of `video` is written.
    pub fn frame_path_for(&self, video: &Path) -> PathBuf {
        let stem = video
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "clip".to_string());
        self.frames_dir
            .join(format!("{stem}_last.{FRAME_EXTENSION}"))
    }

    /// Extract the last frame of `video` at maximum still quality.
    pub async fn extract_last_frame(&self, video: &Path) -> MediaResult<PathBuf> {
        if !video.exists() {
            return Err(MediaError::FileNotFound(video.to_path_buf()));
        }
        fs::create_dir_all(&self.frames_dir).await?;

        let info = self.toolkit.probe(video).await?;
        let seek = last_frame_seek(info.duration);
        let output = self.frame_path_for(video);

        debug!(
            video = %video.display(),
            duration = info.duration,
            seek,
            "Extracting last frame"
        );
        self.toolkit.extract_frame(video, seek, &output).await?;

        if !output.exists() {
            return Err(MediaError::InvalidVideo(format!(
                "No frame extracted from {} at {:.3}s",
                video.display(),
                seek
            )));
        }
        Ok(output)
    }

    /// An extractor writing into `frames_dir/<name>`, sharing this toolkit.
    ///
    /// Each session extracts into its own subdirectory so clips with the
    /// same file name never overwrite each other's frames.
    pub fn scoped(&self, name: &str) -> Self {
        Self {
            toolkit: self.toolkit.clone(),
            frames_dir: self.frames_dir.join(name),
        }
    }

    /// Delete extracted frames older than `max_age`, including those in
    /// scoped subdirectories. Emptied subdirectories are removed. Returns how
    /// many frames were removed; failures are logged and skipped.
    pub async fn purge_older_than(&self, max_age: Duration) -> usize {
        let now = SystemTime::now();
        let mut subdirs = Vec::new();
        let mut removed = purge_dir(&self.frames_dir, max_age, now, Some(&mut subdirs)).await;
        for dir in subdirs {
            removed += purge_dir(&dir, max_age, now, None).await;
            // Fails while frames remain
            let _ = fs::remove_dir(&dir).await;
        }

        if removed > 0 {
            info!(removed, dir = %self.frames_dir.display(), "Purged old continuity frames");
        }
        removed
    }
}

/// Remove frames in `dir` older than `max_age`, collecting subdirectories
/// into `subdirs` when given.
async fn purge_dir(
    dir: &Path,
    max_age: Duration,
    now: SystemTime,
    mut subdirs: Option<&mut Vec<PathBuf>>,
) -> usize {
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return 0,
        Err(e) => {
            warn!(dir = %dir.display(), "Cannot list frames directory: {}", e);
            return 0;
        }
    };

    let mut removed = 0;
    loop {
        let entry = match entries.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(e) => {
                warn!("Failed to read frames directory entry: {}", e);
                break;
            }
        };
        let path = entry.path();
        let metadata = match entry.metadata().await {
            Ok(metadata) => metadata,
            Err(e) => {
                warn!(path = %path.display(), "Cannot read frame metadata: {}", e);
                continue;
            }
        };
        if metadata.is_dir() {
            if let Some(subdirs) = subdirs.as_mut() {
                subdirs.push(path);
            }
            continue;
        }
        if path.extension().and_then(|e| e.to_str()) != Some(FRAME_EXTENSION) {
            continue;
        }

        let age = match metadata.modified() {
            Ok(modified) => now.duration_since(modified).unwrap_or_default(),
            Err(e) => {
                warn!(path = %path.display(), "Cannot read frame age: {}", e);
                continue;
            }
        };
        if age < max_age {
            continue;
        }

        match fs::remove_file(&path).await {
            Ok(()) => removed += 1,
            Err(e) => warn!(path = %path.display(), "Failed to purge frame: {}", e),
        }
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeToolkit;
    use tempfile::TempDir;

    #[test]
    fn test_seek_never_negative() {
        assert_eq!(last_frame_seek(0.05), 0.0);
        assert_eq!(last_frame_seek(0.0), 0.0);
        assert_eq!(last_frame_seek(f64::NAN), 0.0);
        assert!((last_frame_seek(8.0) - 7.9).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_extract_last_frame_of_tiny_clip_seeks_zero() {
        let dir = TempDir::new().unwrap();
        let video = dir.path().join("segment_00_intro.mp4");
        fs::write(&video, b"mp4").await.unwrap();

        let toolkit = Arc::new(FakeToolkit::with_duration(0.05));
        let extractor = ContinuityExtractor::new(toolkit.clone(), dir.path().join("frames"));

        let frame = extractor.extract_last_frame(&video).await.unwrap();
        assert!(frame.exists());
        assert!(frame.ends_with("frames/segment_00_intro_last.jpg"));
        assert_eq!(toolkit.seeks(), vec![0.0]);
    }

    #[tokio::test]
    async fn test_extract_missing_video() {
        let dir = TempDir::new().unwrap();
        let extractor = ContinuityExtractor::new(Arc::new(FakeToolkit::with_duration(8.0)), dir.path());
        let err = extractor
            .extract_last_frame(&dir.path().join("nope.mp4"))
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::FileNotFound(_)));
    }

    #[tokio::test]
    async fn test_purge_only_touches_frames() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a_last.jpg"), b"x").await.unwrap();
        fs::write(dir.path().join("b_last.jpg"), b"x").await.unwrap();
        fs::write(dir.path().join("notes.txt"), b"x").await.unwrap();

        let extractor = ContinuityExtractor::new(Arc::new(FakeToolkit::with_duration(8.0)), dir.path());

        assert_eq!(extractor.purge_older_than(Duration::from_secs(24 * 3600)).await, 0);
        assert_eq!(extractor.purge_older_than(Duration::ZERO).await, 2);
        assert!(dir.path().join("notes.txt").exists());
    }

    #[tokio::test]
    async fn test_scoped_extractors_write_apart() {
        let dir = TempDir::new().unwrap();
        let video = dir.path().join("segment_01_middle.mp4");
        fs::write(&video, b"mp4").await.unwrap();

        let root = ContinuityExtractor::new(Arc::new(FakeToolkit::with_duration(8.0)), dir.path().join("frames"));
        let a = root.scoped("session-a").extract_last_frame(&video).await.unwrap();
        let b = root.scoped("session-b").extract_last_frame(&video).await.unwrap();

        assert_ne!(a, b);
        assert!(a.ends_with("frames/session-a/segment_01_middle_last.jpg"));
        assert!(b.exists());
    }

    #[tokio::test]
    async fn test_purge_descends_into_session_dirs() {
        let dir = TempDir::new().unwrap();
        let session = dir.path().join("session-a");
        fs::create_dir_all(&session).await.unwrap();
        fs::write(dir.path().join("a_last.jpg"), b"x").await.unwrap();
        fs::write(session.join("b_last.jpg"), b"x").await.unwrap();

        let extractor = ContinuityExtractor::new(Arc::new(FakeToolkit::with_duration(8.0)), dir.path());

        assert_eq!(extractor.purge_older_than(Duration::from_secs(3600)).await, 0);
        assert!(session.exists());
        assert_eq!(extractor.purge_older_than(Duration::ZERO).await, 2);
        assert!(!session.exists());
    }

    #[tokio::test]
    async fn test_purge_missing_dir_is_not_fatal() {
        let dir = TempDir::new().unwrap();
        let extractor =
            ContinuityExtractor::new(Arc::new(FakeToolkit::with_duration(8.0)), dir.path().join("absent"));
        assert_eq!(extractor.purge_older_than(Duration::ZERO).await, 0);
    }
}
