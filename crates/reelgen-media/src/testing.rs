//! In-memory toolkit for unit tests.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::assemble::AssemblyOptions;
use crate::captions::{CaptionStyle, CaptionWord};
use crate::error::{MediaError, MediaResult};
use crate::probe::VideoInfo;
use crate::toolkit::EncodingToolkit;

/// Records calls and writes placeholder outputs.
pub(crate) struct FakeToolkit {
    duration: f64,
    fail_concat: bool,
    seeks: Mutex<Vec<f64>>,
    concatenated: Mutex<Vec<Vec<PathBuf>>>,
    captions: Mutex<Vec<Vec<CaptionWord>>>,
}

impl FakeToolkit {
    pub fn with_duration(duration: f64) -> Self {
        Self {
            duration,
            fail_concat: false,
            seeks: Mutex::new(Vec::new()),
            concatenated: Mutex::new(Vec::new()),
            captions: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_concat(mut self) -> Self {
        self.fail_concat = true;
        self
    }

    pub fn seeks(&self) -> Vec<f64> {
        self.seeks.lock().unwrap().clone()
    }

    pub fn concatenated(&self) -> Vec<Vec<PathBuf>> {
        self.concatenated.lock().unwrap().clone()
    }

    pub fn captions(&self) -> Vec<Vec<CaptionWord>> {
        self.captions.lock().unwrap().clone()
    }
}

#[async_trait]
impl EncodingToolkit for FakeToolkit {
    async fn probe(&self, _path: &Path) -> MediaResult<VideoInfo> {
        Ok(VideoInfo {
            duration: self.duration,
            width: 1080,
            height: 1920,
            fps: 30.0,
            codec: "h264".to_string(),
            has_audio: true,
        })
    }

    async fn extract_frame(&self, _video: &Path, seek_secs: f64, output: &Path) -> MediaResult<()> {
        self.seeks.lock().unwrap().push(seek_secs);
        tokio::fs::write(output, b"jpeg").await?;
        Ok(())
    }

    async fn concatenate(&self, clips: &[PathBuf], _options: &AssemblyOptions, output: &Path) -> MediaResult<f64> {
        if self.fail_concat {
            tokio::fs::write(output, b"partial").await?;
            return Err(MediaError::ffmpeg_failed("boom", None, Some(1)));
        }
        self.concatenated.lock().unwrap().push(clips.to_vec());
        tokio::fs::write(output, b"assembled").await?;
        Ok(self.duration * clips.len() as f64)
    }

    async fn burn_captions(
        &self,
        _input: &Path,
        words: &[CaptionWord],
        _style: &CaptionStyle,
        output: &Path,
    ) -> MediaResult<()> {
        self.captions.lock().unwrap().push(words.to_vec());
        tokio::fs::write(output, b"captioned").await?;
        Ok(())
    }
}
