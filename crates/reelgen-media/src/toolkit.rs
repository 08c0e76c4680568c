//! Encoding toolkit seam.
//!
//! The continuity, assembly and caption components only talk to
//! [`EncodingToolkit`]; [`FfmpegToolkit`] is the FFmpeg/FFprobe-backed
//! implementation.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio::sync::watch;
use tracing::{debug, info};

use reelgen_models::EncodingConfig;

use crate::assemble::{AssemblyOptions, Transition};
use crate::captions::{build_drawtext_filter, CaptionStyle, CaptionWord};
use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::filters::{build_join_graph, GraphInput, AUDIO_OUT, VIDEO_OUT};
use crate::probe::{probe_video, VideoInfo};

/// Video encoding operations the pipeline depends on.
#[async_trait]
pub trait EncodingToolkit: Send + Sync {
    /// Probe duration and streams of a media file.
    async fn probe(&self, path: &Path) -> MediaResult<VideoInfo>;

    /// Write the frame at `seek_secs` of `video` to `output` as a still image.
    async fn extract_frame(&self, video: &Path, seek_secs: f64, output: &Path) -> MediaResult<()>;

    /// Join `clips` in the given order into `output`. Returns the output
    /// duration in seconds.
    async fn concatenate(&self, clips: &[PathBuf], options: &AssemblyOptions, output: &Path) -> MediaResult<f64>;

    /// Render `words` over `input` into `output`.
    async fn burn_captions(
        &self,
        input: &Path,
        words: &[CaptionWord],
        style: &CaptionStyle,
        output: &Path,
    ) -> MediaResult<()>;
}

/// FFmpeg CLI implementation of [`EncodingToolkit`].
#[derive(Debug, Clone, Default)]
pub struct FfmpegToolkit {
    encoding: EncodingConfig,
    timeout_secs: Option<u64>,
    cancel_rx: Option<watch::Receiver<bool>>,
}

impl FfmpegToolkit {
    pub fn new(encoding: EncodingConfig) -> Self {
        Self {
            encoding,
            ..Default::default()
        }
    }

    /// Kill any FFmpeg run exceeding `secs`.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    pub fn with_cancel(mut self, cancel_rx: watch::Receiver<bool>) -> Self {
        self.cancel_rx = Some(cancel_rx);
        self
    }

    fn runner(&self) -> FfmpegRunner {
        let mut runner = FfmpegRunner::new();
        if let Some(secs) = self.timeout_secs {
            runner = runner.with_timeout(secs);
        }
        if let Some(rx) = &self.cancel_rx {
            runner = runner.with_cancel(rx.clone());
        }
        runner
    }

    async fn run_timed(&self, operation: &'static str, cmd: &FfmpegCommand) -> MediaResult<()> {
        let started = Instant::now();
        let result = self.runner().run(cmd).await;
        metrics::histogram!("reelgen_ffmpeg_duration_seconds", "operation" => operation)
            .record(started.elapsed().as_secs_f64());
        if result.is_err() {
            metrics::counter!("reelgen_ffmpeg_failures_total", "operation" => operation).increment(1);
        }
        result
    }
}

#[async_trait]
impl EncodingToolkit for FfmpegToolkit {
    async fn probe(&self, path: &Path) -> MediaResult<VideoInfo> {
        probe_video(path).await
    }

    async fn extract_frame(&self, video: &Path, seek_secs: f64, output: &Path) -> MediaResult<()> {
        let cmd = FfmpegCommand::new(video, output)
            .seek(seek_secs)
            .single_frame()
            .quality_scale(1);
        self.run_timed("extract_frame", &cmd).await
    }

    async fn concatenate(&self, clips: &[PathBuf], options: &AssemblyOptions, output: &Path) -> MediaResult<f64> {
        if clips.is_empty() {
            return Err(MediaError::NoSegments);
        }

        let mut segments = Vec::with_capacity(clips.len());
        for clip in clips {
            let info = probe_video(clip).await?;
            segments.push(GraphInput::new(info.duration, info.has_audio));
        }

        let outro = match &options.outro {
            Some(outro) => {
                let info = probe_video(&outro.path).await?;
                if let Some(last) = segments.last_mut() {
                    last.freeze_tail = outro.freeze_secs;
                }
                Some(GraphInput::new(info.duration, info.has_audio))
            }
            None => None,
        };

        let crossfade = match options.transition {
            Transition::HardCut => None,
            Transition::Crossfade { duration_secs } => Some(duration_secs),
        };
        let graph = build_join_graph(&segments, outro.as_ref(), crossfade, &self.encoding);
        debug!(graph = %graph.graph, "Built assembly filter graph");

        let mut inputs: Vec<&Path> = clips.iter().map(PathBuf::as_path).collect();
        if let Some(outro) = &options.outro {
            inputs.push(outro.path.as_path());
        }

        let cmd = FfmpegCommand::with_inputs(inputs, output)
            .filter_complex(graph.graph)
            .map(VIDEO_OUT)
            .map(AUDIO_OUT)
            .output_args(self.encoding.to_ffmpeg_args());
        self.run_timed("concatenate", &cmd).await?;

        let duration = probe_video(output).await.map(|i| i.duration).unwrap_or(graph.duration);
        info!(
            output = %output.display(),
            clips = clips.len(),
            duration,
            "Concatenated segments"
        );
        Ok(duration)
    }

    async fn burn_captions(
        &self,
        input: &Path,
        words: &[CaptionWord],
        style: &CaptionStyle,
        output: &Path,
    ) -> MediaResult<()> {
        if words.is_empty() {
            tokio::fs::copy(input, output).await?;
            return Ok(());
        }

        let cmd = FfmpegCommand::new(input, output)
            .video_filter(build_drawtext_filter(words, style))
            .output_args(self.encoding.to_ffmpeg_args());
        self.run_timed("burn_captions", &cmd).await
    }
}
