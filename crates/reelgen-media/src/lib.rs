//! FFmpeg CLI wrapper for reel assembly.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building with multiple inputs
//! - Progress tracing from `-progress pipe:2`
//! - Cancellation and timeouts via tokio
//! - Last-frame extraction for continuity seeding
//! - Segment assembly with hard cuts, crossfades and a frozen outro lead-in
//! - Word-level caption timing and burn-in

pub mod assemble;
pub mod captions;
pub mod command;
pub mod error;
pub mod filters;
pub mod frame;
pub mod fs_utils;
pub mod probe;
mod progress;
pub mod toolkit;

#[cfg(test)]
pub(crate) mod testing;

pub use assemble::{
    AssemblyOptions, AssemblyReport, OutroSpec, SegmentAssembler, SegmentClip, Transition,
};
pub use captions::{CaptionStyle, CaptionSynchronizer, CaptionTrack, CaptionWord};
pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use error::{MediaError, MediaResult};
pub use frame::{last_frame_seek, ContinuityExtractor};
pub use probe::{probe_video, VideoInfo};
pub use toolkit::{EncodingToolkit, FfmpegToolkit};
