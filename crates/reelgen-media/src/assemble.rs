//! Segment assembly.
//!
//! Clips are joined in plan order, whatever order they finished generating
//! in. Every input is checked before the encoder runs; on failure the
//! partial output is removed and the segment files are left untouched.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use reelgen_models::Role;

use crate::error::{MediaError, MediaResult};
use crate::fs_utils::remove_if_exists;
use crate::toolkit::EncodingToolkit;

/// Default crossfade length.
pub const DEFAULT_CROSSFADE_SECS: f64 = 0.5;
/// Default freeze on the last real frame before the outro.
pub const DEFAULT_FREEZE_SECS: f64 = 0.5;

/// How consecutive segments are joined.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Transition {
    #[default]
    HardCut,
    Crossfade { duration_secs: f64 },
}

impl Transition {
    pub fn crossfade() -> Self {
        Transition::Crossfade {
            duration_secs: DEFAULT_CROSSFADE_SECS,
        }
    }
}

/// Fixed outro appended after the last segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutroSpec {
    pub path: PathBuf,
    /// Hold on the last real frame before cutting to the outro
    pub freeze_secs: f64,
}

impl OutroSpec {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            freeze_secs: DEFAULT_FREEZE_SECS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct AssemblyOptions {
    pub transition: Transition,
    pub outro: Option<OutroSpec>,
}

/// A downloaded segment clip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentClip {
    /// Position in the plan
    pub index: usize,
    pub role: Role,
    pub path: PathBuf,
}

impl SegmentClip {
    pub fn new(index: usize, role: Role, path: impl Into<PathBuf>) -> Self {
        Self {
            index,
            role,
            path: path.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssemblyReport {
    pub output: PathBuf,
    pub duration_secs: f64,
    /// Plan indices in output order
    pub order: Vec<usize>,
}

/// Sort clips into plan order.
pub fn plan_order(mut clips: Vec<SegmentClip>) -> Vec<SegmentClip> {
    clips.sort_by_key(|c| c.index);
    clips
}

/// Fail if any input is absent.
pub fn verify_inputs(clips: &[SegmentClip], outro: Option<&OutroSpec>) -> MediaResult<()> {
    if clips.is_empty() {
        return Err(MediaError::NoSegments);
    }
    if let Some(missing) = clips.iter().find(|c| !c.path.is_file()) {
        return Err(MediaError::MissingSegment {
            index: missing.index,
            path: missing.path.clone(),
        });
    }
    if let Some(outro) = outro {
        if !outro.path.is_file() {
            return Err(MediaError::FileNotFound(outro.path.clone()));
        }
    }
    Ok(())
}

/// Joins segment clips into one file.
pub struct SegmentAssembler {
    toolkit: Arc<dyn EncodingToolkit>,
    options: AssemblyOptions,
}

impl SegmentAssembler {
    pub fn new(toolkit: Arc<dyn EncodingToolkit>, options: AssemblyOptions) -> Self {
        Self { toolkit, options }
    }

    pub fn options(&self) -> &AssemblyOptions {
        &self.options
    }

    pub async fn assemble(&self, clips: Vec<SegmentClip>, output: &Path) -> MediaResult<AssemblyReport> {
        let clips = plan_order(clips);
        verify_inputs(&clips, self.options.outro.as_ref())?;

        let order: Vec<usize> = clips.iter().map(|c| c.index).collect();
        let paths: Vec<PathBuf> = clips.into_iter().map(|c| c.path).collect();
        info!(
            clips = paths.len(),
            order = ?order,
            transition = ?self.options.transition,
            outro = self.options.outro.is_some(),
            "Assembling segments"
        );

        let started = Instant::now();
        match self.toolkit.concatenate(&paths, &self.options, output).await {
            Ok(duration_secs) => {
                metrics::histogram!("reelgen_assembly_duration_seconds")
                    .record(started.elapsed().as_secs_f64());
                Ok(AssemblyReport {
                    output: output.to_path_buf(),
                    duration_secs,
                    order,
                })
            }
            Err(e) => {
                if let Err(cleanup) = remove_if_exists(output).await {
                    warn!(output = %output.display(), "Failed to remove partial output: {}", cleanup);
                }
                Err(e)
            }
        }
    }
}
