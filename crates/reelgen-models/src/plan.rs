//! Generation plan: the immutable, ordered description of every segment.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::cinematography::{Cinematography, PatternKind};
use crate::preset::DurationPreset;
use crate::script::{ContentType, Emotion, Role};

/// Unique identifier for a plan.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct PlanId(pub String);

impl PlanId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for PlanId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PlanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Output aspect ratio requested from the generation service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
pub enum AspectRatio {
    #[default]
    #[serde(rename = "9:16")]
    Portrait,
    #[serde(rename = "16:9")]
    Landscape,
}

impl AspectRatio {
    pub fn as_str(&self) -> &'static str {
        match self {
            AspectRatio::Portrait => "9:16",
            AspectRatio::Landscape => "16:9",
        }
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Presenter identity shared by every segment of a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct CharacterIdentity {
    /// Index into the presenter identity table
    pub index: usize,
    /// Generation seed pinned to this identity
    pub seed: u32,
}

impl CharacterIdentity {
    /// Storage key of the stored reference portrait for this identity.
    pub fn reference_key(&self) -> String {
        format!("presenter/identity_{:02}.png", self.index)
    }
}

/// How visual continuity is carried across segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceMode {
    /// Every segment uses the stored portrait of the selected identity
    #[default]
    FixedIdentity,
    /// A contextual reference image is generated for each segment
    PerSegment,
    /// Each segment is seeded with the last frame of the previous clip
    Continuity,
}

impl ReferenceMode {
    /// Whether segments must be generated one after another.
    pub fn is_sequential(&self) -> bool {
        matches!(self, ReferenceMode::Continuity)
    }
}

/// Where a segment's reference image comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReferenceSource {
    /// Stored presenter portrait, signed at submission time
    Fixed { storage_key: String },
    /// Generated by the reference image provider before submission
    Generated,
    /// Last frame of the previous segment's clip
    PreviousFrame,
}

/// Fully resolved specification of one segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SegmentSpec {
    /// Position in the plan (0-based); the assembly order
    pub index: usize,
    pub role: Role,
    pub emotion: Emotion,
    pub dialogue: String,
    pub duration_seconds: f64,
    pub prompt_text: String,
    pub cinematography: Cinematography,
    pub reference: ReferenceSource,
    pub character_seed: u32,
}

impl SegmentSpec {
    /// File name of the downloaded clip inside the session directory.
    pub fn clip_file_name(&self) -> String {
        format!("segment_{:02}_{}.mp4", self.index, self.role)
    }
}

/// Ordered list of segment specs for one output video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GenerationPlan {
    pub plan_id: PlanId,
    /// `None` when the caller supplied an unmapped content type with an
    /// explicit pattern override
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<ContentType>,
    pub preset: DurationPreset,
    pub pattern: PatternKind,
    pub character: CharacterIdentity,
    pub reference_mode: ReferenceMode,
    pub aspect_ratio: AspectRatio,
    pub segments: Vec<SegmentSpec>,
    pub created_at: DateTime<Utc>,
}

impl GenerationPlan {
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segment(&self, index: usize) -> Option<&SegmentSpec> {
        self.segments.get(index)
    }

    /// Dialogue of the whole video in plan order.
    pub fn full_dialogue(&self) -> String {
        self.segments
            .iter()
            .map(|s| s.dialogue.trim())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Sum of the planned segment durations.
    pub fn planned_duration_secs(&self) -> f64 {
        self.segments.iter().map(|s| s.duration_seconds).sum()
    }
}
