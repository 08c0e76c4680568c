//! Duration presets.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::script::VocabularyParseError;

/// Seconds per generated clip. The generation service renders fixed 8s clips.
pub const SEGMENT_DURATION_SECS: f64 = 8.0;

/// Duration preset selecting segment count and per-segment duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum DurationPreset {
    /// 2 segments, ~16s
    Short,
    /// 3 segments, ~24s
    #[default]
    Standard,
    /// 4 segments, ~32s
    Extended,
}

impl DurationPreset {
    pub const ALL: &'static [DurationPreset] = &[
        DurationPreset::Short,
        DurationPreset::Standard,
        DurationPreset::Extended,
    ];

    pub fn segment_count(&self) -> usize {
        match self {
            DurationPreset::Short => 2,
            DurationPreset::Standard => 3,
            DurationPreset::Extended => 4,
        }
    }

    pub fn segment_duration_secs(&self) -> f64 {
        SEGMENT_DURATION_SECS
    }

    pub fn total_duration_secs(&self) -> f64 {
        self.segment_count() as f64 * self.segment_duration_secs()
    }

    /// Preset with the given number of segments.
    pub fn from_segment_count(count: usize) -> Option<Self> {
        Self::ALL.iter().copied().find(|p| p.segment_count() == count)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DurationPreset::Short => "short",
            DurationPreset::Standard => "standard",
            DurationPreset::Extended => "extended",
        }
    }
}

impl fmt::Display for DurationPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for DurationPreset {
    type Err = VocabularyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        match lower.as_str() {
            "short" => Ok(DurationPreset::Short),
            "standard" => Ok(DurationPreset::Standard),
            "extended" => Ok(DurationPreset::Extended),
            other => other
                .parse::<usize>()
                .ok()
                .and_then(Self::from_segment_count)
                .ok_or_else(|| VocabularyParseError::Preset(s.to_string())),
        }
    }
}
