//! Camera framing and opening behaviour of a segment.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::script::VocabularyParseError;

/// Camera distance of a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ShotType {
    Wide,
    Medium,
    MediumCloseUp,
    CloseUp,
}

impl ShotType {
    pub const ALL: &'static [ShotType] = &[
        ShotType::Wide,
        ShotType::Medium,
        ShotType::MediumCloseUp,
        ShotType::CloseUp,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ShotType::Wide => "wide",
            ShotType::Medium => "medium",
            ShotType::MediumCloseUp => "medium_close_up",
            ShotType::CloseUp => "close_up",
        }
    }

    /// Framing description for still-image prompts.
    ///
    /// Each shot gets its own explicit vocabulary: a generic "shot type"
    /// keyword alone yields near-identical images across segments.
    pub fn framing_description(&self) -> &'static str {
        match self {
            ShotType::Wide => {
                "wide shot, full body visible from head to feet, surrounding studio environment clearly visible, subject occupies about a third of the frame height"
            }
            ShotType::Medium => {
                "medium shot, framed from the waist up, balanced composition with visible hands and some background"
            }
            ShotType::MediumCloseUp => {
                "medium close-up, framed from the chest up, shoulders and upper torso visible, background softly blurred"
            }
            ShotType::CloseUp => {
                "close-up, face and shoulders filling the frame, emotionally intimate, shallow depth of field"
            }
        }
    }

    /// Short camera phrase for video prompts.
    pub fn camera_phrase(&self) -> &'static str {
        match self {
            ShotType::Wide => "Wide shot, static camera",
            ShotType::Medium => "Medium shot, waist-up framing",
            ShotType::MediumCloseUp => "Medium close-up, chest-up framing",
            ShotType::CloseUp => "Close-up on face and shoulders",
        }
    }
}

impl fmt::Display for ShotType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How the presenter is moving in the first frames of a clip.
///
/// Every category avoids the presenter snapping back to a neutral "reset"
/// pose at the start of each independently generated clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum BehaviorCategory {
    ContinuingMidGesture,
    ShiftingPosture,
    TransitionGesture,
    DirectGaze,
    SubtleMovement,
}

impl BehaviorCategory {
    pub const ALL: &'static [BehaviorCategory] = &[
        BehaviorCategory::ContinuingMidGesture,
        BehaviorCategory::ShiftingPosture,
        BehaviorCategory::TransitionGesture,
        BehaviorCategory::DirectGaze,
        BehaviorCategory::SubtleMovement,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BehaviorCategory::ContinuingMidGesture => "continuing_mid_gesture",
            BehaviorCategory::ShiftingPosture => "shifting_posture",
            BehaviorCategory::TransitionGesture => "transition_gesture",
            BehaviorCategory::DirectGaze => "direct_gaze",
            BehaviorCategory::SubtleMovement => "subtle_movement",
        }
    }

    /// Concrete behaviours for this category. Never empty.
    pub fn variants(&self) -> &'static [&'static str] {
        match self {
            BehaviorCategory::ContinuingMidGesture => &[
                "already mid-gesture with the right hand raised, continuing an explanation",
                "hands still moving from a previous point, finishing an open-palm gesture",
                "counting on fingers as if halfway through a list",
            ],
            BehaviorCategory::ShiftingPosture => &[
                "shifting weight from one foot to the other while starting to speak",
                "leaning slightly forward from a relaxed stance",
                "straightening up from a casual lean as the line begins",
            ],
            BehaviorCategory::TransitionGesture => &[
                "bringing both hands together as if moving to the next point",
                "turning from a slight three-quarter angle toward the camera",
                "lowering a hand after pointing off-screen",
            ],
            BehaviorCategory::DirectGaze => &[
                "looking straight into the lens with a steady gaze from the first frame",
                "locking eyes with the camera and raising the chin slightly",
                "making direct eye contact while pausing for emphasis",
            ],
            BehaviorCategory::SubtleMovement => &[
                "a slight head tilt and small nod while talking",
                "gentle breathing movement and relaxed shoulders",
                "a subtle smile forming as the sentence starts",
            ],
        }
    }
}

impl fmt::Display for BehaviorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Camera and behaviour configuration attached to one segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Cinematography {
    pub shot_type: ShotType,
    pub behavior_category: BehaviorCategory,
    pub behavior_description: String,
}

/// Named camera progression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    /// Wide establishing shot narrowing to a close-up reveal
    Reveal,
    /// Conversational framing that opens up for the data and closes in
    Analytical,
    /// Opens tight on the face for high-urgency narratives
    ImmediateImpact,
    /// Shuffled shots with no immediate repeat
    Randomized,
}

impl PatternKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PatternKind::Reveal => "reveal",
            PatternKind::Analytical => "analytical",
            PatternKind::ImmediateImpact => "immediate_impact",
            PatternKind::Randomized => "randomized",
        }
    }
}

impl fmt::Display for PatternKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PatternKind {
    type Err = VocabularyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "reveal" => Ok(PatternKind::Reveal),
            "analytical" => Ok(PatternKind::Analytical),
            "immediate_impact" | "impact" => Ok(PatternKind::ImmediateImpact),
            "randomized" | "random" => Ok(PatternKind::Randomized),
            _ => Err(VocabularyParseError::Pattern(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_category_has_variants() {
        for category in BehaviorCategory::ALL {
            assert!(category.variants().len() >= 3, "{category} has too few variants");
        }
    }

    #[test]
    fn test_framing_descriptions_are_distinct() {
        let mut seen = std::collections::HashSet::new();
        for shot in ShotType::ALL {
            assert!(seen.insert(shot.framing_description()));
        }
    }

    #[test]
    fn test_pattern_parse() {
        assert_eq!("impact".parse::<PatternKind>().unwrap(), PatternKind::ImmediateImpact);
        assert!("zigzag".parse::<PatternKind>().is_err());
    }
}
