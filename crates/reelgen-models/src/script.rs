//! Script vocabulary: content types, narrative roles, emotions and dialogue.
//!
//! Every string-keyed table of the pipeline is modelled here as a closed
//! enumeration with an exhaustive `match`, so a missing mapping is a compile
//! error rather than a lookup miss at runtime.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use validator::Validate;

/// Kind of video being produced. Selects the default camera progression and
/// the fallback dialogue templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    /// Bargain pick: a cheap player worth signing right now
    Chollo,
    /// Data-driven breakdown of a player or fixture
    Analysis,
    /// Last-minute news (injury, lineup change, transfer)
    Breaking,
}

impl ContentType {
    pub const ALL: &'static [ContentType] =
        &[ContentType::Chollo, ContentType::Analysis, ContentType::Breaking];

    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Chollo => "chollo",
            ContentType::Analysis => "analysis",
            ContentType::Breaking => "breaking",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ContentType {
    type Err = VocabularyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "chollo" | "chollos" => Ok(ContentType::Chollo),
            "analysis" | "analisis" | "análisis" => Ok(ContentType::Analysis),
            "breaking" | "breaking_news" => Ok(ContentType::Breaking),
            _ => Err(VocabularyParseError::ContentType(s.to_string())),
        }
    }
}

/// Narrative role of a segment within the script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Intro,
    Analysis,
    Middle,
    Outro,
}

impl Role {
    /// Role sequence for a plan with `count` segments.
    ///
    /// Only 2, 3 and 4 segments are valid; anything else returns `None`.
    pub fn sequence(count: usize) -> Option<&'static [Role]> {
        match count {
            2 => Some(&[Role::Intro, Role::Outro]),
            3 => Some(&[Role::Intro, Role::Middle, Role::Outro]),
            4 => Some(&[Role::Intro, Role::Analysis, Role::Middle, Role::Outro]),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Intro => "intro",
            Role::Analysis => "analysis",
            Role::Middle => "middle",
            Role::Outro => "outro",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Emotional tag attached to a line of dialogue by the script writer.
///
/// Serialized with the Spanish keys the script writer emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    Curiosidad,
    Validacion,
    Urgencia,
    Sorpresa,
    Confianza,
    Entusiasmo,
    Preocupacion,
    Alerta,
}

impl Emotion {
    pub fn as_str(&self) -> &'static str {
        match self {
            Emotion::Curiosidad => "curiosidad",
            Emotion::Validacion => "validacion",
            Emotion::Urgencia => "urgencia",
            Emotion::Sorpresa => "sorpresa",
            Emotion::Confianza => "confianza",
            Emotion::Entusiasmo => "entusiasmo",
            Emotion::Preocupacion => "preocupacion",
            Emotion::Alerta => "alerta",
        }
    }

    /// Facial expression phrase used in image and video prompts.
    pub fn facial_expression(&self) -> &'static str {
        match self {
            Emotion::Curiosidad => {
                "eyebrows slightly raised, intrigued half-smile, head tilted a touch to one side"
            }
            Emotion::Validacion => "relaxed knowing smile, small confident nod, steady eye contact",
            Emotion::Urgencia => {
                "eyes wide and focused, brows drawn together, leaning toward the camera"
            }
            Emotion::Sorpresa => "raised eyebrows, mouth slightly open, genuine astonishment",
            Emotion::Confianza => "calm composed face, warm assured smile, relaxed shoulders",
            Emotion::Entusiasmo => "bright wide smile, animated eyes, energetic expression",
            Emotion::Preocupacion => "slight frown, concerned eyes, lips pressed together",
            Emotion::Alerta => "sharp alert gaze, serious tense expression, chin slightly down",
        }
    }

    /// Voice delivery phrase used in video prompts.
    pub fn voice_tone(&self) -> &'static str {
        match self {
            Emotion::Curiosidad => "intrigued, inviting tone",
            Emotion::Validacion => "assured, affirming tone",
            Emotion::Urgencia => "urgent, fast-paced tone",
            Emotion::Sorpresa => "surprised, animated tone",
            Emotion::Confianza => "calm, confident tone",
            Emotion::Entusiasmo => "enthusiastic, energetic tone",
            Emotion::Preocupacion => "worried, measured tone",
            Emotion::Alerta => "serious, alarmed tone",
        }
    }

    /// Emotions that push the opening toward the immediate-impact progression.
    pub fn is_high_urgency(&self) -> bool {
        matches!(self, Emotion::Urgencia | Emotion::Alerta)
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Emotion {
    type Err = VocabularyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "curiosidad" => Ok(Emotion::Curiosidad),
            "validacion" | "validación" => Ok(Emotion::Validacion),
            "urgencia" => Ok(Emotion::Urgencia),
            "sorpresa" => Ok(Emotion::Sorpresa),
            "confianza" => Ok(Emotion::Confianza),
            "entusiasmo" => Ok(Emotion::Entusiasmo),
            "preocupacion" | "preocupación" => Ok(Emotion::Preocupacion),
            "alerta" => Ok(Emotion::Alerta),
            _ => Err(VocabularyParseError::Emotion(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VocabularyParseError {
    #[error("Unknown content type: {0}")]
    ContentType(String),
    #[error("Unknown emotion: {0}")]
    Emotion(String),
    #[error("Unknown duration preset: {0}")]
    Preset(String),
    #[error("Unknown progression pattern: {0}")]
    Pattern(String),
}

/// One line of dialogue for one segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct DialogueSegment {
    pub role: Role,
    #[validate(length(min = 1))]
    pub text: String,
    pub emotion: Emotion,
    #[validate(range(min = 1.0, max = 60.0))]
    pub target_duration_seconds: f64,
}

impl DialogueSegment {
    pub fn new(role: Role, text: impl Into<String>, emotion: Emotion, target_duration_seconds: f64) -> Self {
        Self {
            role,
            text: text.into(),
            emotion,
            target_duration_seconds,
        }
    }

    pub fn word_count(&self) -> usize {
        self.text.split_whitespace().count()
    }
}

/// Externally supplied, immutable dialogue for a whole video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Validate)]
pub struct Script {
    #[validate(nested)]
    pub segments: Vec<DialogueSegment>,
}

impl Script {
    pub fn new(segments: Vec<DialogueSegment>) -> Self {
        Self { segments }
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// All dialogue joined with single spaces, in script order.
    pub fn full_text(&self) -> String {
        self.segments
            .iter()
            .map(|s| s.text.trim())
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn emotions(&self) -> Vec<Emotion> {
        self.segments.iter().map(|s| s.emotion).collect()
    }
}
