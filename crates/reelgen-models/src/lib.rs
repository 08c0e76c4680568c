//! Shared data models for the reel generation backend.
//!
//! This crate provides Serde-serializable types for:
//! - Scripts, vocabularies and duration presets
//! - Cinematography and generation plans
//! - Reference images and generation tasks
//! - Session records and progress events
//! - Encoding configuration

pub mod cinematography;
pub mod encoding;
pub mod events;
pub mod plan;
pub mod preset;
pub mod reference;
pub mod script;
pub mod session;
pub mod task;

// Re-export common types
pub use cinematography::{BehaviorCategory, Cinematography, PatternKind, ShotType};
pub use encoding::EncodingConfig;
pub use events::SessionEvent;
pub use plan::{
    AspectRatio, CharacterIdentity, GenerationPlan, PlanId, ReferenceMode, ReferenceSource,
    SegmentSpec,
};
pub use preset::{DurationPreset, SEGMENT_DURATION_SECS};
pub use reference::ReferenceImage;
pub use script::{ContentType, DialogueSegment, Emotion, Role, Script, VocabularyParseError};
pub use session::{Session, SessionId, SessionOutcome, SessionStatus, SubmissionFailure};
pub use task::{GenerationTask, TaskStatus, TransitionError};
