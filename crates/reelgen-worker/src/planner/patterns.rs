//! Camera progression patterns.
//!
//! A pattern is four `(shot, behavior)` slots. Plans sample the slots evenly
//! so the opener and the closer are always used.

use rand::seq::{IndexedRandom, SliceRandom};
use rand::Rng;

use reelgen_models::{BehaviorCategory, ContentType, Emotion, PatternKind, ShotType};

use crate::error::PlanError;

pub type PatternSlot = (ShotType, BehaviorCategory);

const REVEAL: [PatternSlot; 4] = [
    (ShotType::Wide, BehaviorCategory::ContinuingMidGesture),
    (ShotType::Medium, BehaviorCategory::ShiftingPosture),
    (ShotType::MediumCloseUp, BehaviorCategory::TransitionGesture),
    (ShotType::CloseUp, BehaviorCategory::DirectGaze),
];

const ANALYTICAL: [PatternSlot; 4] = [
    (ShotType::Medium, BehaviorCategory::SubtleMovement),
    (ShotType::MediumCloseUp, BehaviorCategory::ContinuingMidGesture),
    (ShotType::Wide, BehaviorCategory::ShiftingPosture),
    (ShotType::CloseUp, BehaviorCategory::DirectGaze),
];

const IMMEDIATE_IMPACT: [PatternSlot; 4] = [
    (ShotType::CloseUp, BehaviorCategory::DirectGaze),
    (ShotType::Medium, BehaviorCategory::ContinuingMidGesture),
    (ShotType::Wide, BehaviorCategory::ShiftingPosture),
    (ShotType::MediumCloseUp, BehaviorCategory::TransitionGesture),
];

/// Default progression for a content type.
pub fn pattern_for_content(content_type: ContentType) -> PatternKind {
    match content_type {
        ContentType::Chollo => PatternKind::Reveal,
        ContentType::Analysis => PatternKind::Analytical,
        ContentType::Breaking => PatternKind::ImmediateImpact,
    }
}

/// Override > random mode > urgent opener > content type.
pub fn select_pattern(
    content_type: Option<ContentType>,
    opening_emotion: Option<Emotion>,
    pattern_override: Option<PatternKind>,
    random_pattern: bool,
    raw_content_type: &str,
) -> Result<PatternKind, PlanError> {
    if let Some(kind) = pattern_override {
        return Ok(kind);
    }
    if random_pattern {
        return Ok(PatternKind::Randomized);
    }
    if opening_emotion.is_some_and(|e| e.is_high_urgency()) {
        return Ok(PatternKind::ImmediateImpact);
    }
    content_type
        .map(pattern_for_content)
        .ok_or_else(|| PlanError::UnknownContentType(raw_content_type.to_string()))
}

/// Pattern positions used for a plan of `count` segments.
pub fn slot_indices(count: usize) -> Result<&'static [usize], PlanError> {
    match count {
        2 => Ok(&[0, 3]),
        3 => Ok(&[0, 1, 3]),
        4 => Ok(&[0, 1, 2, 3]),
        other => Err(PlanError::UnsupportedSegmentCount(other)),
    }
}

fn fixed_slots(kind: PatternKind) -> Option<&'static [PatternSlot; 4]> {
    match kind {
        PatternKind::Reveal => Some(&REVEAL),
        PatternKind::Analytical => Some(&ANALYTICAL),
        PatternKind::ImmediateImpact => Some(&IMMEDIATE_IMPACT),
        PatternKind::Randomized => None,
    }
}

/// Shot and behavior category for each of `count` segments.
pub fn progression<R: Rng + ?Sized>(
    kind: PatternKind,
    count: usize,
    rng: &mut R,
) -> Result<Vec<PatternSlot>, PlanError> {
    let indices = slot_indices(count)?;
    match fixed_slots(kind) {
        Some(slots) => Ok(indices.iter().map(|i| slots[*i]).collect()),
        None => Ok(random_progression(count, rng)),
    }
}

/// Shuffled shots and behaviors; no shot type repeats back to back.
fn random_progression<R: Rng + ?Sized>(count: usize, rng: &mut R) -> Vec<PatternSlot> {
    let mut behaviors = BehaviorCategory::ALL.to_vec();
    behaviors.shuffle(rng);

    let mut out: Vec<PatternSlot> = Vec::with_capacity(count);
    for i in 0..count {
        let previous = out.last().map(|(shot, _)| *shot);
        let candidates: Vec<ShotType> = ShotType::ALL
            .iter()
            .copied()
            .filter(|s| Some(*s) != previous)
            .collect();
        let shot = candidates
            .choose(rng)
            .copied()
            .unwrap_or(ShotType::Medium);
        out.push((shot, behaviors[i % behaviors.len()]));
    }
    out
}

/// One concrete behavior for a category.
pub fn pick_variant<R: Rng + ?Sized>(category: BehaviorCategory, rng: &mut R) -> &'static str {
    let variants = category.variants();
    variants[rng.random_range(0..variants.len())]
}
