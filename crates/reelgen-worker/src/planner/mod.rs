//! Segment planning: script + preset -> generation plan.
//!
//! The planner is pure. It makes no external call, so every validation
//! failure surfaces before anything is submitted.

pub mod patterns;
pub mod prompt;
pub mod templates;
pub mod validation;

use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::str::FromStr;
use tracing::debug;

use reelgen_models::{
    AspectRatio, Cinematography, ContentType, DurationPreset, Emotion, GenerationPlan, PatternKind, PlanId,
    ReferenceMode, ReferenceSource, Role, Script, SegmentSpec,
};

use crate::config::PresenterConfig;
use crate::error::PlanError;

pub use patterns::{pattern_for_content, select_pattern};
pub use validation::{DialogueValidator, MAX_WORDS, MIN_WORDS};

/// Caller options for [`SegmentPlanner::plan`].
#[derive(Debug, Clone, Default)]
pub struct PlanOptions {
    /// Presenter identity; random when `None`
    pub character_index: Option<usize>,
    pub pattern_override: Option<PatternKind>,
    /// Shuffled progression instead of the content-type pattern
    pub random_pattern: bool,
    /// Seed for every random choice, for reproducible plans
    pub rng_seed: Option<u64>,
    pub reference_mode: ReferenceMode,
    pub aspect_ratio: AspectRatio,
    /// Proper nouns the dialogue must not contain
    pub forbidden_terms: Vec<String>,
}

struct Line {
    text: String,
    emotion: Emotion,
}

/// Builds generation plans for the configured presenter.
#[derive(Debug, Clone)]
pub struct SegmentPlanner {
    presenter: PresenterConfig,
}

impl SegmentPlanner {
    pub fn new(presenter: PresenterConfig) -> Self {
        Self { presenter }
    }

    pub fn presenter(&self) -> &PresenterConfig {
        &self.presenter
    }

    pub fn plan(
        &self,
        content_type: &str,
        script: Option<&Script>,
        preset: DurationPreset,
        options: &PlanOptions,
    ) -> Result<GenerationPlan, PlanError> {
        let parsed = ContentType::from_str(content_type).ok();
        // A randomized pattern still needs a known content type to script from
        if parsed.is_none() && options.pattern_override.is_none() {
            return Err(PlanError::UnknownContentType(content_type.to_string()));
        }

        let count = preset.segment_count();
        let roles = Role::sequence(count).ok_or(PlanError::UnsupportedSegmentCount(count))?;
        let validator = DialogueValidator::new(options.forbidden_terms.iter().cloned());

        let lines = match script {
            Some(script) => {
                if script.len() != count {
                    return Err(PlanError::ScriptLengthMismatch {
                        expected: count,
                        actual: script.len(),
                    });
                }
                validator.validate_script(script)?;
                script
                    .segments
                    .iter()
                    .map(|s| Line {
                        text: s.text.trim().to_string(),
                        emotion: s.emotion,
                    })
                    .collect::<Vec<_>>()
            }
            None => {
                let content_type =
                    parsed.ok_or_else(|| PlanError::ScriptRequired(content_type.to_string()))?;
                roles
                    .iter()
                    .map(|role| {
                        let template = templates::template_for(content_type, *role);
                        Line {
                            text: template.text.to_string(),
                            emotion: template.emotion,
                        }
                    })
                    .collect()
            }
        };

        let mut rng = StdRng::seed_from_u64(options.rng_seed.unwrap_or_else(rand::random));
        let character = self.select_identity(options.character_index, &mut rng)?;
        let pattern = select_pattern(
            parsed,
            lines.first().map(|l| l.emotion),
            options.pattern_override,
            options.random_pattern,
            content_type,
        )?;
        let slots = patterns::progression(pattern, count, &mut rng)?;

        let segments = roles
            .iter()
            .zip(lines)
            .zip(slots)
            .enumerate()
            .map(|(index, ((role, line), (shot_type, category)))| {
                let cinematography = Cinematography {
                    shot_type,
                    behavior_category: category,
                    behavior_description: patterns::pick_variant(category, &mut rng).to_string(),
                };
                let prompt_text = prompt::video_prompt(
                    &self.presenter.description,
                    &cinematography,
                    line.emotion,
                    &line.text,
                );
                let reference = match options.reference_mode {
                    ReferenceMode::FixedIdentity => ReferenceSource::Fixed {
                        storage_key: character.reference_key(),
                    },
                    ReferenceMode::PerSegment => ReferenceSource::Generated,
                    ReferenceMode::Continuity if index == 0 => ReferenceSource::Fixed {
                        storage_key: character.reference_key(),
                    },
                    ReferenceMode::Continuity => ReferenceSource::PreviousFrame,
                };

                SegmentSpec {
                    index,
                    role: *role,
                    emotion: line.emotion,
                    dialogue: line.text,
                    duration_seconds: preset.segment_duration_secs(),
                    prompt_text,
                    cinematography,
                    reference,
                    character_seed: character.seed,
                }
            })
            .collect();

        let plan = GenerationPlan {
            plan_id: PlanId::new(),
            content_type: parsed,
            preset,
            pattern,
            character,
            reference_mode: options.reference_mode,
            aspect_ratio: options.aspect_ratio,
            segments,
            created_at: Utc::now(),
        };
        validator.validate_plan(&plan)?;

        debug!(
            plan_id = %plan.plan_id,
            pattern = %plan.pattern,
            segments = plan.len(),
            identity = plan.character.index,
            "Plan created"
        );
        Ok(plan)
    }

    fn select_identity(
        &self,
        requested: Option<usize>,
        rng: &mut StdRng,
    ) -> Result<reelgen_models::CharacterIdentity, PlanError> {
        let available = self.presenter.identity_count();
        let index = match requested {
            Some(index) => index,
            None if available > 0 => rng.random_range(0..available),
            None => 0,
        };
        self.presenter
            .identity(index)
            .ok_or(PlanError::InvalidCharacterIndex { index, available })
    }
}
