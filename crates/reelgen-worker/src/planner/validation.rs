//! Dialogue and plan validation.

use validator::Validate;

use reelgen_models::{GenerationPlan, Script, SegmentSpec};

use crate::error::PlanError;

/// Shortest accepted dialogue line, in words.
pub const MIN_WORDS: usize = 22;
/// Longest accepted dialogue line. Longer lines overrun an 8s clip.
pub const MAX_WORDS: usize = 27;

/// Checks dialogue length and vocabulary.
#[derive(Debug, Clone)]
pub struct DialogueValidator {
    min_words: usize,
    max_words: usize,
    /// Lower-cased token sequences
    forbidden: Vec<(String, Vec<String>)>,
}

impl Default for DialogueValidator {
    fn default() -> Self {
        Self::new(Vec::<String>::new())
    }
}

impl DialogueValidator {
    pub fn new<I, S>(forbidden_terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let forbidden = forbidden_terms
            .into_iter()
            .map(Into::into)
            .filter_map(|term| {
                let tokens = tokenize(&term);
                (!tokens.is_empty()).then_some((term, tokens))
            })
            .collect();

        Self {
            min_words: MIN_WORDS,
            max_words: MAX_WORDS,
            forbidden,
        }
    }

    pub fn validate_text(&self, segment: usize, text: &str) -> Result<(), PlanError> {
        let count = text.split_whitespace().count();
        if count == 0 {
            return Err(PlanError::EmptyDialogue { segment });
        }
        if count < self.min_words || count > self.max_words {
            return Err(PlanError::WordCountOutOfRange {
                segment,
                count,
                min: self.min_words,
                max: self.max_words,
            });
        }

        let tokens = tokenize(text);
        for (term, needle) in &self.forbidden {
            if tokens.windows(needle.len()).any(|w| w == needle.as_slice()) {
                return Err(PlanError::ForbiddenTerm {
                    segment,
                    term: term.clone(),
                });
            }
        }
        Ok(())
    }

    /// Structural checks on a caller-supplied script.
    pub fn validate_script(&self, script: &Script) -> Result<(), PlanError> {
        script
            .validate()
            .map_err(|e| PlanError::InvalidScript(e.to_string()))?;
        for (segment, line) in script.segments.iter().enumerate() {
            self.validate_text(segment, &line.text)?;
        }
        Ok(())
    }

    pub fn validate_spec(&self, spec: &SegmentSpec) -> Result<(), PlanError> {
        self.validate_text(spec.index, &spec.dialogue)?;
        if spec.prompt_text.trim().is_empty() {
            return Err(PlanError::MissingField {
                segment: spec.index,
                field: "prompt text",
            });
        }
        if spec.cinematography.behavior_description.trim().is_empty() {
            return Err(PlanError::MissingField {
                segment: spec.index,
                field: "behavior description",
            });
        }
        if !(spec.duration_seconds.is_finite() && spec.duration_seconds > 0.0) {
            return Err(PlanError::MissingField {
                segment: spec.index,
                field: "duration",
            });
        }
        Ok(())
    }

    /// Whole-plan checks: cardinality, shared identity, every segment.
    pub fn validate_plan(&self, plan: &GenerationPlan) -> Result<(), PlanError> {
        let expected = plan.preset.segment_count();
        if plan.segments.len() != expected {
            return Err(PlanError::ScriptLengthMismatch {
                expected,
                actual: plan.segments.len(),
            });
        }
        if plan
            .segments
            .iter()
            .any(|s| s.character_seed != plan.character.seed)
        {
            return Err(PlanError::MixedCharacterSeeds);
        }
        plan.segments.iter().try_for_each(|s| self.validate_spec(s))
    }
}

/// Lower-cased alphanumeric words. Accented letters count as word characters.
fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(n: usize) -> String {
        vec!["palabra"; n].join(" ")
    }

    #[test]
    fn test_word_band_edges() {
        let v = DialogueValidator::default();
        assert!(v.validate_text(0, &words(22)).is_ok());
        assert!(v.validate_text(0, &words(27)).is_ok());
        assert_eq!(
            v.validate_text(1, &words(21)),
            Err(PlanError::WordCountOutOfRange {
                segment: 1,
                count: 21,
                min: 22,
                max: 27
            })
        );
        assert!(matches!(
            v.validate_text(1, &words(28)),
            Err(PlanError::WordCountOutOfRange { count: 28, .. })
        ));
    }

    #[test]
    fn test_empty_dialogue() {
        let v = DialogueValidator::default();
        assert_eq!(v.validate_text(2, "   "), Err(PlanError::EmptyDialogue { segment: 2 }));
    }

    #[test]
    fn test_forbidden_terms_match_whole_words_case_insensitively() {
        let v = DialogueValidator::new(["Vinicius", "real madrid"]);
        let base = words(20);

        let hit = format!("{base} vinicius hoy");
        assert!(matches!(
            v.validate_text(0, &hit),
            Err(PlanError::ForbiddenTerm { ref term, .. }) if term == "Vinicius"
        ));

        let phrase = format!("{base} el Real, Madrid");
        assert!(matches!(v.validate_text(0, &phrase), Err(PlanError::ForbiddenTerm { .. })));

        // Substring of a longer word is fine
        let partial = format!("{base} viniciusfan hoy");
        assert!(v.validate_text(0, &partial).is_ok());
    }
}
