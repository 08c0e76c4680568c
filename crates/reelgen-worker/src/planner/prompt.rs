//! Prompt text for the video and image generators.

use reelgen_models::{Cinematography, Emotion, ShotType};

/// Video prompt for one segment.
///
/// Dialogue goes in quotes so the generator speaks it verbatim.
pub fn video_prompt(
    presenter: &str,
    cinematography: &Cinematography,
    emotion: Emotion,
    dialogue: &str,
) -> String {
    format!(
        "{camera}. {presenter}, {behavior}. Expression: {face}. \
         The presenter speaks in Spanish from Spain with a {tone}: \"{dialogue}\". \
         Vertical video, natural studio lighting, no on-screen text, no subtitles.",
        camera = cinematography.shot_type.camera_phrase(),
        behavior = cinematography.behavior_description,
        face = emotion.facial_expression(),
        tone = emotion.voice_tone(),
        dialogue = dialogue.trim(),
    )
}

/// Image prompt for a per-segment reference portrait.
pub fn image_prompt(presenter: &str, shot: ShotType, emotion: Emotion, dialogue: &str) -> String {
    format!(
        "Photorealistic portrait of {presenter}. Framing: {framing}. Expression: {face}. \
         Captured as if about to say: \"{dialogue}\". Vertical 9:16, natural studio lighting, \
         no text, no logos.",
        framing = shot.framing_description(),
        face = emotion.facial_expression(),
        dialogue = dialogue.trim(),
    )
}
