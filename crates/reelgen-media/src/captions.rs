//! Word-level caption timing and burn-in.
//!
//! Timing is computed against the assembled video's duration: every word gets
//! `total / word_count` seconds, words that are fully upper-case and longer
//! than three characters get 1.3x that, and timestamps accumulate from zero.
//! The emphasis pushes the raw timeline past the video's end; the
//! synchronizer then rescales it so the last word ends exactly at the end of
//! the video.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::MediaResult;
use crate::filters::{escape_drawtext, escape_filter_path};
use crate::toolkit::EncodingToolkit;

/// Display-time multiplier for emphasised words.
pub const IMPORTANT_WORD_MULTIPLIER: f64 = 1.3;

/// Speaking pace assumed when the video duration is unknown.
pub const DEFAULT_WORDS_PER_SECOND: f64 = 2.5;

/// Bold system fonts tried in order when none is configured.
pub const BOLD_FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/dejavu-sans-fonts/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Bold.ttf",
    "/usr/share/fonts/liberation-sans/LiberationSans-Bold.ttf",
    "/Library/Fonts/Arial Bold.ttf",
];

/// The configured font when it exists, else the first candidate on disk.
pub fn resolve_bold_font<P: AsRef<Path>>(configured: Option<&Path>, candidates: &[P]) -> Option<PathBuf> {
    configured
        .map(Path::to_path_buf)
        .into_iter()
        .chain(candidates.iter().map(|p| p.as_ref().to_path_buf()))
        .find(|p| p.is_file())
}

/// One caption word with its display window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CaptionWord {
    pub text: String,
    pub start_time: f64,
    pub end_time: f64,
    pub is_important: bool,
}

/// Visual style of burned-in captions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptionStyle {
    /// Bold TTF used for every word. See [`resolve_bold_font`]
    pub font_file: Option<PathBuf>,
    pub font_size: u32,
    pub important_font_size: u32,
    pub font_color: String,
    pub important_font_color: String,
    pub border_color: String,
    pub border_width: u32,
    /// Distance from the bottom edge to the caption baseline
    pub bottom_offset: u32,
}

impl Default for CaptionStyle {
    fn default() -> Self {
        Self {
            font_file: None,
            font_size: 72,
            important_font_size: 88,
            font_color: "white".to_string(),
            important_font_color: "yellow".to_string(),
            border_color: "black".to_string(),
            border_width: 5,
            bottom_offset: 420,
        }
    }
}

impl CaptionStyle {
    pub fn with_font_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.font_file = Some(path.into());
        self
    }
}

/// Fully upper-case and longer than three characters (punctuation ignored).
pub fn is_important_word(word: &str) -> bool {
    let core: Vec<char> = word.chars().filter(|c| c.is_alphanumeric()).collect();
    core.len() > 3
        && core.iter().any(|c| c.is_alphabetic())
        && core.iter().filter(|c| c.is_alphabetic()).all(|c| c.is_uppercase())
}

/// Raw per-word timing. The last `end_time` is at least `total_duration`.
///
/// A non-positive or non-finite `total_duration` falls back to the
/// words-per-second pace.
pub fn compute_raw_timings(text: &str, total_duration: f64, words_per_second: f64) -> Vec<CaptionWord> {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() {
        return Vec::new();
    }

    let total = if total_duration.is_finite() && total_duration > 0.0 {
        total_duration
    } else {
        words.len() as f64 / words_per_second.max(f64::EPSILON)
    };
    let nominal = total / words.len() as f64;

    let mut cursor = 0.0;
    words
        .into_iter()
        .map(|word| {
            let is_important = is_important_word(word);
            let span = if is_important {
                nominal * IMPORTANT_WORD_MULTIPLIER
            } else {
                nominal
            };
            let caption = CaptionWord {
                text: word.to_string(),
                start_time: cursor,
                end_time: cursor + span,
                is_important,
            };
            cursor += span;
            caption
        })
        .collect()
}

/// Scale every timestamp so the last word ends at `total_duration`.
pub fn renormalize(words: &mut [CaptionWord], total_duration: f64) {
    let raw_end = match words.last() {
        Some(w) if w.end_time > 0.0 => w.end_time,
        _ => return,
    };
    if !(total_duration.is_finite() && total_duration > 0.0) {
        return;
    }
    let scale = total_duration / raw_end;
    for word in words.iter_mut() {
        word.start_time *= scale;
        word.end_time *= scale;
    }
}

/// `drawtext` chain rendering one word at a time.
pub fn build_drawtext_filter(words: &[CaptionWord], style: &CaptionStyle) -> String {
    let font = style
        .font_file
        .as_ref()
        .map(|p| format!("fontfile='{}':", escape_filter_path(&p.to_string_lossy())))
        .unwrap_or_default();

    words
        .iter()
        .map(|w| {
            let (size, color) = if w.is_important {
                (style.important_font_size, style.important_font_color.as_str())
            } else {
                (style.font_size, style.font_color.as_str())
            };
            format!(
                "drawtext={font}text='{text}':fontsize={size}:fontcolor={color}:borderw={bw}:bordercolor={bc}:x=(w-text_w)/2:y=h-{off}-text_h:enable='between(t,{start:.3},{end:.3})'",
                text = escape_drawtext(&w.text),
                bw = style.border_width,
                bc = style.border_color,
                off = style.bottom_offset,
                start = w.start_time,
                end = w.end_time,
            )
        })
        .collect::<Vec<_>>()
        .join(",")
}

/// Result of a caption pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptionTrack {
    pub output: PathBuf,
    pub duration_secs: f64,
    pub words: Vec<CaptionWord>,
}

/// Times the dialogue against the assembled video and burns it in.
pub struct CaptionSynchronizer {
    toolkit: Arc<dyn EncodingToolkit>,
    style: CaptionStyle,
    words_per_second: f64,
}

impl CaptionSynchronizer {
    pub fn new(toolkit: Arc<dyn EncodingToolkit>, style: CaptionStyle) -> Self {
        Self {
            toolkit,
            style,
            words_per_second: DEFAULT_WORDS_PER_SECOND,
        }
    }

    pub fn with_words_per_second(mut self, wps: f64) -> Self {
        if wps.is_finite() && wps > 0.0 {
            self.words_per_second = wps;
        }
        self
    }

    /// Renormalized timings for `text` over `total_duration` seconds.
    pub fn timings(&self, text: &str, total_duration: f64) -> Vec<CaptionWord> {
        let mut words = compute_raw_timings(text, total_duration, self.words_per_second);
        let total = if total_duration.is_finite() && total_duration > 0.0 {
            total_duration
        } else {
            words.len() as f64 / self.words_per_second
        };
        renormalize(&mut words, total);
        words
    }

    /// Probe `assembled`, time `text` against it and write the captioned file.
    pub async fn synchronize(&self, assembled: &Path, text: &str, output: &Path) -> MediaResult<CaptionTrack> {
        let info = self.toolkit.probe(assembled).await?;
        let words = self.timings(text, info.duration);
        debug!(
            words = words.len(),
            duration = info.duration,
            "Computed caption timings"
        );

        self.toolkit
            .burn_captions(assembled, &words, &self.style, output)
            .await?;

        info!(output = %output.display(), words = words.len(), "Captions burned in");
        Ok(CaptionTrack {
            output: output.to_path_buf(),
            duration_secs: info.duration,
            words,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEXT: &str = "Misters, atentos a este CHOLLO que nadie está mirando todavía y cuesta solo cinco millones";

    #[test]
    fn test_important_words() {
        assert!(is_important_word("CHOLLO"));
        assert!(is_important_word("GRATIS!"));
        assert!(!is_important_word("YA"));
        assert!(!is_important_word("VAR"));
        assert!(!is_important_word("Chollo"));
        assert!(!is_important_word("2024"));
    }

    #[test]
    fn test_raw_timings_are_monotonic_and_cover_total() {
        let total = 24.0;
        let words = compute_raw_timings(TEXT, total, DEFAULT_WORDS_PER_SECOND);
        assert_eq!(words.len(), TEXT.split_whitespace().count());
        assert_eq!(words[0].start_time, 0.0);
        for pair in words.windows(2) {
            assert!(pair[0].start_time <= pair[1].start_time);
            assert!(pair[0].end_time <= pair[1].start_time + 1e-9);
        }
        assert!(words.last().unwrap().end_time >= total);

        let chollo = words.iter().find(|w| w.text == "CHOLLO").unwrap();
        let plain = words.iter().find(|w| w.text == "este").unwrap();
        let ratio = (chollo.end_time - chollo.start_time) / (plain.end_time - plain.start_time);
        assert!((ratio - IMPORTANT_WORD_MULTIPLIER).abs() < 1e-9);
    }

    #[test]
    fn test_renormalized_timeline_ends_at_total() {
        let total = 24.0;
        let mut words = compute_raw_timings(TEXT, total, DEFAULT_WORDS_PER_SECOND);
        renormalize(&mut words, total);
        assert!((words.last().unwrap().end_time - total).abs() < 1e-9);
        for pair in words.windows(2) {
            assert!(pair[0].end_time <= pair[1].start_time + 1e-9);
        }
    }

    #[test]
    fn test_unknown_duration_uses_pace() {
        let words = compute_raw_timings("uno dos tres cuatro cinco", 0.0, 2.5);
        assert!((words.last().unwrap().end_time - 2.0).abs() < 1e-9);
        assert!(compute_raw_timings("   ", 10.0, 2.5).is_empty());
    }

    #[tokio::test]
    async fn test_synchronize_uses_probed_duration() {
        let dir = tempfile::TempDir::new().unwrap();
        let toolkit = Arc::new(crate::testing::FakeToolkit::with_duration(24.0));
        let sync = CaptionSynchronizer::new(toolkit.clone(), CaptionStyle::default());

        let output = dir.path().join("final.mp4");
        let track = sync
            .synchronize(&dir.path().join("assembled.mp4"), TEXT, &output)
            .await
            .unwrap();

        assert!(output.exists());
        assert_eq!(track.duration_secs, 24.0);
        assert!((track.words.last().unwrap().end_time - 24.0).abs() < 1e-9);
        assert_eq!(toolkit.captions()[0].len(), track.words.len());
    }

    #[test]
    fn test_drawtext_styles_important_words() {
        let words = vec![
            CaptionWord {
                text: "mira".into(),
                start_time: 0.0,
                end_time: 0.5,
                is_important: false,
            },
            CaptionWord {
                text: "CHOLLO".into(),
                start_time: 0.5,
                end_time: 1.15,
                is_important: true,
            },
        ];
        let filter = build_drawtext_filter(&words, &CaptionStyle::default().with_font_file("/fonts/Bold.ttf"));
        let parts: Vec<&str> = filter.split(",drawtext=").collect();
        assert_eq!(parts.len(), 2);
        assert!(parts[0].contains("fontsize=72:fontcolor=white"));
        assert!(parts[1].contains("fontsize=88:fontcolor=yellow"));
        assert!(filter.contains("y=h-420-text_h"));
        assert!(filter.contains("between(t,0.500,1.150)"));
        assert!(filter.contains("fontfile='/fonts/Bold.ttf'"));
    }

    #[test]
    fn test_bold_font_falls_back_to_installed_candidate() {
        let dir = tempfile::TempDir::new().unwrap();
        let installed = dir.path().join("Sans-Bold.ttf");
        std::fs::write(&installed, b"ttf").unwrap();
        let missing = dir.path().join("missing.ttf");
        let candidates = [missing.clone(), installed.clone()];

        assert_eq!(resolve_bold_font(None, &candidates), Some(installed.clone()));
        assert_eq!(resolve_bold_font(Some(missing.as_path()), &candidates), Some(installed.clone()));

        let configured = dir.path().join("Custom-Bold.ttf");
        std::fs::write(&configured, b"ttf").unwrap();
        assert_eq!(resolve_bold_font(Some(configured.as_path()), &candidates), Some(configured));

        assert_eq!(resolve_bold_font(None, &[missing]), None);
    }
}
