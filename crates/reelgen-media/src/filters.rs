//! FFmpeg filter graph builders.
//!
//! Pure string builders; nothing here touches the filesystem or spawns
//! processes.

use reelgen_models::encoding::{EncodingConfig, OUTPUT_SAMPLE_RATE};

/// Output labels of a join graph.
pub const VIDEO_OUT: &str = "[vout]";
pub const AUDIO_OUT: &str = "[aout]";

/// One input of a join graph, in `-i` order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GraphInput {
    /// Probed duration in seconds
    pub duration: f64,
    pub has_audio: bool,
    /// Seconds to hold the last frame (and pad silence) at the end
    pub freeze_tail: f64,
}

impl GraphInput {
    pub fn new(duration: f64, has_audio: bool) -> Self {
        Self {
            duration,
            has_audio,
            freeze_tail: 0.0,
        }
    }

    /// Duration after the freeze tail.
    pub fn effective_duration(&self) -> f64 {
        self.duration + self.freeze_tail.max(0.0)
    }
}

/// A built `-filter_complex` graph.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterGraph {
    pub graph: String,
    /// Expected output duration in seconds
    pub duration: f64,
}

/// Hold the last frame for `secs`.
pub fn freeze_tail_video(secs: f64) -> String {
    format!("tpad=stop_mode=clone:stop_duration={:.3}", secs)
}

/// Resample to the common layout, then pad or trim to exactly `duration`.
pub fn fit_audio(duration: f64) -> String {
    format!(
        "aresample={rate},aformat=sample_fmts=fltp:channel_layouts=stereo,apad=whole_dur={d:.3},atrim=duration={d:.3}",
        rate = OUTPUT_SAMPLE_RATE,
        d = duration
    )
}

/// Silence for inputs without an audio stream.
pub fn silent_audio(duration: f64) -> String {
    format!(
        "anullsrc=channel_layout=stereo:sample_rate={},atrim=duration={:.3}",
        OUTPUT_SAMPLE_RATE, duration
    )
}

/// Crossfade length usable between the given segments.
///
/// Never more than half the shortest segment, so consecutive fades never
/// overlap.
pub fn usable_crossfade(requested: f64, segments: &[GraphInput]) -> f64 {
    let shortest = segments
        .iter()
        .map(GraphInput::effective_duration)
        .fold(f64::INFINITY, f64::min);
    if !shortest.is_finite() {
        return 0.0;
    }
    requested.min(shortest / 2.0).max(0.0)
}

/// Build the graph joining `segments` (with an optional trailing `outro`).
///
/// Segments are joined with a hard cut, or with chained `xfade` and
/// `acrossfade` when `crossfade` is set and there are at least two
/// segments. The outro, when present, is always appended with a hard cut.
/// Outputs are labelled [`VIDEO_OUT`] and [`AUDIO_OUT`].
pub fn build_join_graph(
    segments: &[GraphInput],
    outro: Option<&GraphInput>,
    crossfade: Option<f64>,
    encoding: &EncodingConfig,
) -> FilterGraph {
    let all: Vec<&GraphInput> = segments.iter().chain(outro).collect();
    let mut chains: Vec<String> = Vec::with_capacity(all.len() * 2 + segments.len() * 2 + 1);

    for (i, input) in all.iter().enumerate() {
        let mut video = format!("[{i}:v]{}", encoding.normalize_filter());
        if input.freeze_tail > 0.0 {
            video.push(',');
            video.push_str(&freeze_tail_video(input.freeze_tail));
        }
        chains.push(format!("{video}[v{i}]"));

        let audio = if input.has_audio {
            format!("[{i}:a]{}", fit_audio(input.effective_duration()))
        } else {
            silent_audio(input.effective_duration())
        };
        chains.push(format!("{audio}[a{i}]"));
    }

    let fade = crossfade
        .filter(|_| segments.len() > 1)
        .map(|d| usable_crossfade(d, segments))
        .filter(|d| *d > 0.0);

    let duration = match fade {
        None => {
            let labels: String = (0..all.len()).map(|i| format!("[v{i}][a{i}]")).collect();
            chains.push(format!(
                "{labels}concat=n={}:v=1:a=1{VIDEO_OUT}{AUDIO_OUT}",
                all.len()
            ));
            all.iter().map(|i| i.effective_duration()).sum()
        }
        Some(d) => {
            let last = segments.len() - 1;
            let mut video_label = "[v0]".to_string();
            let mut audio_label = "[a0]".to_string();
            let mut length = segments[0].effective_duration();

            for k in 1..segments.len() {
                let (next_video, next_audio) = if k == last && outro.is_none() {
                    (VIDEO_OUT.to_string(), AUDIO_OUT.to_string())
                } else {
                    (format!("[vx{k}]"), format!("[ax{k}]"))
                };
                chains.push(format!(
                    "{video_label}[v{k}]xfade=transition=fade:duration={d:.3}:offset={:.3}{next_video}",
                    length - d
                ));
                chains.push(format!("{audio_label}[a{k}]acrossfade=d={d:.3}{next_audio}"));
                length += segments[k].effective_duration() - d;
                video_label = next_video;
                audio_label = next_audio;
            }

            if let Some(outro) = outro {
                let o = segments.len();
                chains.push(format!(
                    "{video_label}{audio_label}[v{o}][a{o}]concat=n=2:v=1:a=1{VIDEO_OUT}{AUDIO_OUT}"
                ));
                length += outro.effective_duration();
            }
            length
        }
    };

    FilterGraph {
        graph: chains.join(";"),
        duration,
    }
}

/// Escape a path for use inside a quoted filter option.
pub fn escape_filter_path(path: &str) -> String {
    path.replace('\\', "\\\\")
        .replace('\'', "\\'")
        .replace(':', "\\:")
}

/// Escape text for a single-quoted `drawtext` `text` option.
///
/// Straight quotes cannot be escaped inside the quoted value, so they are
/// replaced by the typographic apostrophe.
pub fn escape_drawtext(text: &str) -> String {
    text.replace('\\', "\\\\\\\\")
        .replace('\'', "\u{2019}")
        .replace(':', "\\:")
        .replace('%', "\\%")
}
