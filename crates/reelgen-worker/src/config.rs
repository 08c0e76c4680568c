//! Worker configuration.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use reelgen_media::assemble::{DEFAULT_CROSSFADE_SECS, DEFAULT_FREEZE_SECS};
use reelgen_media::captions::{resolve_bold_font, BOLD_FONT_CANDIDATES, DEFAULT_WORDS_PER_SECOND};
use reelgen_media::Transition;
use reelgen_models::{CharacterIdentity, SessionId};

/// Recurring presenter shared by every plan.
#[derive(Debug, Clone)]
pub struct PresenterConfig {
    /// Base character description prepended to every prompt
    pub description: String,
    /// Generation seed per identity index
    pub identity_seeds: Vec<u32>,
}

impl Default for PresenterConfig {
    fn default() -> Self {
        Self {
            description: "a charismatic Spanish football analyst in a navy blazer over a white shirt, \
                          short dark hair, trimmed beard, standing in a modern sports studio"
                .to_string(),
            identity_seeds: vec![30001, 30002, 30003, 30004, 30005],
        }
    }
}

impl PresenterConfig {
    /// `REELGEN_PRESENTER_DESCRIPTION`, `REELGEN_PRESENTER_SEEDS` (comma separated).
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let description = std::env::var("REELGEN_PRESENTER_DESCRIPTION")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(defaults.description);
        let identity_seeds = std::env::var("REELGEN_PRESENTER_SEEDS")
            .ok()
            .map(|raw| parse_seeds(&raw))
            .filter(|seeds| !seeds.is_empty())
            .unwrap_or(defaults.identity_seeds);
        Self {
            description,
            identity_seeds,
        }
    }

    pub fn identity_count(&self) -> usize {
        self.identity_seeds.len()
    }

    pub fn identity(&self, index: usize) -> Option<CharacterIdentity> {
        self.identity_seeds
            .get(index)
            .map(|seed| CharacterIdentity { index, seed: *seed })
    }
}

fn parse_seeds(raw: &str) -> Vec<u32> {
    raw.split(',').filter_map(|s| s.trim().parse().ok()).collect()
}

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Root of the per-session directories
    pub work_dir: PathBuf,
    /// Delay between polls of one task
    pub poll_interval: Duration,
    pub max_poll_attempts: u32,
    /// Automatic resubmissions after a transient submit failure
    pub submit_resubmissions: u32,
    pub download_retries: u32,
    /// Fixed backoff between retries
    pub retry_backoff: Duration,
    /// Lifetime of signed reference URLs
    pub reference_ttl: Duration,
    /// A reference expiring sooner than this is regenerated instead of reused
    pub reference_margin: Duration,
    pub transition: Transition,
    pub freeze_secs: f64,
    pub outro_path: Option<PathBuf>,
    pub caption_font: Option<PathBuf>,
    pub words_per_second: f64,
    /// Continuity frames older than this are purged at start-up
    pub frame_max_age: Duration,
    pub ffmpeg_timeout_secs: u64,
    pub presenter: PresenterConfig,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("/tmp/reelgen"),
            poll_interval: Duration::from_secs(10),
            max_poll_attempts: 30, // ~5 minutes
            submit_resubmissions: 1,
            download_retries: 3,
            retry_backoff: Duration::from_secs(2),
            reference_ttl: Duration::from_secs(24 * 3600),
            reference_margin: Duration::from_secs(15 * 60),
            transition: Transition::HardCut,
            freeze_secs: DEFAULT_FREEZE_SECS,
            outro_path: None,
            caption_font: None,
            words_per_second: DEFAULT_WORDS_PER_SECOND,
            frame_max_age: Duration::from_secs(24 * 3600),
            ffmpeg_timeout_secs: 600,
            presenter: PresenterConfig::default(),
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            work_dir: std::env::var("REELGEN_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.work_dir),
            poll_interval: Duration::from_secs(env_or("REELGEN_POLL_INTERVAL_SECS", 10)),
            max_poll_attempts: env_or("REELGEN_MAX_POLL_ATTEMPTS", defaults.max_poll_attempts),
            submit_resubmissions: env_or("REELGEN_SUBMIT_RESUBMISSIONS", defaults.submit_resubmissions),
            download_retries: env_or("REELGEN_DOWNLOAD_RETRIES", defaults.download_retries),
            retry_backoff: Duration::from_millis(env_or("REELGEN_RETRY_BACKOFF_MS", 2000)),
            reference_ttl: Duration::from_secs(env_or("REELGEN_REFERENCE_TTL_HOURS", 24u64) * 3600),
            reference_margin: defaults.reference_margin,
            transition: transition_from_env(),
            freeze_secs: env_or("REELGEN_FREEZE_SECS", defaults.freeze_secs),
            outro_path: optional_path("REELGEN_OUTRO_PATH"),
            caption_font: optional_path("REELGEN_CAPTION_FONT"),
            words_per_second: env_or("REELGEN_WORDS_PER_SECOND", defaults.words_per_second),
            frame_max_age: Duration::from_secs(env_or("REELGEN_FRAME_MAX_AGE_HOURS", 24u64) * 3600),
            ffmpeg_timeout_secs: env_or("REELGEN_FFMPEG_TIMEOUT_SECS", defaults.ffmpeg_timeout_secs),
            presenter: PresenterConfig::from_env(),
        }
    }

    /// Upper bound on how long one task is polled.
    pub fn max_poll_window(&self) -> Duration {
        self.poll_interval.saturating_mul(self.max_poll_attempts)
    }

    pub fn sessions_dir(&self) -> PathBuf {
        self.work_dir.join("sessions")
    }

    pub fn session_dir(&self, session_id: &SessionId) -> PathBuf {
        self.sessions_dir().join(session_id.as_str())
    }

    pub fn frames_dir(&self) -> PathBuf {
        self.work_dir.join("frames")
    }

    /// Bold caption font: `caption_font` when it exists, else an installed
    /// system bold font.
    pub fn caption_font_path(&self) -> Option<PathBuf> {
        resolve_bold_font(self.caption_font.as_deref(), BOLD_FONT_CANDIDATES)
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

fn optional_path(name: &str) -> Option<PathBuf> {
    std::env::var(name)
        .ok()
        .filter(|s| !s.trim().is_empty())
        .map(PathBuf::from)
}

/// `REELGEN_TRANSITION=crossfade` with optional `REELGEN_CROSSFADE_SECS`.
fn transition_from_env() -> Transition {
    match std::env::var("REELGEN_TRANSITION")
        .unwrap_or_default()
        .to_lowercase()
        .as_str()
    {
        "crossfade" | "xfade" => Transition::Crossfade {
            duration_secs: env_or("REELGEN_CROSSFADE_SECS", DEFAULT_CROSSFADE_SECS),
        },
        _ => Transition::HardCut,
    }
}
