use std::path::Path;

use reelgen_media::{check_ffmpeg, check_ffprobe};
use reelgen_worker::WorkerConfig;

const REQUIRED_ENV: &[&str] = &[
    "VIDEO_API_BASE_URL",
    "VIDEO_API_KEY",
    "IMAGE_API_BASE_URL",
    "IMAGE_API_KEY",
    "R2_ENDPOINT_URL",
    "R2_ACCESS_KEY_ID",
    "R2_SECRET_ACCESS_KEY",
    "R2_BUCKET_NAME",
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = WorkerConfig::from_env();

    println!(
        "worker-selfcheck: starting with work_dir={}",
        config.work_dir.display()
    );
    ensure_workdir(&config.work_dir).await?;
    ensure_workdir(config.sessions_dir()).await?;
    ensure_workdir(config.frames_dir()).await?;

    let ffmpeg = check_ffmpeg().map_err(|e| anyhow::anyhow!("ffmpeg not available: {}", e))?;
    let ffprobe = check_ffprobe().map_err(|e| anyhow::anyhow!("ffprobe not available: {}", e))?;
    println!("worker-selfcheck: ffmpeg={} ffprobe={}", ffmpeg.display(), ffprobe.display());

    if let Some(outro) = &config.outro_path {
        if !outro.is_file() {
            return Err(anyhow::anyhow!("outro clip {} not found", outro.display()));
        }
    }
    if let Some(font) = &config.caption_font {
        if !font.is_file() {
            return Err(anyhow::anyhow!("caption font {} not found", font.display()));
        }
    }
    let font = config
        .caption_font_path()
        .ok_or_else(|| anyhow::anyhow!("no bold caption font installed; set REELGEN_CAPTION_FONT"))?;
    println!("worker-selfcheck: caption_font={}", font.display());

    ensure_env_present(REQUIRED_ENV)?;

    println!("worker-selfcheck: ok");
    Ok(())
}

async fn ensure_workdir<P: AsRef<Path>>(path: P) -> anyhow::Result<()> {
    let path = path.as_ref();
    tokio::fs::create_dir_all(path).await?;
    Ok(())
}

fn ensure_env_present(vars: &[&str]) -> anyhow::Result<()> {
    for var in vars {
        if std::env::var(var).is_err() {
            return Err(anyhow::anyhow!("missing required env var {}", var));
        }
    }
    Ok(())
}
