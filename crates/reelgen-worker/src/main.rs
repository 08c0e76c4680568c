//! Reel generation worker binary.
//!
//! ```text
//! reelgen-worker run <content-type> [--preset P] [--script FILE] [--mode M]
//!                    [--pattern P] [--random-pattern] [--character N] [--seed N]
//! reelgen-worker resume <session-id>
//! reelgen-worker show <session-id>
//! ```

use anyhow::{anyhow, bail, Context};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use reelgen_client::{HttpDownloader, HttpImageClient, HttpVideoClient};
use reelgen_media::FfmpegToolkit;
use reelgen_models::{
    DurationPreset, EncodingConfig, PatternKind, ReferenceMode, Script, SessionEvent, SessionId, SessionOutcome,
};
use reelgen_storage::R2Client;
use reelgen_worker::{metrics, PlanOptions, SessionRunner, WorkerConfig};

enum Command {
    Run {
        content_type: String,
        preset: DurationPreset,
        script: Option<PathBuf>,
        options: PlanOptions,
    },
    Resume(SessionId),
    Show(SessionId),
}

fn parse_args(mut args: impl Iterator<Item = String>) -> anyhow::Result<Command> {
    let command = args.next().ok_or_else(|| anyhow!("missing command (run, resume, show)"))?;
    match command.as_str() {
        "resume" | "show" => {
            let id = args.next().ok_or_else(|| anyhow!("missing session id"))?;
            let id = SessionId::from_string(id);
            Ok(if command == "resume" {
                Command::Resume(id)
            } else {
                Command::Show(id)
            })
        }
        "run" => {
            let content_type = args.next().ok_or_else(|| anyhow!("missing content type"))?;
            let mut preset = DurationPreset::Standard;
            let mut script = None;
            let mut options = PlanOptions::default();

            while let Some(flag) = args.next() {
                if flag == "--random-pattern" {
                    options.random_pattern = true;
                    continue;
                }
                let value = args.next().ok_or_else(|| anyhow!("{flag} needs a value"))?;
                match flag.as_str() {
                    "--preset" => preset = value.parse()?,
                    "--script" => script = Some(PathBuf::from(value)),
                    "--mode" => {
                        options.reference_mode = serde_json::from_value(serde_json::Value::String(value))
                            .context("mode must be fixed_identity, per_segment or continuity")?
                    }
                    "--pattern" => options.pattern_override = Some(value.parse::<PatternKind>()?),
                    "--character" => options.character_index = Some(value.parse()?),
                    "--seed" => options.rng_seed = Some(value.parse()?),
                    other => bail!("unknown flag {other}"),
                }
            }
            Ok(Command::Run {
                content_type,
                preset,
                script,
                options,
            })
        }
        other => bail!("unknown command {other}"),
    }
}

fn init_tracing() -> anyhow::Result<()> {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env().add_directive("reelgen=info".parse()?);

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
    Ok(())
}

fn init_metrics_from_env() -> anyhow::Result<()> {
    let enabled = std::env::var("METRICS_ENABLED")
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);
    if !enabled {
        return Ok(());
    }
    let port: u16 = std::env::var("METRICS_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(9090);
    metrics::init_metrics(SocketAddr::from(([0, 0, 0, 0], port)))?;
    info!(port, "Metrics exporter listening");
    Ok(())
}

async fn build_runner(config: WorkerConfig, abort: watch::Receiver<bool>) -> anyhow::Result<SessionRunner> {
    let toolkit = FfmpegToolkit::new(EncodingConfig::default())
        .with_timeout(config.ffmpeg_timeout_secs)
        .with_cancel(abort);

    Ok(SessionRunner::new(
        config,
        Arc::new(HttpVideoClient::from_env()?),
        Arc::new(HttpImageClient::from_env()?),
        Arc::new(HttpDownloader::new()?),
        Arc::new(R2Client::from_env().await?),
        Arc::new(toolkit),
    ))
}

fn log_events(mut rx: mpsc::UnboundedReceiver<SessionEvent>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match serde_json::to_string(&event) {
                Ok(json) => info!(target: "reelgen::events", "{}", json),
                Err(e) => warn!("Unserializable event: {}", e),
            }
        }
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("failed to install rustls crypto provider"))?;

    dotenvy::dotenv().ok();
    init_tracing()?;

    let command = parse_args(std::env::args().skip(1))?;
    let config = WorkerConfig::from_env();
    info!("Worker config: {:?}", config);
    init_metrics_from_env()?;

    let (abort_tx, abort_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Received interrupt, aborting session");
            let _ = abort_tx.send(true);
        }
    });

    let runner = build_runner(config, abort_rx.clone()).await?;
    let purged = runner.purge_frames().await;
    if purged > 0 {
        info!(purged, "Purged stale continuity frames");
    }

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let session = match command {
        Command::Show(id) => {
            let session = runner.get_session(&id).await?;
            println!("{}", serde_json::to_string_pretty(&session)?);
            return Ok(());
        }
        Command::Resume(id) => {
            let logger = log_events(events_rx);
            let session = runner.resume_session(&id, Some(events_tx), abort_rx).await?;
            logger.await.ok();
            session
        }
        Command::Run {
            content_type,
            preset,
            script,
            options,
        } => {
            let script = match script {
                Some(path) => {
                    let raw = tokio::fs::read_to_string(&path)
                        .await
                        .with_context(|| format!("reading {}", path.display()))?;
                    Some(serde_json::from_str::<Script>(&raw)?)
                }
                None => None,
            };
            let plan = runner.create_plan(&content_type, script.as_ref(), preset, &options)?;
            info!(plan_id = %plan.plan_id, segments = plan.len(), "Plan created");

            let logger = log_events(events_rx);
            let session = runner.run_session(plan, Some(events_tx), abort_rx).await?;
            logger.await.ok();
            session
        }
    };

    let outcome = session.outcome();
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    match outcome {
        SessionOutcome::Success { final_path } => {
            info!(session_id = %session.session_id, path = %final_path.display(), "Reel ready");
            Ok(())
        }
        other => {
            error!(session_id = %session.session_id, "Session did not complete: {:?}", other);
            std::process::exit(1);
        }
    }
}
