//! Generation task orchestration: submit, poll, download.
//!
//! Each task moves `pending -> processing -> {succeeded | failed | timed_out}`.
//! Polling suspends on a timer between attempts and stops as soon as the
//! abort signal fires. Aborting never cancels the remote job.

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use reelgen_client::{ArtifactDownloader, ClientError, RemoteStatus, VideoGenerationService, VideoRequest};
use reelgen_models::{AspectRatio, GenerationTask, SegmentSpec, TaskStatus};

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::metrics;
use crate::retry::{retry_async, RetryConfig};

/// Receives every task state change, for persistence and progress events.
#[async_trait]
pub trait TaskSink: Send + Sync {
    async fn record(&self, task: &GenerationTask);
}

/// Polling and retry limits.
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub poll_interval: Duration,
    pub max_poll_attempts: u32,
    pub submit_resubmissions: u32,
    pub download_retries: u32,
    pub retry_backoff: Duration,
}

impl From<&WorkerConfig> for OrchestratorSettings {
    fn from(config: &WorkerConfig) -> Self {
        Self {
            poll_interval: config.poll_interval,
            max_poll_attempts: config.max_poll_attempts,
            submit_resubmissions: config.submit_resubmissions,
            download_retries: config.download_retries,
            retry_backoff: config.retry_backoff,
        }
    }
}

pub struct GenerationTaskOrchestrator {
    service: Arc<dyn VideoGenerationService>,
    downloader: Arc<dyn ArtifactDownloader>,
    settings: OrchestratorSettings,
}

impl GenerationTaskOrchestrator {
    pub fn new(
        service: Arc<dyn VideoGenerationService>,
        downloader: Arc<dyn ArtifactDownloader>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            service,
            downloader,
            settings,
        }
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    /// Submit one segment. Transient failures get the configured number of
    /// automatic resubmissions.
    pub async fn submit(
        &self,
        spec: &SegmentSpec,
        image_url: Option<&str>,
        aspect_ratio: AspectRatio,
    ) -> WorkerResult<GenerationTask> {
        let request = VideoRequest {
            prompt: spec.prompt_text.clone(),
            image_url: image_url.map(str::to_string),
            seed: spec.character_seed,
            duration_secs: spec.duration_seconds.round().max(1.0) as u32,
            aspect_ratio,
        };
        let retry = RetryConfig::new(format!("submit segment {}", spec.index))
            .with_max_retries(self.settings.submit_resubmissions)
            .with_delay(self.settings.retry_backoff);

        let task_id = retry_async(&retry, ClientError::is_transient, || self.service.submit(&request)).await?;

        metrics::record_task_submitted();
        info!(segment = spec.index, task_id = %task_id, "Segment submitted");
        Ok(GenerationTask::new(task_id, spec.index, spec.role))
    }

    /// One status query. Idempotent.
    pub async fn poll(&self, task_id: &str) -> WorkerResult<RemoteStatus> {
        metrics::record_poll_attempt();
        Ok(self.service.poll(task_id).await?)
    }

    /// Poll until the task is terminal, the attempts run out, or `abort` fires.
    ///
    /// Returns the result URL. Every state change is handed to `sink`.
    pub async fn await_completion(
        &self,
        task: &mut GenerationTask,
        abort: &mut watch::Receiver<bool>,
        sink: &dyn TaskSink,
    ) -> WorkerResult<String> {
        loop {
            if *abort.borrow() {
                return Err(WorkerError::Aborted);
            }
            if task.attempts >= self.settings.max_poll_attempts {
                task.time_out()?;
                sink.record(task).await;
                metrics::record_task_terminal(TaskStatus::TimedOut);
                warn!(task_id = %task.task_id, attempts = task.attempts, "Task timed out");
                return Err(WorkerError::GenerationTimeout {
                    task_id: task.task_id.clone(),
                    attempts: task.attempts,
                });
            }

            if wait_or_abort(self.settings.poll_interval, abort).await {
                return Err(WorkerError::Aborted);
            }

            match self.poll(&task.task_id).await {
                Ok(RemoteStatus::Generating) => {
                    task.record_poll(TaskStatus::Processing)?;
                    debug!(task_id = %task.task_id, attempt = task.attempts, "Still generating");
                }
                Ok(RemoteStatus::Succeeded { result_url }) => {
                    task.record_poll(TaskStatus::Succeeded)?;
                    task.succeed(result_url.clone())?;
                    sink.record(task).await;
                    metrics::record_task_terminal(TaskStatus::Succeeded);
                    info!(task_id = %task.task_id, attempts = task.attempts, "Task succeeded");
                    return Ok(result_url);
                }
                Ok(RemoteStatus::Failed { message }) => {
                    task.record_poll(TaskStatus::Failed)?;
                    return self.fail_task(task, message, sink).await;
                }
                Err(e) if e.is_retryable() => {
                    task.record_poll(task.status)?;
                    warn!(task_id = %task.task_id, attempt = task.attempts, "Poll failed: {}", e);
                }
                Err(e) => {
                    task.record_poll(task.status)?;
                    return self.fail_task(task, e.to_string(), sink).await;
                }
            }
            sink.record(task).await;
        }
    }

    async fn fail_task(
        &self,
        task: &mut GenerationTask,
        message: String,
        sink: &dyn TaskSink,
    ) -> WorkerResult<String> {
        task.fail(message.clone())?;
        sink.record(task).await;
        metrics::record_task_terminal(TaskStatus::Failed);
        warn!(task_id = %task.task_id, "Task failed: {}", message);
        Err(WorkerError::GenerationFailed {
            task_id: task.task_id.clone(),
            message,
        })
    }

    /// Stream `url` to `dest`, retrying a bounded number of times.
    pub async fn download(&self, url: &str, dest: &Path) -> WorkerResult<u64> {
        let retry = RetryConfig::new(format!("download {}", dest.display()))
            .with_max_retries(self.settings.download_retries)
            .with_delay(self.settings.retry_backoff);

        let started = Instant::now();
        let bytes = retry_async(&retry, |_: &ClientError| true, || self.downloader.download(url, dest))
            .await
            .map_err(|e| WorkerError::download_failed(format!("{url}: {e}")))?;
        metrics::record_download(started.elapsed().as_secs_f64());
        Ok(bytes)
    }
}

/// Sleep for `interval`, waking early if `abort` turns true. Returns whether
/// the abort fired.
async fn wait_or_abort(interval: Duration, abort: &mut watch::Receiver<bool>) -> bool {
    let sleep = tokio::time::sleep(interval);
    tokio::pin!(sleep);
    loop {
        tokio::select! {
            _ = &mut sleep => return *abort.borrow(),
            changed = abort.changed() => match changed {
                Ok(()) if *abort.borrow() => return true,
                Ok(()) => continue,
                // Sender gone: nobody can abort any more
                Err(_) => {
                    (&mut sleep).await;
                    return false;
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::mock;
    use reelgen_client::ClientResult;
    use reelgen_models::{BehaviorCategory, Cinematography, Emotion, ReferenceSource, Role, ShotType};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use tempfile::TempDir;

    mock! {
        pub Video {}

        #[async_trait]
        impl VideoGenerationService for Video {
            async fn submit(&self, request: &VideoRequest) -> ClientResult<String>;
            async fn poll(&self, task_id: &str) -> ClientResult<RemoteStatus>;
        }
    }

    #[derive(Default)]
    struct RecordingSink(Mutex<Vec<GenerationTask>>);

    #[async_trait]
    impl TaskSink for RecordingSink {
        async fn record(&self, task: &GenerationTask) {
            self.0.lock().unwrap().push(task.clone());
        }
    }

    /// Fails `failures` times, then writes the file.
    struct FlakyDownloader {
        failures: u32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl ArtifactDownloader for FlakyDownloader {
        async fn download(&self, _url: &str, dest: &Path) -> ClientResult<u64> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                return Err(ClientError::Transport("connection reset".into()));
            }
            tokio::fs::write(dest, b"mp4").await?;
            Ok(3)
        }
    }

    fn settings() -> OrchestratorSettings {
        OrchestratorSettings {
            poll_interval: Duration::from_secs(10),
            max_poll_attempts: 30,
            submit_resubmissions: 1,
            download_retries: 3,
            retry_backoff: Duration::from_millis(1),
        }
    }

    fn orchestrator(video: MockVideo, downloader: FlakyDownloader) -> GenerationTaskOrchestrator {
        GenerationTaskOrchestrator::new(Arc::new(video), Arc::new(downloader), settings())
    }

    fn downloader() -> FlakyDownloader {
        FlakyDownloader {
            failures: 0,
            calls: AtomicU32::new(0),
        }
    }

    fn spec() -> SegmentSpec {
        SegmentSpec {
            index: 1,
            role: Role::Middle,
            emotion: Emotion::Validacion,
            dialogue: "texto".into(),
            duration_seconds: 8.0,
            prompt_text: "Medium shot".into(),
            cinematography: Cinematography {
                shot_type: ShotType::Medium,
                behavior_category: BehaviorCategory::ShiftingPosture,
                behavior_description: "leaning slightly forward".into(),
            },
            reference: ReferenceSource::Generated,
            character_seed: 30001,
        }
    }

    #[tokio::test]
    async fn test_submit_resubmits_once_after_transient_error() {
        let mut video = MockVideo::new();
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        video
            .expect_submit()
            .withf(|req| req.seed == 30001 && req.duration_secs == 8 && req.image_url.is_none())
            .times(2)
            .returning(move |_| {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(ClientError::Transport("reset".into()))
                } else {
                    Ok("task-1".to_string())
                }
            });

        let task = orchestrator(video, downloader())
            .submit(&spec(), None, AspectRatio::Portrait)
            .await
            .unwrap();
        assert_eq!(task.task_id, "task-1");
        assert_eq!(task.segment_index, 1);
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_submit_gives_up_after_one_resubmission() {
        let mut video = MockVideo::new();
        video
            .expect_submit()
            .times(2)
            .returning(|_| Err(ClientError::Http { status: 503, body: String::new() }));

        let err = orchestrator(video, downloader())
            .submit(&spec(), Some("https://r2/ref?sig"), AspectRatio::Portrait)
            .await
            .unwrap_err();
        assert!(matches!(err, WorkerError::Client(ClientError::Http { status: 503, .. })));
    }

    #[tokio::test]
    async fn test_submit_validation_error_is_not_resubmitted() {
        let mut video = MockVideo::new();
        video.expect_submit().times(1).returning(|_| {
            Err(ClientError::Api {
                code: 422,
                message: "prompt rejected".into(),
            })
        });

        assert!(orchestrator(video, downloader())
            .submit(&spec(), None, AspectRatio::Portrait)
            .await
            .is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_await_completion_times_out_within_bound() {
        let mut video = MockVideo::new();
        video
            .expect_poll()
            .times(30)
            .returning(|_| Ok(RemoteStatus::Generating));

        let orchestrator = orchestrator(video, downloader());
        let (_abort_tx, mut abort) = watch::channel(false);
        let sink = RecordingSink::default();
        let mut task = GenerationTask::new("task-3", 2, Role::Outro);

        let started = tokio::time::Instant::now();
        let err = orchestrator
            .await_completion(&mut task, &mut abort, &sink)
            .await
            .unwrap_err();

        assert!(started.elapsed() <= Duration::from_secs(300));
        assert!(matches!(err, WorkerError::GenerationTimeout { attempts: 30, .. }));
        assert_eq!(task.status, TaskStatus::TimedOut);
        assert_eq!(task.attempts, 30);
        let recorded = sink.0.lock().unwrap();
        assert_eq!(recorded.last().map(|t| t.status), Some(TaskStatus::TimedOut));
    }

    #[tokio::test(start_paused = true)]
    async fn test_await_completion_returns_result_url() {
        let mut video = MockVideo::new();
        let polls = AtomicU32::new(0);
        video.expect_poll().times(3).returning(move |_| {
            if polls.fetch_add(1, Ordering::SeqCst) < 2 {
                Ok(RemoteStatus::Generating)
            } else {
                Ok(RemoteStatus::Succeeded {
                    result_url: "https://cdn/clip.mp4".into(),
                })
            }
        });

        let orchestrator = orchestrator(video, downloader());
        let (_abort_tx, mut abort) = watch::channel(false);
        let sink = RecordingSink::default();
        let mut task = GenerationTask::new("task-1", 0, Role::Intro);

        let url = orchestrator
            .await_completion(&mut task, &mut abort, &sink)
            .await
            .unwrap();
        assert_eq!(url, "https://cdn/clip.mp4");
        assert_eq!(task.status, TaskStatus::Succeeded);
        assert_eq!(task.attempts, 3);

        // Status only ever moved forward
        let statuses: Vec<TaskStatus> = sink.0.lock().unwrap().iter().map(|t| t.status).collect();
        assert_eq!(
            statuses,
            vec![TaskStatus::Processing, TaskStatus::Processing, TaskStatus::Succeeded]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_explicit_failure_is_distinct_from_timeout() {
        let mut video = MockVideo::new();
        video.expect_poll().times(1).returning(|_| {
            Ok(RemoteStatus::Failed {
                message: "content policy".into(),
            })
        });

        let orchestrator = orchestrator(video, downloader());
        let (_abort_tx, mut abort) = watch::channel(false);
        let mut task = GenerationTask::new("task-2", 1, Role::Middle);

        let err = orchestrator
            .await_completion(&mut task, &mut abort, &RecordingSink::default())
            .await
            .unwrap_err();
        assert!(matches!(err, WorkerError::GenerationFailed { ref message, .. } if message == "content policy"));
        assert_eq!(task.status, TaskStatus::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_poll_errors_count_as_attempts() {
        let mut video = MockVideo::new();
        let polls = AtomicU32::new(0);
        video.expect_poll().times(2).returning(move |_| {
            if polls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(ClientError::Transport("timeout".into()))
            } else {
                Ok(RemoteStatus::Succeeded {
                    result_url: "https://cdn/x.mp4".into(),
                })
            }
        });

        let orchestrator = orchestrator(video, downloader());
        let (_abort_tx, mut abort) = watch::channel(false);
        let mut task = GenerationTask::new("t", 0, Role::Intro);
        orchestrator
            .await_completion(&mut task, &mut abort, &RecordingSink::default())
            .await
            .unwrap();
        assert_eq!(task.attempts, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abort_stops_polling() {
        let mut video = MockVideo::new();
        video.expect_poll().times(0);

        let orchestrator = orchestrator(video, downloader());
        let (abort_tx, mut abort) = watch::channel(false);
        let mut task = GenerationTask::new("t", 0, Role::Intro);

        let handle = async {
            orchestrator
                .await_completion(&mut task, &mut abort, &RecordingSink::default())
                .await
        };
        let trigger = async {
            tokio::time::sleep(Duration::from_secs(3)).await;
            abort_tx.send(true).unwrap();
        };
        let (result, ()) = tokio::join!(handle, trigger);

        assert!(matches!(result, Err(WorkerError::Aborted)));
        assert_eq!(task.status, TaskStatus::Pending);
    }

    #[tokio::test]
    async fn test_download_retries_then_succeeds() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("segment_00_intro.mp4");
        let orchestrator = orchestrator(
            MockVideo::new(),
            FlakyDownloader {
                failures: 2,
                calls: AtomicU32::new(0),
            },
        );

        assert_eq!(orchestrator.download("https://cdn/a.mp4", &dest).await.unwrap(), 3);
        assert!(dest.exists());
    }

    #[tokio::test]
    async fn test_download_propagates_after_bounded_retries() {
        let dir = TempDir::new().unwrap();
        let orchestrator = orchestrator(
            MockVideo::new(),
            FlakyDownloader {
                failures: 10,
                calls: AtomicU32::new(0),
            },
        );

        let err = orchestrator
            .download("https://cdn/a.mp4", &dir.path().join("a.mp4"))
            .await
            .unwrap_err();
        assert!(matches!(err, WorkerError::DownloadFailed(_)));
    }
}
