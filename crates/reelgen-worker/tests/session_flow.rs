//! End-to-end session runs against in-memory services.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::{mpsc, watch};

use reelgen_client::{
    ArtifactDownloader, ClientResult, ImageGenerationService, RemoteStatus, VideoGenerationService, VideoRequest,
};
use reelgen_media::{AssemblyOptions, CaptionStyle, CaptionWord, EncodingToolkit, MediaResult, VideoInfo};
use reelgen_models::{
    DurationPreset, GenerationPlan, ReferenceMode, SessionEvent, SessionOutcome, SessionStatus, ShotType,
    TaskStatus,
};
use reelgen_storage::{ObjectStore, SignedUrl, StorageResult};
use reelgen_worker::{PlanError, PlanOptions, SessionRunner, WorkerConfig, WorkerError};

/// Succeeds every task except the one whose prompt is `stuck`.
#[derive(Default)]
struct FakeVideo {
    stuck: Mutex<Option<String>>,
    submitted: Mutex<Vec<VideoRequest>>,
    prompts: Mutex<HashMap<String, String>>,
    stalled_polls: AtomicUsize,
}

impl FakeVideo {
    fn stall(&self, prompt: &str) {
        *self.stuck.lock().unwrap() = Some(prompt.to_string());
    }

    fn release(&self) {
        *self.stuck.lock().unwrap() = None;
    }

    fn submitted(&self) -> Vec<VideoRequest> {
        self.submitted.lock().unwrap().clone()
    }

    fn stalled_polls(&self) -> usize {
        self.stalled_polls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VideoGenerationService for FakeVideo {
    async fn submit(&self, request: &VideoRequest) -> ClientResult<String> {
        let mut submitted = self.submitted.lock().unwrap();
        let task_id = format!("task-{}", submitted.len());
        submitted.push(request.clone());
        self.prompts
            .lock()
            .unwrap()
            .insert(task_id.clone(), request.prompt.clone());
        Ok(task_id)
    }

    async fn poll(&self, task_id: &str) -> ClientResult<RemoteStatus> {
        let prompt = self.prompts.lock().unwrap().get(task_id).cloned();
        let stuck = self.stuck.lock().unwrap().clone();
        if prompt.is_some() && prompt == stuck {
            self.stalled_polls.fetch_add(1, Ordering::SeqCst);
            return Ok(RemoteStatus::Generating);
        }
        Ok(RemoteStatus::Succeeded {
            result_url: format!("https://cdn.test/{task_id}.mp4"),
        })
    }
}

#[derive(Default)]
struct FakeImages {
    shots: Mutex<Vec<ShotType>>,
}

#[async_trait]
impl ImageGenerationService for FakeImages {
    async fn generate(&self, _prompt: &str, shot: ShotType) -> ClientResult<String> {
        let mut shots = self.shots.lock().unwrap();
        shots.push(shot);
        Ok(format!("https://images.test/{}.png", shots.len()))
    }
}

#[derive(Default)]
struct FakeDownloader {
    dests: Mutex<Vec<PathBuf>>,
}

#[async_trait]
impl ArtifactDownloader for FakeDownloader {
    async fn download(&self, _url: &str, dest: &Path) -> ClientResult<u64> {
        self.dests.lock().unwrap().push(dest.to_path_buf());
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(dest, b"data").await?;
        Ok(4)
    }
}

#[derive(Default)]
struct FakeStore {
    puts: Mutex<Vec<String>>,
}

impl FakeStore {
    fn puts(&self) -> Vec<String> {
        self.puts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ObjectStore for FakeStore {
    async fn put_bytes(&self, key: &str, _data: Vec<u8>, _content_type: &str) -> StorageResult<()> {
        self.puts.lock().unwrap().push(key.to_string());
        Ok(())
    }

    async fn put_file(&self, key: &str, _path: &Path, _content_type: &str) -> StorageResult<()> {
        self.puts.lock().unwrap().push(key.to_string());
        Ok(())
    }

    async fn sign(&self, key: &str, ttl: Duration) -> StorageResult<SignedUrl> {
        SignedUrl::new(format!("https://r2.test/{key}?sig"), Utc::now(), ttl)
    }

    async fn delete(&self, _key: &str) -> StorageResult<()> {
        Ok(())
    }

    async fn exists(&self, _key: &str) -> StorageResult<bool> {
        Ok(true)
    }
}

#[derive(Default)]
struct FakeToolkit {
    frames: Mutex<Vec<PathBuf>>,
    frame_outputs: Mutex<Vec<PathBuf>>,
    concatenated: Mutex<Vec<Vec<PathBuf>>>,
}

#[async_trait]
impl EncodingToolkit for FakeToolkit {
    async fn probe(&self, _path: &Path) -> MediaResult<VideoInfo> {
        Ok(VideoInfo {
            duration: 8.0,
            width: 1080,
            height: 1920,
            fps: 30.0,
            codec: "h264".to_string(),
            has_audio: true,
        })
    }

    async fn extract_frame(&self, video: &Path, _seek_secs: f64, output: &Path) -> MediaResult<()> {
        self.frames.lock().unwrap().push(video.to_path_buf());
        self.frame_outputs.lock().unwrap().push(output.to_path_buf());
        tokio::fs::write(output, b"jpeg").await?;
        Ok(())
    }

    async fn concatenate(&self, clips: &[PathBuf], _options: &AssemblyOptions, output: &Path) -> MediaResult<f64> {
        self.concatenated.lock().unwrap().push(clips.to_vec());
        tokio::fs::write(output, b"assembled").await?;
        Ok(8.0 * clips.len() as f64)
    }

    async fn burn_captions(
        &self,
        _input: &Path,
        _words: &[CaptionWord],
        _style: &CaptionStyle,
        output: &Path,
    ) -> MediaResult<()> {
        tokio::fs::write(output, b"captioned").await?;
        Ok(())
    }
}

struct Harness {
    _dir: TempDir,
    runner: SessionRunner,
    video: Arc<FakeVideo>,
    images: Arc<FakeImages>,
    store: Arc<FakeStore>,
    downloader: Arc<FakeDownloader>,
    toolkit: Arc<FakeToolkit>,
}

fn harness() -> Harness {
    let dir = TempDir::new().unwrap();
    let config = WorkerConfig {
        work_dir: dir.path().to_path_buf(),
        poll_interval: Duration::from_millis(1),
        max_poll_attempts: 30,
        retry_backoff: Duration::from_millis(1),
        ..WorkerConfig::default()
    };
    let video = Arc::new(FakeVideo::default());
    let images = Arc::new(FakeImages::default());
    let store = Arc::new(FakeStore::default());
    let downloader = Arc::new(FakeDownloader::default());
    let toolkit = Arc::new(FakeToolkit::default());
    let runner = SessionRunner::new(
        config,
        video.clone(),
        images.clone(),
        downloader.clone(),
        store.clone(),
        toolkit.clone(),
    );
    Harness {
        _dir: dir,
        runner,
        video,
        images,
        store,
        downloader,
        toolkit,
    }
}

fn chollo_plan(h: &Harness, mode: ReferenceMode) -> GenerationPlan {
    let options = PlanOptions {
        character_index: Some(2),
        rng_seed: Some(7),
        reference_mode: mode,
        ..PlanOptions::default()
    };
    h.runner
        .create_plan("chollo", None, DurationPreset::Standard, &options)
        .unwrap()
}

fn drain(rx: &mut mpsc::UnboundedReceiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn test_stuck_segment_times_out_and_keeps_the_rest() {
    let h = harness();
    let plan = chollo_plan(&h, ReferenceMode::FixedIdentity);
    let stuck_role = plan.segments[2].role;
    h.video.stall(&plan.segments[2].prompt_text);

    let (tx, mut rx) = mpsc::unbounded_channel();
    let (_abort_tx, abort_rx) = watch::channel(false);
    let session = h.runner.run_session(plan, Some(tx), abort_rx).await.unwrap();

    assert_eq!(session.status, SessionStatus::PartiallyFailed);
    assert_eq!(
        session.outcome(),
        SessionOutcome::GenerationTimeout {
            segment_index: 2,
            role: stuck_role,
            attempts: 30,
        }
    );

    let clips = session.completed_clips();
    assert_eq!(clips.iter().map(|c| c.0).collect::<Vec<_>>(), vec![0, 1]);
    assert!(clips.iter().all(|c| c.2.is_file()));
    assert!(h.toolkit.concatenated.lock().unwrap().is_empty());
    assert!(session.final_path.is_none());

    let events = drain(&mut rx);
    assert!(matches!(events.first(), Some(SessionEvent::SessionStarted { segment_count: 3, .. })));
    assert!(events
        .iter()
        .any(|e| matches!(e, SessionEvent::TaskTimedOut { segment: 2, attempts: 30, .. })));
    assert!(matches!(events.last(), Some(SessionEvent::SessionFinished { .. })));
}

#[tokio::test]
async fn test_full_run_produces_captioned_reel() {
    let h = harness();
    let plan = chollo_plan(&h, ReferenceMode::FixedIdentity);

    let (tx, mut rx) = mpsc::unbounded_channel();
    let (_abort_tx, abort_rx) = watch::channel(false);
    let session = h.runner.run_session(plan, Some(tx), abort_rx).await.unwrap();

    assert_eq!(session.status, SessionStatus::Completed);
    let final_path = session.final_path.clone().unwrap();
    assert!(final_path.is_file());
    assert_eq!(
        session.outcome(),
        SessionOutcome::Success {
            final_path: final_path.clone()
        }
    );

    // Every segment is seeded with the identity portrait and its seed
    let submitted = h.video.submitted();
    assert_eq!(submitted.len(), 3);
    assert!(submitted.iter().all(|r| r.seed == 30003));
    assert!(submitted
        .iter()
        .all(|r| r.image_url.as_deref().is_some_and(|u| u.contains("presenter/identity_02.png"))));

    let concatenated = h.toolkit.concatenated.lock().unwrap().clone();
    assert_eq!(concatenated.len(), 1);
    let names: Vec<String> = concatenated[0]
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert!(names[0].starts_with("segment_00_"));
    assert!(names[2].starts_with("segment_02_"));

    let events = drain(&mut rx);
    assert!(events
        .iter()
        .any(|e| matches!(e, SessionEvent::AssemblyStarted { clip_count: 3 })));
    assert!(events
        .iter()
        .any(|e| matches!(e, SessionEvent::CaptionsCompleted { word_count, .. } if *word_count > 0)));

    let stored = h.runner.get_session(&session.session_id).await.unwrap();
    assert_eq!(stored.status, SessionStatus::Completed);

    let (_abort_tx, abort_rx) = watch::channel(false);
    let err = h
        .runner
        .resume_session(&session.session_id, None, abort_rx)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkerError::SessionFinalized(_)));
}

#[tokio::test]
async fn test_resume_regenerates_only_missing_segments() {
    let h = harness();
    let plan = chollo_plan(&h, ReferenceMode::FixedIdentity);
    let stuck_prompt = plan.segments[2].prompt_text.clone();
    h.video.stall(&stuck_prompt);

    let (_abort_tx, abort_rx) = watch::channel(false);
    let first = h.runner.run_session(plan, None, abort_rx.clone()).await.unwrap();
    assert_eq!(first.status, SessionStatus::PartiallyFailed);

    h.video.release();
    let resumed = h
        .runner
        .resume_session(&first.session_id, None, abort_rx)
        .await
        .unwrap();

    assert_eq!(resumed.status, SessionStatus::Completed);
    let submitted = h.video.submitted();
    assert_eq!(submitted.len(), 4);
    assert_eq!(submitted[3].prompt, stuck_prompt);
    assert_eq!(resumed.tasks.iter().filter(|t| t.segment_index == 2).count(), 2);
}

#[tokio::test]
async fn test_resume_polls_in_flight_task_instead_of_resubmitting() {
    let h = harness();
    let plan = chollo_plan(&h, ReferenceMode::FixedIdentity);
    h.video.stall(&plan.segments[2].prompt_text);

    let (abort_tx, abort_rx) = watch::channel(false);
    let trigger = async {
        while h.video.stalled_polls() < 3 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        abort_tx.send(true).unwrap();
    };
    let (first, ()) = tokio::join!(h.runner.run_session(plan, None, abort_rx), trigger);
    let first = first.unwrap();
    assert_eq!(first.status, SessionStatus::Aborted);

    let in_flight = first.latest_task(2).unwrap().clone();
    assert_eq!(in_flight.status, TaskStatus::Processing);
    assert!(in_flight.attempts >= 3);

    h.video.release();
    let (_abort_tx, abort_rx) = watch::channel(false);
    let resumed = h
        .runner
        .resume_session(&first.session_id, None, abort_rx)
        .await
        .unwrap();

    assert_eq!(resumed.status, SessionStatus::Completed);
    assert_eq!(h.video.submitted().len(), 3);
    let segment_two: Vec<_> = resumed.tasks.iter().filter(|t| t.segment_index == 2).collect();
    assert_eq!(segment_two.len(), 1);
    assert_eq!(segment_two[0].task_id, in_flight.task_id);
    assert_eq!(segment_two[0].status, TaskStatus::Succeeded);
}

#[tokio::test]
async fn test_concurrent_sessions_keep_working_files_apart() {
    let h = harness();
    let continuity = [
        chollo_plan(&h, ReferenceMode::Continuity),
        chollo_plan(&h, ReferenceMode::Continuity),
    ];
    let per_segment = [
        chollo_plan(&h, ReferenceMode::PerSegment),
        chollo_plan(&h, ReferenceMode::PerSegment),
    ];
    let [c1, c2] = continuity;
    let [p1, p2] = per_segment;

    let (_abort_tx, abort_rx) = watch::channel(false);
    let (c1, c2, p1, p2) = tokio::join!(
        h.runner.run_session(c1, None, abort_rx.clone()),
        h.runner.run_session(c2, None, abort_rx.clone()),
        h.runner.run_session(p1, None, abort_rx.clone()),
        h.runner.run_session(p2, None, abort_rx),
    );
    let sessions = [c1.unwrap(), c2.unwrap(), p1.unwrap(), p2.unwrap()];
    assert!(sessions.iter().all(|s| s.status == SessionStatus::Completed));

    // Same clip names in both continuity sessions, distinct frame files
    let frames = h.toolkit.frame_outputs.lock().unwrap().clone();
    assert_eq!(frames.len(), 4);
    assert_eq!(frames.iter().collect::<HashSet<_>>().len(), 4);
    for session in &sessions[..2] {
        let sid = session.session_id.as_str();
        assert_eq!(frames.iter().filter(|f| f.to_string_lossy().contains(sid)).count(), 2);
    }

    let references: Vec<PathBuf> = h
        .downloader
        .dests
        .lock()
        .unwrap()
        .iter()
        .filter(|p| p.extension().is_some_and(|e| e == "png"))
        .cloned()
        .collect();
    assert_eq!(references.len(), 6);
    assert_eq!(references.iter().collect::<HashSet<_>>().len(), 6);
}

#[tokio::test]
async fn test_continuity_mode_seeds_from_previous_clip() {
    let h = harness();
    let plan = chollo_plan(&h, ReferenceMode::Continuity);

    let (_abort_tx, abort_rx) = watch::channel(false);
    let session = tokio_test::assert_ok!(h.runner.run_session(plan, None, abort_rx).await);
    assert_eq!(session.status, SessionStatus::Completed);

    let frames = h.toolkit.frames.lock().unwrap().clone();
    assert_eq!(frames.len(), 2);
    assert_eq!(Some(&frames[0]), session.latest_task(0).unwrap().local_path.as_ref());

    let sid = session.session_id.as_str();
    let puts = h.store.puts();
    assert!(puts.contains(&format!("sessions/{sid}/frames/seed_01.jpg")));
    assert!(puts.contains(&format!("sessions/{sid}/frames/seed_02.jpg")));

    let submitted = h.video.submitted();
    assert!(submitted[0]
        .image_url
        .as_deref()
        .is_some_and(|u| u.contains("presenter/identity_02.png")));
    assert!(submitted[1]
        .image_url
        .as_deref()
        .is_some_and(|u| u.contains("frames/seed_01.jpg")));
    assert!(submitted[2]
        .image_url
        .as_deref()
        .is_some_and(|u| u.contains("frames/seed_02.jpg")));
}

#[tokio::test]
async fn test_per_segment_references_are_persisted() {
    let h = harness();
    let plan = chollo_plan(&h, ReferenceMode::PerSegment);
    let shots: Vec<ShotType> = plan.segments.iter().map(|s| s.cinematography.shot_type).collect();

    let (tx, mut rx) = mpsc::unbounded_channel();
    let (_abort_tx, abort_rx) = watch::channel(false);
    let session = h.runner.run_session(plan, Some(tx), abort_rx).await.unwrap();
    assert_eq!(session.status, SessionStatus::Completed);

    assert_eq!(session.references.len(), 3);
    let mut generated = h.images.shots.lock().unwrap().clone();
    let mut expected = shots;
    generated.sort_by_key(|s| s.as_str());
    expected.sort_by_key(|s| s.as_str());
    assert_eq!(generated, expected);

    for (index, reference) in &session.references {
        assert!(reference.storage_key.contains(&format!("segment_{index:02}_")));
        assert!(reference.persisted_url.starts_with("https://r2.test/"));
    }
    let ready = drain(&mut rx)
        .into_iter()
        .filter(|e| matches!(e, SessionEvent::ReferenceReady { .. }))
        .count();
    assert_eq!(ready, 3);
}

#[tokio::test]
async fn test_abort_before_submission() {
    let h = harness();
    let plan = chollo_plan(&h, ReferenceMode::FixedIdentity);

    let (_abort_tx, abort_rx) = watch::channel(true);
    let session = h.runner.run_session(plan, None, abort_rx).await.unwrap();

    assert_eq!(session.status, SessionStatus::Aborted);
    assert_eq!(session.outcome(), SessionOutcome::Aborted);
    assert!(h.video.submitted().is_empty());
}

#[tokio::test]
async fn test_unknown_content_type_is_rejected_before_any_call() {
    let h = harness();
    let err = h
        .runner
        .create_plan("horoscope", None, DurationPreset::Standard, &PlanOptions::default())
        .unwrap_err();

    assert!(matches!(err, WorkerError::Plan(PlanError::UnknownContentType(ref t)) if t == "horoscope"));
    assert!(h.video.submitted().is_empty());
}
