//! Session runner: plan -> references -> generation -> assembly -> captions.
//!
//! Segments are generated concurrently except in continuity mode, where each
//! segment is seeded from the previous clip. The session record is saved on
//! every transition; `resume_session` picks up from it, polling tasks that
//! were still running instead of submitting them again. Continuity frames and
//! scratch files live under per-session directories.

use async_trait::async_trait;
use futures::future::join_all;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, watch, Mutex};
use tracing::{debug, warn, Instrument};

use reelgen_client::{ArtifactDownloader, ImageGenerationService, VideoGenerationService};
use reelgen_media::{
    AssemblyOptions, CaptionStyle, CaptionSynchronizer, ContinuityExtractor, EncodingToolkit, OutroSpec,
    SegmentAssembler, SegmentClip,
};
use reelgen_models::{
    DurationPreset, GenerationPlan, GenerationTask, ReferenceSource, Role, Script, SegmentSpec, Session, SessionEvent,
    SessionId, SessionStatus, TaskStatus,
};
use reelgen_storage::ObjectStore;

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::SessionLogger;
use crate::metrics;
use crate::orchestrator::{GenerationTaskOrchestrator, OrchestratorSettings, TaskSink};
use crate::planner::{DialogueValidator, PlanOptions, SegmentPlanner};
use crate::reference::ReferenceImageProvider;
use crate::session_store::SessionStore;

/// Progress event channel. Send failures are ignored.
#[derive(Clone, Default)]
struct Events(Option<mpsc::UnboundedSender<SessionEvent>>);

impl Events {
    fn send(&self, event: SessionEvent) {
        if let Some(tx) = &self.0 {
            let _ = tx.send(event);
        }
    }
}

/// In-flight session shared by the segment futures.
struct SessionTracker {
    session: Mutex<Session>,
    store: SessionStore,
    events: Events,
    max_attempts: u32,
    logger: SessionLogger,
}

impl SessionTracker {
    /// Apply `f` and persist the result.
    async fn update<R>(&self, f: impl FnOnce(&mut Session) -> R) -> R {
        let mut session = self.session.lock().await;
        let result = f(&mut session);
        if let Err(e) = self.store.save(&session).await {
            self.logger.log_warning(&format!("failed to save session record: {e}"));
        }
        result
    }

    async fn read<R>(&self, f: impl FnOnce(&Session) -> R) -> R {
        f(&*self.session.lock().await)
    }
}

#[async_trait]
impl TaskSink for SessionTracker {
    async fn record(&self, task: &GenerationTask) {
        self.update(|session| {
            if let Some(slot) = session.task_mut(task.segment_index, &task.task_id) {
                *slot = task.clone();
            }
        })
        .await;

        if !task.is_terminal() && task.attempts > 0 {
            self.events.send(SessionEvent::TaskPolled {
                segment: task.segment_index,
                task_id: task.task_id.clone(),
                attempt: task.attempts,
                max_attempts: self.max_attempts,
            });
        }
    }
}

/// Drives sessions end to end.
pub struct SessionRunner {
    config: WorkerConfig,
    planner: SegmentPlanner,
    orchestrator: GenerationTaskOrchestrator,
    references: ReferenceImageProvider,
    toolkit: Arc<dyn EncodingToolkit>,
    continuity: ContinuityExtractor,
    store: SessionStore,
}

impl SessionRunner {
    pub fn new(
        config: WorkerConfig,
        video: Arc<dyn VideoGenerationService>,
        images: Arc<dyn ImageGenerationService>,
        downloader: Arc<dyn ArtifactDownloader>,
        objects: Arc<dyn ObjectStore>,
        toolkit: Arc<dyn EncodingToolkit>,
    ) -> Self {
        let orchestrator =
            GenerationTaskOrchestrator::new(video, downloader.clone(), OrchestratorSettings::from(&config));
        let references = ReferenceImageProvider::new(
            images,
            downloader,
            objects,
            config.presenter.description.clone(),
            config.reference_ttl,
            config.work_dir.join("scratch"),
        );
        Self {
            planner: SegmentPlanner::new(config.presenter.clone()),
            continuity: ContinuityExtractor::new(toolkit.clone(), config.frames_dir()),
            store: SessionStore::new(config.sessions_dir()),
            orchestrator,
            references,
            toolkit,
            config,
        }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Build and validate a plan. No external call is made.
    pub fn create_plan(
        &self,
        content_type: &str,
        script: Option<&Script>,
        preset: DurationPreset,
        options: &PlanOptions,
    ) -> WorkerResult<GenerationPlan> {
        Ok(self.planner.plan(content_type, script, preset, options)?)
    }

    pub async fn get_session(&self, session_id: &SessionId) -> WorkerResult<Session> {
        self.store.load(session_id).await
    }

    /// Delete continuity frames older than the configured age.
    pub async fn purge_frames(&self) -> usize {
        self.continuity.purge_older_than(self.config.frame_max_age).await
    }

    /// Run a new session for `plan`.
    ///
    /// Generation outcomes are reported through the returned session
    /// (`Session::outcome`); `Err` is reserved for validation and local
    /// failures that prevent the session from being recorded.
    pub async fn run_session(
        &self,
        plan: GenerationPlan,
        events: Option<mpsc::UnboundedSender<SessionEvent>>,
        abort: watch::Receiver<bool>,
    ) -> WorkerResult<Session> {
        DialogueValidator::default().validate_plan(&plan)?;

        let session = Session::new(plan);
        self.store.create_dir(&session.session_id).await?;
        self.store.save(&session).await?;
        self.drive(session, Events(events), abort, "run_session").await
    }

    /// Continue a recorded session from its last completed stage.
    pub async fn resume_session(
        &self,
        session_id: &SessionId,
        events: Option<mpsc::UnboundedSender<SessionEvent>>,
        abort: watch::Receiver<bool>,
    ) -> WorkerResult<Session> {
        let mut session = self.store.load(session_id).await?;
        if session.is_finalized() {
            return Err(WorkerError::SessionFinalized(session_id.to_string()));
        }
        session.error_message = None;
        self.drive(session, Events(events), abort, "resume_session").await
    }

    async fn drive(
        &self,
        mut session: Session,
        events: Events,
        abort: watch::Receiver<bool>,
        operation: &str,
    ) -> WorkerResult<Session> {
        let started = Instant::now();
        let logger = SessionLogger::new(&session.session_id, operation);
        let span = logger.create_span();

        session.set_status(SessionStatus::Generating);
        let session_id = session.session_id.clone();
        events.send(SessionEvent::started(session_id.clone(), session.plan.len()));
        logger.log_start(&format!(
            "{} segments, pattern {}, identity {}",
            session.plan.len(),
            session.plan.pattern,
            session.plan.character.index
        ));

        let tracker = SessionTracker {
            session: Mutex::new(session),
            store: self.store.clone(),
            events,
            max_attempts: self.config.max_poll_attempts,
            logger: logger.clone(),
        };
        tracker.update(|_| ()).await;

        async {
            self.generate_segments(&tracker, &abort).await;
            if !*abort.borrow() {
                self.finish_media(&tracker).await;
            }
        }
        .instrument(span)
        .await;

        let mut session = tracker.session.into_inner();
        if *abort.borrow() && !session.is_finalized() {
            session.set_status(SessionStatus::Aborted);
            logger.log_warning("aborted; submitted jobs were left running");
        }
        self.store.save(&session).await?;

        let outcome = session.outcome();
        metrics::record_session(&outcome, started.elapsed().as_secs_f64());
        tracker
            .events
            .send(SessionEvent::finished(session_id, outcome));
        logger.log_completion(session.status.as_str());
        Ok(session)
    }

    /// Segments still lacking a clip on disk.
    fn segments_to_generate(&self, session: &Session) -> Vec<usize> {
        session
            .plan
            .segments
            .iter()
            .map(|s| s.index)
            .filter(|i| {
                !session
                    .latest_task(*i)
                    .filter(|t| t.is_complete())
                    .and_then(|t| t.local_path.as_ref())
                    .is_some_and(|p| p.is_file())
            })
            .collect()
    }

    async fn generate_segments(&self, tracker: &SessionTracker, abort: &watch::Receiver<bool>) {
        let (plan, pending) = tracker
            .read(|s| (s.plan.clone(), self.segments_to_generate(s)))
            .await;
        if pending.is_empty() {
            return;
        }
        tracker
            .logger
            .log_progress(&format!("generating segments {pending:?}"));

        if plan.reference_mode.is_sequential() {
            for index in pending {
                if *abort.borrow() {
                    break;
                }
                let spec = &plan.segments[index];
                if let Err(e) = self.process_segment(tracker, &plan, spec, abort.clone()).await {
                    debug!(segment = index, "Segment not generated: {}", e);
                }
            }
        } else {
            let futures = pending.iter().map(|index| {
                let spec = &plan.segments[*index];
                self.process_segment(tracker, &plan, spec, abort.clone())
            });
            for (index, result) in pending.iter().zip(join_all(futures).await) {
                if let Err(e) = result {
                    debug!(segment = index, "Segment not generated: {}", e);
                }
            }
        }
    }

    /// Reference, submit, poll, download for one segment. Failures are
    /// recorded on the session before being returned.
    async fn process_segment(
        &self,
        tracker: &SessionTracker,
        plan: &GenerationPlan,
        spec: &SegmentSpec,
        mut abort: watch::Receiver<bool>,
    ) -> WorkerResult<PathBuf> {
        let session_id = tracker.read(|s| s.session_id.clone()).await;
        let dest = self.store.session_dir(&session_id).join(spec.clip_file_name());

        if let Some(path) = self.recover_download(tracker, spec, &dest).await {
            return Ok(path);
        }
        if *abort.borrow() {
            return Err(WorkerError::Aborted);
        }

        let in_flight = tracker
            .read(|s| s.latest_task(spec.index).filter(|t| !t.is_terminal()).cloned())
            .await;
        let mut task = match in_flight {
            // Still running remotely: poll it again, never resubmit
            Some(task) => {
                tracker.logger.log_progress(&format!(
                    "re-polling in-flight task {} for segment {} after {} polls",
                    task.task_id, spec.index, task.attempts
                ));
                task
            }
            None => self.submit_segment(tracker, plan, &session_id, spec).await?,
        };

        let result_url = match self
            .orchestrator
            .await_completion(&mut task, &mut abort, tracker)
            .await
        {
            Ok(url) => url,
            Err(WorkerError::GenerationTimeout { task_id, attempts }) => {
                tracker.events.send(SessionEvent::TaskTimedOut {
                    segment: spec.index,
                    role: spec.role,
                    attempts,
                });
                return Err(WorkerError::GenerationTimeout { task_id, attempts });
            }
            Err(e) => {
                if !matches!(e, WorkerError::Aborted) {
                    tracker.events.send(SessionEvent::TaskFailed {
                        segment: spec.index,
                        role: spec.role,
                        reason: e.to_string(),
                    });
                }
                return Err(e);
            }
        };

        self.download_clip(tracker, spec, &task, &result_url, &dest).await
    }

    /// Resolve the reference and submit a fresh task for `spec`.
    async fn submit_segment(
        &self,
        tracker: &SessionTracker,
        plan: &GenerationPlan,
        session_id: &SessionId,
        spec: &SegmentSpec,
    ) -> WorkerResult<GenerationTask> {
        let image_url = match self.resolve_reference(tracker, session_id, spec).await {
            Ok(url) => url,
            Err(e) => return Err(self.record_failure(tracker, spec, e).await),
        };

        let task = match self
            .orchestrator
            .submit(spec, Some(image_url.as_str()), plan.aspect_ratio)
            .await
        {
            Ok(task) => task,
            Err(e) => return Err(self.record_failure(tracker, spec, e).await),
        };
        tracker.update(|s| s.push_task(task.clone())).await;
        tracker.events.send(SessionEvent::TaskSubmitted {
            segment: spec.index,
            role: spec.role,
            task_id: task.task_id.clone(),
        });
        Ok(task)
    }

    /// A succeeded task whose clip never landed is downloaded again instead
    /// of regenerated.
    async fn recover_download(
        &self,
        tracker: &SessionTracker,
        spec: &SegmentSpec,
        dest: &Path,
    ) -> Option<PathBuf> {
        let task = tracker
            .read(|s| s.latest_task(spec.index).cloned())
            .await
            .filter(|t| t.status == TaskStatus::Succeeded)?;
        let url = task.result_url.clone()?;
        match self.download_clip(tracker, spec, &task, &url, dest).await {
            Ok(path) => Some(path),
            Err(e) => {
                warn!(segment = spec.index, "Re-download failed, regenerating: {}", e);
                None
            }
        }
    }

    async fn download_clip(
        &self,
        tracker: &SessionTracker,
        spec: &SegmentSpec,
        task: &GenerationTask,
        url: &str,
        dest: &Path,
    ) -> WorkerResult<PathBuf> {
        if let Err(e) = self.orchestrator.download(url, dest).await {
            return Err(self.record_failure(tracker, spec, e).await);
        }

        let mut task = task.clone();
        task.set_local_path(dest);
        tracker.record(&task).await;
        tracker.events.send(SessionEvent::TaskSucceeded {
            segment: spec.index,
            role: spec.role,
            local_path: dest.to_path_buf(),
        });
        Ok(dest.to_path_buf())
    }

    async fn record_failure(&self, tracker: &SessionTracker, spec: &SegmentSpec, error: WorkerError) -> WorkerError {
        if matches!(error, WorkerError::Aborted) {
            return error;
        }
        let message = error.to_string();
        tracker
            .update(|s| s.record_submission_failure(spec.index, spec.role, message.clone()))
            .await;
        tracker.events.send(SessionEvent::TaskFailed {
            segment: spec.index,
            role: spec.role,
            reason: message,
        });
        error
    }

    /// Signed URL of the reference image handed to the video service.
    async fn resolve_reference(
        &self,
        tracker: &SessionTracker,
        session_id: &SessionId,
        spec: &SegmentSpec,
    ) -> WorkerResult<String> {
        match &spec.reference {
            ReferenceSource::Fixed { storage_key } => Ok(self.references.sign_stored(storage_key).await?.url),
            ReferenceSource::Generated => {
                let existing = tracker.read(|s| s.references.get(&spec.index).cloned()).await;
                if let Some(image) =
                    ReferenceImageProvider::reusable(existing.as_ref(), self.config.reference_margin)
                {
                    return Ok(image.persisted_url.clone());
                }

                let image = self.references.generate(session_id, spec).await?;
                let url = image.persisted_url.clone();
                tracker.events.send(SessionEvent::ReferenceReady {
                    segment: spec.index,
                    role: spec.role,
                    expires_at: image.expires_at,
                });
                tracker.update(|s| s.record_reference(image)).await;
                Ok(url)
            }
            ReferenceSource::PreviousFrame => {
                let previous = spec
                    .index
                    .checked_sub(1)
                    .ok_or_else(|| WorkerError::reference_failed("first segment has no previous clip"))?;
                let clip = tracker
                    .read(|s| {
                        s.latest_task(previous)
                            .filter(|t| t.is_complete())
                            .and_then(|t| t.local_path.clone())
                    })
                    .await
                    .filter(|p| p.is_file())
                    .ok_or_else(|| {
                        WorkerError::reference_failed(format!("clip for segment {previous} unavailable"))
                    })?;

                let frame = self
                    .continuity
                    .scoped(session_id.as_str())
                    .extract_last_frame(&clip)
                    .await?;
                let signed = self.references.persist_frame(session_id, spec.index, &frame).await?;
                tracker.events.send(SessionEvent::ReferenceReady {
                    segment: spec.index,
                    role: spec.role,
                    expires_at: signed.expires_at,
                });
                Ok(signed.url)
            }
        }
    }

    /// Assembly and captions, once every segment is terminal.
    async fn finish_media(&self, tracker: &SessionTracker) {
        let result = tracker.read(Session::generation_result).await;
        if result != SessionStatus::Assembling {
            tracker.update(|s| s.set_status(result)).await;
            tracker
                .logger
                .log_warning(&format!("generation ended {}", result.as_str()));
            return;
        }

        let (session_id, clips, recorded_assembly, dialogue) = tracker
            .read(|s| {
                (
                    s.session_id.clone(),
                    s.completed_clips(),
                    s.assembled_path.clone(),
                    s.plan.full_dialogue(),
                )
            })
            .await;

        let assembled = match recorded_assembly.filter(|p| p.is_file()) {
            Some(path) => {
                tracker.logger.log_progress("reusing assembled file");
                path
            }
            None => match self.assemble(tracker, &session_id, clips).await {
                Some(path) => path,
                None => return,
            },
        };

        tracker.update(|s| s.set_status(SessionStatus::Captioning)).await;
        let captions = CaptionSynchronizer::new(self.toolkit.clone(), self.caption_style())
            .with_words_per_second(self.config.words_per_second);
        let final_path = self.store.final_path(&session_id);

        match captions.synchronize(&assembled, &dialogue, &final_path).await {
            Ok(track) => {
                tracker.events.send(SessionEvent::CaptionsCompleted {
                    path: track.output.clone(),
                    word_count: track.words.len(),
                });
                tracker.update(|s| s.finalize(track.output)).await;
            }
            Err(e) => {
                tracker.logger.log_error(&format!("captioning failed: {e}"));
                tracker
                    .update(|s| s.fail_with(SessionStatus::AssemblyFailed, format!("captioning failed: {e}")))
                    .await;
            }
        }
    }

    async fn assemble(
        &self,
        tracker: &SessionTracker,
        session_id: &SessionId,
        clips: Vec<(usize, Role, PathBuf)>,
    ) -> Option<PathBuf> {
        tracker.update(|s| s.set_status(SessionStatus::Assembling)).await;
        tracker
            .events
            .send(SessionEvent::AssemblyStarted { clip_count: clips.len() });

        let clips = clips
            .into_iter()
            .map(|(index, role, path)| SegmentClip::new(index, role, path))
            .collect();
        let assembler = SegmentAssembler::new(self.toolkit.clone(), self.assembly_options());
        let output = self.store.assembled_path(session_id);

        match assembler.assemble(clips, &output).await {
            Ok(report) => {
                tracker.events.send(SessionEvent::AssemblyCompleted {
                    path: report.output.clone(),
                    duration_sec: report.duration_secs,
                });
                tracker.update(|s| s.set_assembled(report.output.clone())).await;
                Some(report.output)
            }
            Err(e) => {
                tracker.logger.log_error(&format!("assembly failed: {e}"));
                tracker
                    .update(|s| s.fail_with(SessionStatus::AssemblyFailed, e.to_string()))
                    .await;
                None
            }
        }
    }

    fn assembly_options(&self) -> AssemblyOptions {
        AssemblyOptions {
            transition: self.config.transition,
            outro: self.config.outro_path.as_ref().map(|path| OutroSpec {
                path: path.clone(),
                freeze_secs: self.config.freeze_secs,
            }),
        }
    }

    fn caption_style(&self) -> CaptionStyle {
        match self.config.caption_font_path() {
            Some(font) => CaptionStyle::default().with_font_file(font),
            None => {
                warn!("No bold caption font found; set REELGEN_CAPTION_FONT");
                CaptionStyle::default()
            }
        }
    }
}
