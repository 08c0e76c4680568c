//! Session: the durable record of one plan's execution.
//!
//! The record is written to disk on every transition so a crashed run can be
//! resumed from the last completed stage. Tasks are only appended; a retried
//! segment gets a new task and the latest task per segment is authoritative.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

use crate::plan::GenerationPlan;
use crate::reference::ReferenceImage;
use crate::script::Role;
use crate::task::{GenerationTask, TaskStatus};

/// Unique identifier for a session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Session lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    Pending,
    Generating,
    /// Some segments succeeded, at least one failed or timed out
    PartiallyFailed,
    /// No segment succeeded
    Failed,
    Aborted,
    Assembling,
    AssemblyFailed,
    Captioning,
    Completed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Pending => "pending",
            SessionStatus::Generating => "generating",
            SessionStatus::PartiallyFailed => "partially_failed",
            SessionStatus::Failed => "failed",
            SessionStatus::Aborted => "aborted",
            SessionStatus::Assembling => "assembling",
            SessionStatus::AssemblyFailed => "assembly_failed",
            SessionStatus::Captioning => "captioning",
            SessionStatus::Completed => "completed",
        }
    }

    /// Whether the run has stopped (successfully or not).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionStatus::PartiallyFailed
                | SessionStatus::Failed
                | SessionStatus::Aborted
                | SessionStatus::AssemblyFailed
                | SessionStatus::Completed
        )
    }

    /// Whether a later run may pick this session up again.
    pub fn is_resumable(&self) -> bool {
        !matches!(self, SessionStatus::Completed)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Submission that never produced a remote task id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionFailure {
    pub segment_index: usize,
    pub role: Role,
    pub message: String,
    pub at: DateTime<Utc>,
}

/// Caller-facing result of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SessionOutcome {
    Success {
        final_path: PathBuf,
    },
    GenerationTimeout {
        segment_index: usize,
        role: Role,
        attempts: u32,
    },
    GenerationFailed {
        segment_index: usize,
        role: Role,
        reason: String,
    },
    AssemblyError {
        message: String,
    },
    Aborted,
    InProgress,
}

/// Durable record of one plan's execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub session_id: SessionId,
    pub plan: GenerationPlan,
    pub status: SessionStatus,
    #[serde(default)]
    pub tasks: Vec<GenerationTask>,
    /// Reference images by segment index
    #[serde(default)]
    pub references: BTreeMap<usize, ReferenceImage>,
    #[serde(default)]
    pub submission_failures: Vec<SubmissionFailure>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assembled_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn new(plan: GenerationPlan) -> Self {
        Self::with_id(SessionId::new(), plan)
    }

    pub fn with_id(session_id: SessionId, plan: GenerationPlan) -> Self {
        let now = Utc::now();
        Self {
            session_id,
            plan,
            status: SessionStatus::Pending,
            tasks: Vec::new(),
            references: BTreeMap::new(),
            submission_failures: Vec::new(),
            assembled_path: None,
            final_path: None,
            error_message: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    /// Final artifact recorded; the record is history from here on.
    pub fn is_finalized(&self) -> bool {
        self.final_path.is_some()
    }

    pub fn set_status(&mut self, status: SessionStatus) {
        self.status = status;
        self.updated_at = Utc::now();
    }

    pub fn push_task(&mut self, task: GenerationTask) {
        self.tasks.push(task);
        self.updated_at = Utc::now();
    }

    /// Most recent task for a segment.
    pub fn latest_task(&self, segment_index: usize) -> Option<&GenerationTask> {
        self.tasks
            .iter()
            .rev()
            .find(|t| t.segment_index == segment_index)
    }

    /// Most recent task for a segment, matched by remote id as well.
    pub fn task_mut(&mut self, segment_index: usize, task_id: &str) -> Option<&mut GenerationTask> {
        self.tasks
            .iter_mut()
            .rev()
            .find(|t| t.segment_index == segment_index && t.task_id == task_id)
    }

    /// Segment succeeded and its clip is on disk (per the record).
    pub fn segment_complete(&self, segment_index: usize) -> bool {
        self.latest_task(segment_index)
            .is_some_and(GenerationTask::is_complete)
    }

    /// Segments that still need a (new) generation task.
    pub fn pending_segments(&self) -> Vec<usize> {
        (0..self.plan.len())
            .filter(|i| !self.segment_complete(*i))
            .collect()
    }

    pub fn record_reference(&mut self, image: ReferenceImage) {
        self.references.insert(image.segment_index, image);
        self.updated_at = Utc::now();
    }

    pub fn record_submission_failure(&mut self, segment_index: usize, role: Role, message: impl Into<String>) {
        self.submission_failures.push(SubmissionFailure {
            segment_index,
            role,
            message: message.into(),
            at: Utc::now(),
        });
        self.updated_at = Utc::now();
    }

    /// Downloaded clips in plan order. Missing segments are skipped.
    pub fn completed_clips(&self) -> Vec<(usize, Role, PathBuf)> {
        self.plan
            .segments
            .iter()
            .filter_map(|spec| {
                self.latest_task(spec.index)
                    .filter(|t| t.is_complete())
                    .and_then(|t| t.local_path.clone())
                    .map(|path| (spec.index, spec.role, path))
            })
            .collect()
    }

    /// Status after every segment reached a terminal state.
    pub fn generation_result(&self) -> SessionStatus {
        let succeeded = (0..self.plan.len())
            .filter(|i| self.segment_complete(*i))
            .count();
        if succeeded == self.plan.len() {
            SessionStatus::Assembling
        } else if succeeded == 0 {
            SessionStatus::Failed
        } else {
            SessionStatus::PartiallyFailed
        }
    }

    pub fn set_assembled(&mut self, path: impl Into<PathBuf>) {
        self.assembled_path = Some(path.into());
        self.updated_at = Utc::now();
    }

    /// Record the final artifact and close the session.
    pub fn finalize(&mut self, final_path: impl Into<PathBuf>) {
        let now = Utc::now();
        self.final_path = Some(final_path.into());
        self.status = SessionStatus::Completed;
        self.completed_at = Some(now);
        self.updated_at = now;
    }

    pub fn fail_with(&mut self, status: SessionStatus, message: impl Into<String>) {
        self.error_message = Some(message.into());
        self.set_status(status);
    }

    /// Caller-facing outcome, naming the first failing segment in plan order.
    pub fn outcome(&self) -> SessionOutcome {
        match self.status {
            SessionStatus::Completed => match &self.final_path {
                Some(path) => SessionOutcome::Success {
                    final_path: path.clone(),
                },
                None => SessionOutcome::InProgress,
            },
            SessionStatus::Aborted => SessionOutcome::Aborted,
            SessionStatus::AssemblyFailed => SessionOutcome::AssemblyError {
                message: self
                    .error_message
                    .clone()
                    .unwrap_or_else(|| "assembly failed".to_string()),
            },
            SessionStatus::PartiallyFailed | SessionStatus::Failed => self.failing_segment_outcome(),
            _ => SessionOutcome::InProgress,
        }
    }

    fn failing_segment_outcome(&self) -> SessionOutcome {
        for spec in &self.plan.segments {
            match self.latest_task(spec.index) {
                Some(task) if task.status == TaskStatus::TimedOut => {
                    return SessionOutcome::GenerationTimeout {
                        segment_index: spec.index,
                        role: spec.role,
                        attempts: task.attempts,
                    };
                }
                Some(task) if task.status == TaskStatus::Failed => {
                    return SessionOutcome::GenerationFailed {
                        segment_index: spec.index,
                        role: spec.role,
                        reason: task.error_message.clone().unwrap_or_default(),
                    };
                }
                Some(task) if task.is_complete() => {}
                _ => {
                    if let Some(failure) = self
                        .submission_failures
                        .iter()
                        .rev()
                        .find(|f| f.segment_index == spec.index)
                    {
                        return SessionOutcome::GenerationFailed {
                            segment_index: spec.index,
                            role: spec.role,
                            reason: failure.message.clone(),
                        };
                    }
                }
            }
        }
        SessionOutcome::GenerationFailed {
            segment_index: 0,
            role: self.plan.segments.first().map(|s| s.role).unwrap_or(Role::Intro),
            reason: self
                .error_message
                .clone()
                .unwrap_or_else(|| "generation failed".to_string()),
        }
    }
}
