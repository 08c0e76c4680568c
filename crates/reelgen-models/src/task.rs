//! Generation task state machine.
//!
//! A task tracks one submission of one segment to the video generation
//! service. Status only moves forward:
//!
//! ```text
//! pending -> processing -> { succeeded | failed | timed_out }
//! ```
//!
//! `pending` may also jump straight to a terminal state (the first poll can
//! already report success or failure).

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

use crate::script::Role;

/// Task status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Submitted, not yet reported as running
    #[default]
    Pending,
    /// Remote reported the job as running
    Processing,
    Succeeded,
    /// Remote explicitly reported failure
    Failed,
    /// Poll attempts exhausted without a terminal status
    TimedOut,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Processing => "processing",
            TaskStatus::Succeeded => "succeeded",
            TaskStatus::Failed => "failed",
            TaskStatus::TimedOut => "timed_out",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Succeeded | TaskStatus::Failed | TaskStatus::TimedOut
        )
    }

    fn rank(&self) -> u8 {
        match self {
            TaskStatus::Pending => 0,
            TaskStatus::Processing => 1,
            TaskStatus::Succeeded | TaskStatus::Failed | TaskStatus::TimedOut => 2,
        }
    }

    /// Whether `self -> next` is a legal transition.
    ///
    /// Staying in the same non-terminal state is allowed (repeated polls).
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        next.rank() >= self.rank()
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Illegal task transition {from} -> {to}")]
pub struct TransitionError {
    pub from: TaskStatus,
    pub to: TaskStatus,
}

/// One submission of one segment to the generation service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GenerationTask {
    /// Identifier assigned by the generation service
    pub task_id: String,
    pub segment_index: usize,
    pub role: Role,
    pub submitted_at: DateTime<Utc>,
    pub status: TaskStatus,
    /// Poll attempts made so far
    pub attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl GenerationTask {
    pub fn new(task_id: impl Into<String>, segment_index: usize, role: Role) -> Self {
        let now = Utc::now();
        Self {
            task_id: task_id.into(),
            segment_index,
            role,
            submitted_at: now,
            status: TaskStatus::Pending,
            attempts: 0,
            result_url: None,
            local_path: None,
            error_message: None,
            updated_at: now,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    fn transition(&mut self, next: TaskStatus) -> Result<(), TransitionError> {
        if !self.status.can_transition_to(next) {
            return Err(TransitionError {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Count one poll attempt and apply the non-terminal status it reported.
    pub fn record_poll(&mut self, reported: TaskStatus) -> Result<(), TransitionError> {
        self.attempts += 1;
        if reported.is_terminal() {
            self.updated_at = Utc::now();
            return Ok(());
        }
        self.transition(reported)
    }

    pub fn succeed(&mut self, result_url: impl Into<String>) -> Result<(), TransitionError> {
        self.transition(TaskStatus::Succeeded)?;
        self.result_url = Some(result_url.into());
        Ok(())
    }

    pub fn fail(&mut self, message: impl Into<String>) -> Result<(), TransitionError> {
        self.transition(TaskStatus::Failed)?;
        self.error_message = Some(message.into());
        Ok(())
    }

    pub fn time_out(&mut self) -> Result<(), TransitionError> {
        self.transition(TaskStatus::TimedOut)?;
        self.error_message = Some(format!("No terminal status after {} polls", self.attempts));
        Ok(())
    }

    /// Record where the downloaded artifact lives.
    pub fn set_local_path(&mut self, path: impl Into<PathBuf>) {
        self.local_path = Some(path.into());
        self.updated_at = Utc::now();
    }

    /// Succeeded and downloaded.
    pub fn is_complete(&self) -> bool {
        self.status == TaskStatus::Succeeded && self.local_path.is_some()
    }
}
