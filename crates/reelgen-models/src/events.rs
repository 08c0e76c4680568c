//! Progress events emitted while a session runs.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::script::Role;
use crate::session::{SessionId, SessionOutcome};

/// Session progress event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    SessionStarted {
        #[serde(rename = "sessionId")]
        session_id: SessionId,
        #[serde(rename = "segmentCount")]
        segment_count: usize,
        timestamp: DateTime<Utc>,
    },

    /// Reference image persisted and signed for a segment
    ReferenceReady {
        segment: usize,
        role: Role,
        #[serde(rename = "expiresAt")]
        expires_at: DateTime<Utc>,
    },

    TaskSubmitted {
        segment: usize,
        role: Role,
        #[serde(rename = "taskId")]
        task_id: String,
    },

    /// One poll completed without a terminal status
    TaskPolled {
        segment: usize,
        #[serde(rename = "taskId")]
        task_id: String,
        attempt: u32,
        #[serde(rename = "maxAttempts")]
        max_attempts: u32,
    },

    TaskSucceeded {
        segment: usize,
        role: Role,
        #[serde(rename = "localPath")]
        local_path: PathBuf,
    },

    TaskFailed {
        segment: usize,
        role: Role,
        reason: String,
    },

    TaskTimedOut {
        segment: usize,
        role: Role,
        attempts: u32,
    },

    AssemblyStarted {
        #[serde(rename = "clipCount")]
        clip_count: usize,
    },

    AssemblyCompleted {
        path: PathBuf,
        #[serde(rename = "durationSec")]
        duration_sec: f64,
    },

    CaptionsCompleted {
        path: PathBuf,
        #[serde(rename = "wordCount")]
        word_count: usize,
    },

    SessionFinished {
        #[serde(rename = "sessionId")]
        session_id: SessionId,
        outcome: SessionOutcome,
        timestamp: DateTime<Utc>,
    },
}

impl SessionEvent {
    pub fn started(session_id: SessionId, segment_count: usize) -> Self {
        SessionEvent::SessionStarted {
            session_id,
            segment_count,
            timestamp: Utc::now(),
        }
    }

    pub fn finished(session_id: SessionId, outcome: SessionOutcome) -> Self {
        SessionEvent::SessionFinished {
            session_id,
            outcome,
            timestamp: Utc::now(),
        }
    }

    /// Segment the event refers to, if any.
    pub fn segment(&self) -> Option<usize> {
        match self {
            SessionEvent::ReferenceReady { segment, .. }
            | SessionEvent::TaskSubmitted { segment, .. }
            | SessionEvent::TaskPolled { segment, .. }
            | SessionEvent::TaskSucceeded { segment, .. }
            | SessionEvent::TaskFailed { segment, .. }
            | SessionEvent::TaskTimedOut { segment, .. } => Some(*segment),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_tagging() {
        let event = SessionEvent::TaskPolled {
            segment: 2,
            task_id: "abc".into(),
            attempt: 4,
            max_attempts: 30,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "task_polled");
        assert_eq!(json["taskId"], "abc");
        assert_eq!(json["maxAttempts"], 30);
        assert_eq!(event.segment(), Some(2));
    }

    #[test]
    fn test_finished_carries_outcome() {
        let event = SessionEvent::finished(SessionId::from_string("s-1"), SessionOutcome::Aborted);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "session_finished");
        assert_eq!(json["outcome"]["outcome"], "aborted");
        assert_eq!(event.segment(), None);
    }
}
