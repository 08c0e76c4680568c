//! Prometheus metrics for the worker.

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

use reelgen_models::{SessionOutcome, TaskStatus};

use crate::error::{WorkerError, WorkerResult};

/// Metric names as constants for consistency.
pub mod names {
    pub const TASKS_SUBMITTED_TOTAL: &str = "reelgen_tasks_submitted_total";
    pub const TASKS_TERMINAL_TOTAL: &str = "reelgen_tasks_terminal_total";
    pub const POLL_ATTEMPTS_TOTAL: &str = "reelgen_poll_attempts_total";
    pub const DOWNLOAD_DURATION_SECONDS: &str = "reelgen_download_duration_seconds";
    pub const REFERENCES_GENERATED_TOTAL: &str = "reelgen_references_generated_total";
    pub const SESSIONS_TOTAL: &str = "reelgen_sessions_total";
    pub const SESSION_DURATION_SECONDS: &str = "reelgen_session_duration_seconds";
}

/// Install the Prometheus recorder with an HTTP scrape endpoint.
///
/// Must be called from within the tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> WorkerResult<()> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| WorkerError::config_error(format!("failed to install metrics recorder: {e}")))
}

pub fn record_task_submitted() {
    counter!(names::TASKS_SUBMITTED_TOTAL).increment(1);
}

pub fn record_task_terminal(status: TaskStatus) {
    counter!(names::TASKS_TERMINAL_TOTAL, "status" => status.as_str()).increment(1);
}

pub fn record_poll_attempt() {
    counter!(names::POLL_ATTEMPTS_TOTAL).increment(1);
}

pub fn record_download(duration_secs: f64) {
    histogram!(names::DOWNLOAD_DURATION_SECONDS).record(duration_secs);
}

pub fn record_reference_generated() {
    counter!(names::REFERENCES_GENERATED_TOTAL).increment(1);
}

pub fn record_session(outcome: &SessionOutcome, duration_secs: f64) {
    counter!(names::SESSIONS_TOTAL, "outcome" => outcome_label(outcome)).increment(1);
    histogram!(names::SESSION_DURATION_SECONDS).record(duration_secs);
}

fn outcome_label(outcome: &SessionOutcome) -> &'static str {
    match outcome {
        SessionOutcome::Success { .. } => "success",
        SessionOutcome::GenerationTimeout { .. } => "generation_timeout",
        SessionOutcome::GenerationFailed { .. } => "generation_failed",
        SessionOutcome::AssemblyError { .. } => "assembly_error",
        SessionOutcome::Aborted => "aborted",
        SessionOutcome::InProgress => "in_progress",
    }
}
