//! Reel generation worker.
//!
//! This crate provides:
//! - Segment planning: dialogue templates, cinematography patterns, prompts
//! - Reference image provisioning (fixed identity, per segment, continuity)
//! - Generation task submission and polling with bounded retries
//! - Session records with resume from the last completed stage
//! - Assembly and caption burn-in through `reelgen-media`

pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod orchestrator;
pub mod pipeline;
pub mod planner;
pub mod reference;
pub mod retry;
pub mod session_store;

pub use config::{PresenterConfig, WorkerConfig};
pub use error::{PlanError, WorkerError, WorkerResult};
pub use logging::SessionLogger;
pub use orchestrator::{GenerationTaskOrchestrator, OrchestratorSettings, TaskSink};
pub use pipeline::SessionRunner;
pub use planner::{DialogueValidator, PlanOptions, SegmentPlanner};
pub use reference::ReferenceImageProvider;
pub use session_store::SessionStore;
