//! Scene composition worker.
//!
//! This crate provides:
//! - The pipeline orchestrator (per-scene fan-out, timeline or clip delivery)
//! - Per-job working directories and their cleanup
//! - Environment configuration, structured job logging and metrics

pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod orchestrator;
pub mod workspace;

pub use config::PipelineConfig;
pub use error::{PipelineError, PipelineResult};
pub use logging::JobLogger;
pub use orchestrator::{deliver_clips, ScenePipeline};
pub use workspace::JobWorkspace;
