//! Shared data models for the SceneCraft composition pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Scenes as supplied by the script, media and narration collaborators
//! - Jobs, job ingestion and job lifecycle states
//! - The canonical encoding profile shared by every rendered clip
//! - Per-job reports (rendered clips, dropped scenes, duration checks)

pub mod encoding;
pub mod error;
pub mod job;
pub mod report;
pub mod scene;

// Re-export common types
pub use encoding::{EncodingConfig, LoudnessTarget};
pub use error::{ModelError, ModelResult};
pub use job::{Job, JobId, JobRequest, JobState, OutputMode};
pub use report::{DroppedScene, DurationCheck, JobReport, RenderedScene, SceneClip, TimelineArtifact};
pub use scene::{MediaKind, ResolvedDurations, Scene, SceneAudio, SceneMedia, DEFAULT_IMAGE_DURATION_SECS};
