//! Validation errors raised while ingesting job descriptions.

use thiserror::Error;

/// Result type for model validation.
pub type ModelResult<T> = Result<T, ModelError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    #[error("Invalid job: {0}")]
    InvalidJob(String),

    #[error("Invalid scene {scene_number}: {reason}")]
    InvalidScene { scene_number: u32, reason: String },

    #[error("Invalid audio description: {0}")]
    InvalidAudio(String),

    #[error("Unknown output mode: {0}")]
    UnknownOutputMode(String),
}

impl ModelError {
    pub fn invalid_job(msg: impl Into<String>) -> Self {
        Self::InvalidJob(msg.into())
    }

    pub fn invalid_scene(scene_number: u32, reason: impl Into<String>) -> Self {
        Self::InvalidScene {
            scene_number,
            reason: reason.into(),
        }
    }
}
