//! Pipeline error types.

use thiserror::Error;

use scenecraft_media::MediaError;
use scenecraft_models::{DroppedScene, ModelError};

pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("No scenes rendered successfully ({} dropped)", .dropped.len())]
    NoRenderableScenes { dropped: Vec<DroppedScene> },

    #[error(transparent)]
    InvalidJob(#[from] ModelError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Whether the error ends the whole job.
    pub fn is_job_fatal(&self) -> bool {
        !self.is_scene_fatal()
    }

    /// Whether the error only drops the scene it happened in.
    pub fn is_scene_fatal(&self) -> bool {
        matches!(self, PipelineError::Media(e) if is_scene_fatal(e))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, PipelineError::Media(e) if e.is_cancelled())
    }

    /// Scenes dropped before the job failed, if any.
    pub fn dropped_scenes(&self) -> &[DroppedScene] {
        match self {
            PipelineError::NoRenderableScenes { dropped } => dropped,
            _ => &[],
        }
    }
}

/// Classify a media error raised while processing one scene.
///
/// Missing tooling and failed concatenation affect every scene alike;
/// everything else is confined to the scene that raised it.
pub fn is_scene_fatal(err: &MediaError) -> bool {
    !matches!(
        err,
        MediaError::FfmpegNotFound | MediaError::FfprobeNotFound | MediaError::ConcatenationFailed(_)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_scene_errors_are_not_job_fatal() {
        let missing = PipelineError::from(MediaError::MediaFileMissing(PathBuf::from("/m/a.jpg")));
        assert!(missing.is_scene_fatal());
        assert!(!missing.is_job_fatal());

        let render = PipelineError::from(MediaError::SceneRenderFailed {
            scene_number: 2,
            message: "encoder exited".to_string(),
        });
        assert!(render.is_scene_fatal());

        let timeout = PipelineError::from(MediaError::Timeout(600));
        assert!(timeout.is_scene_fatal());
    }

    #[test]
    fn test_job_fatal_errors() {
        assert!(PipelineError::from(MediaError::FfmpegNotFound).is_job_fatal());
        assert!(PipelineError::from(MediaError::ConcatenationFailed("x".into())).is_job_fatal());
        assert!(PipelineError::config_error("bad").is_job_fatal());
        assert!(PipelineError::NoRenderableScenes { dropped: vec![] }.is_job_fatal());
    }

    #[test]
    fn test_no_renderable_scenes_lists_dropped() {
        let err = PipelineError::NoRenderableScenes {
            dropped: vec![DroppedScene {
                scene_number: 3,
                reason: "Media file not found".to_string(),
            }],
        };
        assert_eq!(err.dropped_scenes().len(), 1);
        assert!(err.to_string().contains("1 dropped"));
    }
}
