//! Error types for media operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur during media processing.
///
/// The first group are scene-level outcomes of the composition stages; the
/// rest describe the underlying tool or I/O failure.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("Invalid media duration for {path}: {reason}")]
    InvalidMediaDuration { path: PathBuf, reason: String },

    #[error("Media file missing: {0}")]
    MediaFileMissing(PathBuf),

    #[error("Audio normalization failed: {0}")]
    AudioNormalizationFailed(String),

    #[error("Scene {scene_number} render failed: {message}")]
    SceneRenderFailed { scene_number: u32, message: String },

    #[error("Concatenation failed: {0}")]
    ConcatenationFailed(String),

    #[error("FFmpeg not found in PATH")]
    FfmpegNotFound,

    #[error("FFprobe not found in PATH")]
    FfprobeNotFound,

    #[error("FFmpeg command failed: {message}")]
    FfmpegFailed {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("FFprobe command failed: {message}")]
    FfprobeFailed {
        message: String,
        stderr: Option<String>,
    },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl MediaError {
    /// Create an FFmpeg failure error.
    pub fn ffmpeg_failed(
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::FfmpegFailed {
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    pub fn invalid_duration(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::InvalidMediaDuration {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, MediaError::Cancelled)
    }

    /// Short, stable name of the error kind (used as a metrics label).
    pub fn kind(&self) -> &'static str {
        match self {
            MediaError::InvalidMediaDuration { .. } => "invalid_media_duration",
            MediaError::MediaFileMissing(_) => "media_file_missing",
            MediaError::AudioNormalizationFailed(_) => "audio_normalization_failed",
            MediaError::SceneRenderFailed { .. } => "scene_render_failed",
            MediaError::ConcatenationFailed(_) => "concatenation_failed",
            MediaError::FfmpegNotFound => "ffmpeg_not_found",
            MediaError::FfprobeNotFound => "ffprobe_not_found",
            MediaError::FfmpegFailed { .. } => "ffmpeg_failed",
            MediaError::FfprobeFailed { .. } => "ffprobe_failed",
            MediaError::Cancelled => "cancelled",
            MediaError::Timeout(_) => "timeout",
            MediaError::Io(_) => "io",
            MediaError::JsonParse(_) => "json_parse",
            MediaError::Internal(_) => "internal",
        }
    }

    /// Detail for logs: the message plus the tail of FFmpeg's stderr, if any.
    pub fn detail(&self) -> String {
        match self {
            MediaError::FfmpegFailed {
                stderr: Some(stderr),
                ..
            }
            | MediaError::FfprobeFailed {
                stderr: Some(stderr),
                ..
            } if !stderr.trim().is_empty() => format!("{} ({})", self, stderr.trim()),
            _ => self.to_string(),
        }
    }

    /// Re-label a tool failure as an audio normalization failure.
    pub(crate) fn into_normalization_failure(self) -> Self {
        match self {
            MediaError::Cancelled
            | MediaError::FfmpegNotFound
            | MediaError::AudioNormalizationFailed(_) => self,
            other => MediaError::AudioNormalizationFailed(other.detail()),
        }
    }

    /// Re-label a tool failure as a render failure of `scene_number`.
    pub(crate) fn into_render_failure(self, scene_number: u32) -> Self {
        match self {
            MediaError::Cancelled
            | MediaError::FfmpegNotFound
            | MediaError::MediaFileMissing(_)
            | MediaError::SceneRenderFailed { .. } => self,
            other => MediaError::SceneRenderFailed {
                scene_number,
                message: other.detail(),
            },
        }
    }

    /// Re-label a tool failure as a concatenation failure.
    pub(crate) fn into_concatenation_failure(self) -> Self {
        match self {
            MediaError::Cancelled
            | MediaError::FfmpegNotFound
            | MediaError::ConcatenationFailed(_) => self,
            other => MediaError::ConcatenationFailed(other.detail()),
        }
    }
}
