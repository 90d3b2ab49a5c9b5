//! Pipeline configuration.

use std::path::PathBuf;
use std::time::Duration;

use scenecraft_models::{EncodingConfig, OutputMode};

use crate::error::{PipelineError, PipelineResult};

/// Pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Root for per-job working directories
    pub work_dir: PathBuf,
    /// Where final artifacts are written
    pub output_dir: PathBuf,
    /// Maximum scenes rendering in parallel within a single job
    pub max_scene_parallel: usize,
    /// Kill any single FFmpeg process running longer than this
    pub ffmpeg_timeout: Option<Duration>,
    /// Delivery mode for jobs that don't specify one
    pub output_mode: OutputMode,
    /// Leave the job working directory in place after the job finishes
    pub keep_intermediates: bool,
    /// Base URL under which the output directory is served
    pub public_base_url: Option<String>,
    /// x264 CRF of every encode
    pub video_crf: u8,
    /// x264 preset of every encode
    pub video_preset: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("./temp"),
            output_dir: PathBuf::from("./output"),
            max_scene_parallel: 4,
            ffmpeg_timeout: None,
            output_mode: OutputMode::Timeline,
            keep_intermediates: false,
            public_base_url: None,
            video_crf: 23,
            video_preset: "medium".to_string(),
        }
    }
}

impl PipelineConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create config from an arbitrary key lookup, falling back to defaults
    /// for missing or unparsable values.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        Self {
            work_dir: lookup("SCENECRAFT_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.work_dir),
            output_dir: lookup("SCENECRAFT_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.output_dir),
            max_scene_parallel: lookup("SCENECRAFT_MAX_SCENE_PARALLEL")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_scene_parallel),
            ffmpeg_timeout: lookup("SCENECRAFT_FFMPEG_TIMEOUT_SECS")
                .and_then(|s| s.parse::<u64>().ok())
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
            output_mode: lookup("SCENECRAFT_OUTPUT_MODE")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.output_mode),
            keep_intermediates: lookup("SCENECRAFT_KEEP_INTERMEDIATES")
                .map(|s| matches!(s.trim().to_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(defaults.keep_intermediates),
            public_base_url: lookup("SCENECRAFT_PUBLIC_BASE_URL").filter(|s| !s.trim().is_empty()),
            video_crf: lookup("SCENECRAFT_VIDEO_CRF")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.video_crf),
            video_preset: lookup("SCENECRAFT_VIDEO_PRESET").unwrap_or(defaults.video_preset),
        }
    }

    /// Reject configurations the pipeline cannot run with.
    pub fn validate(&self) -> PipelineResult<()> {
        if self.max_scene_parallel == 0 {
            return Err(PipelineError::config_error(
                "max_scene_parallel must be at least 1",
            ));
        }

        if self.video_crf > 51 {
            return Err(PipelineError::config_error(format!(
                "video_crf {} is outside 0..=51",
                self.video_crf
            )));
        }

        if self.work_dir == self.output_dir {
            return Err(PipelineError::config_error(
                "work_dir and output_dir must differ",
            ));
        }

        self.public_url()?;
        Ok(())
    }

    /// Parsed public base URL, normalized to end with `/`.
    pub fn public_url(&self) -> PipelineResult<Option<url::Url>> {
        let Some(base) = &self.public_base_url else {
            return Ok(None);
        };

        let mut base = base.trim().to_string();
        if !base.ends_with('/') {
            base.push('/');
        }

        url::Url::parse(&base)
            .map(Some)
            .map_err(|e| PipelineError::config_error(format!("invalid public base URL: {}", e)))
    }

    /// Encoding profile with the configured overrides applied.
    pub fn encoding(&self) -> EncodingConfig {
        EncodingConfig::default()
            .with_crf(self.video_crf)
            .with_preset(self.video_preset.clone())
    }

    /// Per-process timeout in whole seconds.
    pub fn ffmpeg_timeout_secs(&self) -> Option<u64> {
        self.ffmpeg_timeout.map(|d| d.as_secs().max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_pairs(pairs: &[(&str, &str)]) -> PipelineConfig {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        PipelineConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = from_pairs(&[]);
        assert_eq!(config.work_dir, PathBuf::from("./temp"));
        assert_eq!(config.output_dir, PathBuf::from("./output"));
        assert_eq!(config.max_scene_parallel, 4);
        assert_eq!(config.output_mode, OutputMode::Timeline);
        assert!(config.ffmpeg_timeout.is_none());
        assert!(!config.keep_intermediates);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_overrides() {
        let config = from_pairs(&[
            ("SCENECRAFT_WORK_DIR", "/scratch"),
            ("SCENECRAFT_MAX_SCENE_PARALLEL", "8"),
            ("SCENECRAFT_FFMPEG_TIMEOUT_SECS", "600"),
            ("SCENECRAFT_OUTPUT_MODE", "scene-clips"),
            ("SCENECRAFT_KEEP_INTERMEDIATES", "true"),
            ("SCENECRAFT_VIDEO_CRF", "20"),
        ]);
        assert_eq!(config.work_dir, PathBuf::from("/scratch"));
        assert_eq!(config.max_scene_parallel, 8);
        assert_eq!(config.ffmpeg_timeout_secs(), Some(600));
        assert_eq!(config.output_mode, OutputMode::SceneClips);
        assert!(config.keep_intermediates);
        assert_eq!(config.encoding().crf, 20);
    }

    #[test]
    fn test_unparsable_values_fall_back() {
        let config = from_pairs(&[
            ("SCENECRAFT_MAX_SCENE_PARALLEL", "many"),
            ("SCENECRAFT_OUTPUT_MODE", "slideshow"),
        ]);
        assert_eq!(config.max_scene_parallel, 4);
        assert_eq!(config.output_mode, OutputMode::Timeline);
    }

    #[test]
    fn test_validation() {
        let zero = PipelineConfig {
            max_scene_parallel: 0,
            ..Default::default()
        };
        assert!(matches!(zero.validate(), Err(PipelineError::Config(_))));

        let same_dirs = PipelineConfig {
            output_dir: PathBuf::from("./temp"),
            ..Default::default()
        };
        assert!(same_dirs.validate().is_err());

        let bad_url = PipelineConfig {
            public_base_url: Some("not a url".to_string()),
            ..Default::default()
        };
        assert!(bad_url.validate().is_err());
    }

    #[test]
    fn test_public_url_gets_trailing_slash() {
        let config = PipelineConfig {
            public_base_url: Some("http://localhost:3000/media".to_string()),
            ..Default::default()
        };
        let url = config.public_url().unwrap().unwrap();
        assert_eq!(url.as_str(), "http://localhost:3000/media/");
    }
}
