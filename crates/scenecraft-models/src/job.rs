//! Job definitions.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{ModelError, ModelResult};
use crate::scene::Scene;

/// Unique identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle of a composition job.
///
/// `Created -> Rendering -> Concatenating -> Completed | PartiallyFailed`,
/// or `Created -> Rendering -> Failed` when no scene renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    #[default]
    Created,
    Rendering,
    Concatenating,
    /// Every scene rendered
    Completed,
    /// Some scenes were dropped; the artifact covers the rest
    PartiallyFailed,
    Failed,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Created => "created",
            JobState::Rendering => "rendering",
            JobState::Concatenating => "concatenating",
            JobState::Completed => "completed",
            JobState::PartiallyFailed => "partially_failed",
            JobState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Completed | JobState::PartiallyFailed | JobState::Failed
        )
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a job delivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum OutputMode {
    /// One concatenated video for the whole job
    #[default]
    Timeline,
    /// Individual scene clips, e.g. for an editor preview
    SceneClips,
}

impl OutputMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputMode::Timeline => "timeline",
            OutputMode::SceneClips => "scene_clips",
        }
    }
}

impl fmt::Display for OutputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputMode {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "timeline" | "concat" => Ok(OutputMode::Timeline),
            "scene_clips" | "clips" => Ok(OutputMode::SceneClips),
            other => Err(ModelError::UnknownOutputMode(other.to_string())),
        }
    }
}

/// Job description as submitted by the API layer.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct JobRequest {
    /// Scenes in any order; `sceneNumber` defines the timeline order
    pub scenes: Vec<Scene>,

    /// Base name of the final artifact (without extension)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_name: Option<String>,

    /// Delivery mode; the pipeline default applies when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<OutputMode>,
}

/// A validated composition job.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: JobId,

    /// Scenes sorted by ascending scene number
    pub scenes: Vec<Scene>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<OutputMode>,

    pub created_at: DateTime<Utc>,
}

impl Job {
    /// Validate a request and turn it into a job.
    pub fn from_request(request: JobRequest) -> ModelResult<Self> {
        let JobRequest {
            mut scenes,
            output_name,
            mode,
        } = request;

        if scenes.is_empty() {
            return Err(ModelError::invalid_job("a job needs at least one scene"));
        }

        let mut seen = HashSet::with_capacity(scenes.len());
        for scene in &scenes {
            scene.validate()?;
            if !seen.insert(scene.scene_number) {
                return Err(ModelError::invalid_job(format!(
                    "duplicate scene number {}",
                    scene.scene_number
                )));
            }
        }

        if let Some(name) = &output_name {
            if sanitize_file_stem(name).is_empty() {
                return Err(ModelError::invalid_job(format!(
                    "output name {:?} has no usable characters",
                    name
                )));
            }
        }

        scenes.sort_by_key(|s| s.scene_number);

        Ok(Self {
            id: JobId::new(),
            scenes,
            output_name,
            mode,
            created_at: Utc::now(),
        })
    }

    /// Build a job directly from scenes.
    pub fn new(scenes: Vec<Scene>) -> ModelResult<Self> {
        Self::from_request(JobRequest {
            scenes,
            output_name: None,
            mode: None,
        })
    }

    pub fn scene_numbers(&self) -> Vec<u32> {
        self.scenes.iter().map(|s| s.scene_number).collect()
    }

    /// File stem of the final artifact: the sanitized output name, or
    /// `video_{job id}`.
    pub fn artifact_stem(&self) -> String {
        self.output_name
            .as_deref()
            .map(sanitize_file_stem)
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| format!("video_{}", self.id))
    }
}

/// Keep `[A-Za-z0-9_-]`, map everything else to `_`, trim stray underscores.
fn sanitize_file_stem(name: &str) -> String {
    let mapped: String = name
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    mapped.trim_matches('_').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{SceneAudio, SceneMedia};

    fn image(n: u32) -> Scene {
        Scene::new(
            n,
            SceneMedia::Image {
                path: format!("/media/{}.jpg", n).into(),
                duration: None,
            },
        )
    }

    #[test]
    fn test_job_sorts_scenes() {
        let job = Job::new(vec![image(3), image(1), image(2)]).unwrap();
        assert_eq!(job.scene_numbers(), vec![1, 2, 3]);
    }

    #[test]
    fn test_job_rejects_empty_and_duplicates() {
        assert!(matches!(Job::new(vec![]), Err(ModelError::InvalidJob(_))));
        assert!(matches!(
            Job::new(vec![image(1), image(1)]),
            Err(ModelError::InvalidJob(_))
        ));
        assert!(matches!(
            Job::new(vec![image(0)]),
            Err(ModelError::InvalidScene { .. })
        ));
    }

    #[test]
    fn test_request_deserialization() {
        let json = r#"{
            "scenes": [
                { "sceneNumber": 2, "media": { "type": "video", "path": "/v.mp4" },
                  "audio": { "path": "/n2.mp3" } },
                { "sceneNumber": 1, "media": { "type": "image", "path": "/i.jpg", "duration": 5 } }
            ],
            "outputName": "my video!",
            "mode": "scene_clips"
        }"#;
        let request: JobRequest = serde_json::from_str(json).unwrap();
        let job = Job::from_request(request).unwrap();
        assert_eq!(job.scene_numbers(), vec![1, 2]);
        assert_eq!(job.mode, Some(OutputMode::SceneClips));
        assert_eq!(job.artifact_stem(), "my_video");
        assert_eq!(
            job.scenes[1].audio,
            Some(SceneAudio::single("/n2.mp3"))
        );
    }

    #[test]
    fn test_artifact_stem_defaults_to_job_id() {
        let job = Job::new(vec![image(1)]).unwrap();
        assert_eq!(job.artifact_stem(), format!("video_{}", job.id));
    }

    #[test]
    fn test_unusable_output_name() {
        let request = JobRequest {
            scenes: vec![image(1)],
            output_name: Some("///".to_string()),
            mode: None,
        };
        assert!(Job::from_request(request).is_err());
    }

    #[test]
    fn test_output_mode_parsing() {
        assert_eq!("timeline".parse::<OutputMode>().unwrap(), OutputMode::Timeline);
        assert_eq!("Scene-Clips".parse::<OutputMode>().unwrap(), OutputMode::SceneClips);
        assert!("stream".parse::<OutputMode>().is_err());
    }

    #[test]
    fn test_terminal_states() {
        assert!(JobState::Completed.is_terminal());
        assert!(JobState::PartiallyFailed.is_terminal());
        assert!(JobState::Failed.is_terminal());
        assert!(!JobState::Rendering.is_terminal());
        assert_eq!(JobState::PartiallyFailed.as_str(), "partially_failed");
    }
}
