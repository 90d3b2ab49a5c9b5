//! Rendering results and job reports.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::job::{JobId, JobState, OutputMode};

/// A finished per-scene clip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RenderedScene {
    pub scene_number: u32,
    pub path: PathBuf,
    /// Duration the clip was rendered to (the scene's final duration)
    pub duration: f64,
}

/// Outcome of comparing a produced file's probed duration to its intent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DurationCheck {
    pub path: PathBuf,
    pub expected: f64,
    pub actual: f64,
    pub tolerance: f64,
}

impl DurationCheck {
    pub fn new(path: impl Into<PathBuf>, expected: f64, actual: f64, tolerance: f64) -> Self {
        Self {
            path: path.into(),
            expected,
            actual,
            tolerance,
        }
    }

    /// Absolute difference between actual and expected durations.
    pub fn deviation(&self) -> f64 {
        (self.actual - self.expected).abs()
    }

    pub fn within_tolerance(&self) -> bool {
        self.deviation() <= self.tolerance
    }
}

/// The single concatenated video of a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TimelineArtifact {
    pub path: PathBuf,
    /// Sum of the probed durations of the constituent clips
    pub expected_duration: f64,
    /// Clips in timeline order
    pub scene_numbers: Vec<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check: Option<DurationCheck>,
}

/// A scene clip delivered on its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SceneClip {
    pub scene_number: u32,
    pub path: PathBuf,
    pub duration: f64,
    /// Public URL of the clip when a base URL is configured
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// A scene excluded from the job's output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DroppedScene {
    pub scene_number: u32,
    pub reason: String,
}

/// Final report of a job that produced output.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct JobReport {
    pub job_id: JobId,
    pub state: JobState,
    pub mode: OutputMode,
    /// Present in timeline mode
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<TimelineArtifact>,
    /// Present in scene-clips mode
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub clips: Vec<SceneClip>,
    #[serde(default)]
    pub dropped_scenes: Vec<DroppedScene>,
    #[serde(default)]
    pub scene_checks: Vec<DurationCheck>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl JobReport {
    pub fn dropped_scene_numbers(&self) -> Vec<u32> {
        self.dropped_scenes.iter().map(|d| d.scene_number).collect()
    }

    pub fn is_partial(&self) -> bool {
        !self.dropped_scenes.is_empty()
    }

    /// Number of duration checks that fell outside tolerance.
    pub fn tolerance_violations(&self) -> usize {
        let timeline = self
            .artifact
            .as_ref()
            .and_then(|a| a.check.as_ref())
            .filter(|c| !c.within_tolerance())
            .map_or(0, |_| 1);
        timeline + self.scene_checks.iter().filter(|c| !c.within_tolerance()).count()
    }
}
