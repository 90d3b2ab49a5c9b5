//! Scene definitions.
//!
//! A scene pairs one visual asset (a still image or a video clip) with an
//! optional narration track. Scenes arrive from the script, stock-media and
//! narration collaborators and are immutable once ingested.

use schemars::gen::SchemaGenerator;
use schemars::schema::Schema;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{ModelError, ModelResult};

/// Duration given to a still image when the scene does not declare one.
pub const DEFAULT_IMAGE_DURATION_SECS: f64 = 5.0;

/// Kind of visual asset backing a scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Visual asset of a scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SceneMedia {
    /// A still image shown for `duration` seconds (or the default).
    Image {
        path: PathBuf,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        duration: Option<f64>,
    },
    /// A video clip; its own length is probed at render time.
    Video { path: PathBuf },
}

impl SceneMedia {
    pub fn kind(&self) -> MediaKind {
        match self {
            SceneMedia::Image { .. } => MediaKind::Image,
            SceneMedia::Video { .. } => MediaKind::Video,
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            SceneMedia::Image { path, .. } | SceneMedia::Video { path } => path,
        }
    }

    /// Display length of an image: the declared duration when positive,
    /// otherwise [`DEFAULT_IMAGE_DURATION_SECS`]. `None` for videos.
    pub fn image_duration(&self) -> Option<f64> {
        match self {
            SceneMedia::Image { duration, .. } => Some(
                duration
                    .filter(|d| d.is_finite() && *d > 0.0)
                    .unwrap_or(DEFAULT_IMAGE_DURATION_SECS),
            ),
            SceneMedia::Video { .. } => None,
        }
    }
}

/// Narration attached to a scene.
///
/// Accepts both `{ "path": ... }` and `{ "type": "multiple", "paths": [...] }`.
/// Multiple tracks are played back to back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawSceneAudio", into = "RawSceneAudio")]
pub struct SceneAudio {
    tracks: Vec<PathBuf>,
}

impl SceneAudio {
    /// Narration made of a single track.
    pub fn single(path: impl Into<PathBuf>) -> Self {
        Self {
            tracks: vec![path.into()],
        }
    }

    /// Narration made of several tracks played in order.
    pub fn multiple(tracks: Vec<PathBuf>) -> ModelResult<Self> {
        if tracks.is_empty() {
            return Err(ModelError::InvalidAudio(
                "at least one audio track is required".to_string(),
            ));
        }
        Ok(Self { tracks })
    }

    pub fn tracks(&self) -> &[PathBuf] {
        &self.tracks
    }
}

/// Wire shape of [`SceneAudio`].
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct RawSceneAudio {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    paths: Option<Vec<PathBuf>>,
}

impl TryFrom<RawSceneAudio> for SceneAudio {
    type Error = ModelError;

    fn try_from(raw: RawSceneAudio) -> Result<Self, Self::Error> {
        match (raw.paths, raw.path) {
            (Some(paths), _) if !paths.is_empty() => SceneAudio::multiple(paths),
            (_, Some(path)) => Ok(SceneAudio::single(path)),
            _ => Err(ModelError::InvalidAudio(
                "audio requires `path` or a non-empty `paths`".to_string(),
            )),
        }
    }
}

impl From<SceneAudio> for RawSceneAudio {
    fn from(audio: SceneAudio) -> Self {
        let mut tracks = audio.tracks;
        if tracks.len() == 1 {
            RawSceneAudio {
                kind: None,
                path: tracks.pop(),
                paths: None,
            }
        } else {
            RawSceneAudio {
                kind: Some("multiple".to_string()),
                path: None,
                paths: Some(tracks),
            }
        }
    }
}

impl JsonSchema for SceneAudio {
    fn schema_name() -> String {
        "SceneAudio".to_string()
    }

    fn json_schema(gen: &mut SchemaGenerator) -> Schema {
        RawSceneAudio::json_schema(gen)
    }
}

/// One unit of the script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Scene {
    /// Position in the final timeline (1-based, unique within a job)
    pub scene_number: u32,

    /// Visual asset
    pub media: SceneMedia,

    /// Narration; absent means a silent scene
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<SceneAudio>,
}

impl Scene {
    pub fn new(scene_number: u32, media: SceneMedia) -> Self {
        Self {
            scene_number,
            media,
            audio: None,
        }
    }

    pub fn with_audio(mut self, audio: SceneAudio) -> Self {
        self.audio = Some(audio);
        self
    }

    pub fn has_audio(&self) -> bool {
        self.audio.is_some()
    }

    /// Every file the scene reads from, media first.
    pub fn input_paths(&self) -> Vec<&Path> {
        let mut paths = vec![self.media.path()];
        if let Some(audio) = &self.audio {
            paths.extend(audio.tracks().iter().map(PathBuf::as_path));
        }
        paths
    }

    /// Structural validation. File existence is checked at render time.
    pub fn validate(&self) -> ModelResult<()> {
        if self.scene_number == 0 {
            return Err(ModelError::invalid_scene(0, "scene numbers start at 1"));
        }

        if self.media.path().as_os_str().is_empty() {
            return Err(ModelError::invalid_scene(
                self.scene_number,
                "media path is empty",
            ));
        }

        if let SceneMedia::Image {
            duration: Some(d), ..
        } = &self.media
        {
            if !d.is_finite() {
                return Err(ModelError::invalid_scene(
                    self.scene_number,
                    format!("image duration is not a finite number: {}", d),
                ));
            }
        }

        if let Some(audio) = &self.audio {
            if audio.tracks().iter().any(|p| p.as_os_str().is_empty()) {
                return Err(ModelError::invalid_scene(
                    self.scene_number,
                    "audio path is empty",
                ));
            }
        }

        Ok(())
    }
}

/// Durations resolved for one scene, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedDurations {
    /// Source video length, or the image display length
    pub video_duration: f64,
    /// Probed narration length (sum of tracks), if the scene has narration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_duration: Option<f64>,
    /// Authoritative length of the rendered clip
    pub final_duration: f64,
}

impl ResolvedDurations {
    /// Narration wins when present; otherwise the visual length is used.
    pub fn reconcile(video_duration: f64, audio_duration: Option<f64>) -> Self {
        Self {
            video_duration,
            audio_duration,
            final_duration: audio_duration.unwrap_or(video_duration),
        }
    }

    /// Whether a video source must be looped to cover the final duration.
    pub fn needs_loop(&self) -> bool {
        self.final_duration > self.video_duration
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_scene_deserialization() {
        let json = r#"{
            "sceneNumber": 2,
            "media": { "type": "image", "path": "/tmp/a.jpg", "duration": 7.5 },
            "audio": { "path": "/tmp/a.mp3" }
        }"#;
        let scene: Scene = serde_json::from_str(json).unwrap();
        assert_eq!(scene.scene_number, 2);
        assert_eq!(scene.media.kind(), MediaKind::Image);
        assert_eq!(scene.media.image_duration(), Some(7.5));
        assert_eq!(scene.audio.unwrap().tracks(), [PathBuf::from("/tmp/a.mp3")]);
    }

    #[test]
    fn test_video_duration_hint_is_ignored() {
        let json = r#"{
            "sceneNumber": 1,
            "media": { "type": "video", "path": "/tmp/v.mp4", "duration": 12 }
        }"#;
        let scene: Scene = serde_json::from_str(json).unwrap();
        assert_eq!(scene.media.kind(), MediaKind::Video);
        assert_eq!(scene.media.image_duration(), None);
        assert!(!scene.has_audio());
    }

    #[test]
    fn test_image_duration_fallback() {
        let missing = SceneMedia::Image {
            path: "a.png".into(),
            duration: None,
        };
        let zero = SceneMedia::Image {
            path: "a.png".into(),
            duration: Some(0.0),
        };
        let negative = SceneMedia::Image {
            path: "a.png".into(),
            duration: Some(-3.0),
        };
        assert_eq!(missing.image_duration(), Some(DEFAULT_IMAGE_DURATION_SECS));
        assert_eq!(zero.image_duration(), Some(DEFAULT_IMAGE_DURATION_SECS));
        assert_eq!(negative.image_duration(), Some(DEFAULT_IMAGE_DURATION_SECS));
    }

    #[test]
    fn test_multiple_audio_tracks() {
        let json = r#"{ "type": "multiple", "paths": ["/a.mp3", "/b.mp3"] }"#;
        let audio: SceneAudio = serde_json::from_str(json).unwrap();
        assert_eq!(audio.tracks().len(), 2);

        let back = serde_json::to_value(&audio).unwrap();
        assert_eq!(back["type"], "multiple");
    }

    #[test]
    fn test_audio_without_paths_is_rejected() {
        let result: Result<SceneAudio, _> = serde_json::from_str(r#"{ "paths": [] }"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_media_type_is_rejected() {
        let json = r#"{ "sceneNumber": 1, "media": { "type": "gif", "path": "/a.gif" } }"#;
        assert!(serde_json::from_str::<Scene>(json).is_err());
    }

    #[test]
    fn test_scene_validation() {
        let scene = Scene::new(0, SceneMedia::Video { path: "v.mp4".into() });
        assert!(scene.validate().is_err());

        let scene = Scene::new(1, SceneMedia::Video { path: "".into() });
        assert!(scene.validate().is_err());

        let scene = Scene::new(
            1,
            SceneMedia::Image {
                path: "a.png".into(),
                duration: Some(f64::NAN),
            },
        );
        assert!(scene.validate().is_err());

        let scene = Scene::new(3, SceneMedia::Video { path: "v.mp4".into() })
            .with_audio(SceneAudio::single("n.mp3"));
        assert!(scene.validate().is_ok());
        assert_eq!(scene.input_paths().len(), 2);
    }

    #[test]
    fn test_reconcile_prefers_audio() {
        let with_audio = ResolvedDurations::reconcile(3.0, Some(8.0));
        assert_eq!(with_audio.final_duration, 8.0);
        assert!(with_audio.needs_loop());

        let trimmed = ResolvedDurations::reconcile(10.0, Some(4.0));
        assert_eq!(trimmed.final_duration, 4.0);
        assert!(!trimmed.needs_loop());

        let silent = ResolvedDurations::reconcile(5.0, None);
        assert_eq!(silent.final_duration, 5.0);
    }
}
