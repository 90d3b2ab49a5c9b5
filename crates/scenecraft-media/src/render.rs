//! Per-scene clip rendering.
//!
//! # Pipeline
//!
//! A scene becomes exactly one clip in the canonical profile:
//!
//! - **Image**: the still is looped (`-loop 1`) as an endless source.
//! - **Video**: looped with `-stream_loop -1` when the narration outlasts it,
//!   otherwise read as-is and trimmed. With narration, the source's own audio
//!   is stripped into a video-only intermediate first.
//!
//! Both paths share the canonical scale/pad chain, take narration (or a
//! generated silent track) as the second input, and are hard-capped with an
//! output `-t` at the scene's final duration.

use std::path::{Path, PathBuf};
use tracing::{debug, info};

use scenecraft_models::{EncodingConfig, RenderedScene, ResolvedDurations, Scene, SceneMedia};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::fs_utils::{ensure_readable_file, scene_artifact_path};
use crate::progress::FfmpegProgress;

/// Progress is logged in steps of this many percent.
const PROGRESS_LOG_STEP: u8 = 25;

/// Everything needed to render one scene.
#[derive(Debug, Clone)]
pub struct SceneRenderRequest<'a> {
    pub scene: &'a Scene,
    pub durations: ResolvedDurations,
    /// Normalized narration, when the scene has any
    pub narration: Option<&'a Path>,
    /// Directory for intermediates (the job's working directory)
    pub work_dir: &'a Path,
    /// Where the finished clip is written
    pub output: &'a Path,
}

/// Visual input of the final encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisualInput<'a> {
    Still(&'a Path),
    Clip { path: &'a Path, looped: bool },
}

/// Build the encode command for one scene.
pub fn build_render_command(
    visual: VisualInput<'_>,
    narration: Option<&Path>,
    final_duration: f64,
    output: &Path,
    encoding: &EncodingConfig,
) -> FfmpegCommand {
    let cmd = match visual {
        VisualInput::Still(path) => FfmpegCommand::new(path, output).input_args(["-loop", "1"]),
        VisualInput::Clip { path, looped: true } => {
            FfmpegCommand::new(path, output).input_args(["-stream_loop", "-1"])
        }
        VisualInput::Clip {
            path,
            looped: false,
        } => FfmpegCommand::new(path, output),
    };

    let cmd = match narration {
        Some(audio) => cmd.add_input(audio),
        None => cmd.add_lavfi_input(encoding.silent_audio_source()),
    };

    cmd.filter_complex(format!("[0:v]{}[v]", encoding.canonical_video_filter()))
        .map("[v]")
        .map("1:a:0")
        .output_args(encoding.to_ffmpeg_args())
        .output_duration(final_duration)
}

/// Remux a video without its audio streams (`-c:v copy -an`).
pub async fn strip_audio(input: &Path, output: &Path, runner: &FfmpegRunner) -> MediaResult<()> {
    let cmd = FfmpegCommand::new(input, output)
        .map("0:v:0")
        .video_codec("copy")
        .no_audio();

    runner.run(&cmd).await
}

/// Render one scene into a clip of exactly `durations.final_duration` seconds.
///
/// Any failure is reported as a scene-level error; the caller decides what
/// that means for the job.
pub async fn render_scene(
    request: SceneRenderRequest<'_>,
    encoding: &EncodingConfig,
    runner: &FfmpegRunner,
) -> MediaResult<RenderedScene> {
    let scene = request.scene;
    let scene_number = scene.scene_number;
    let final_duration = request.durations.final_duration;

    ensure_readable_file(scene.media.path()).await?;

    // Keep the intermediate alive until the encode has finished
    let stripped: Option<PathBuf> = match (&scene.media, request.narration) {
        (SceneMedia::Video { path }, Some(_)) => {
            let silent = scene_artifact_path(request.work_dir, scene_number, "noaudio", "mkv");
            strip_audio(path, &silent, runner)
                .await
                .map_err(|e| e.into_render_failure(scene_number))?;
            Some(silent)
        }
        _ => None,
    };

    let visual = match &scene.media {
        SceneMedia::Image { path, .. } => VisualInput::Still(path),
        SceneMedia::Video { path } => VisualInput::Clip {
            path: stripped.as_deref().unwrap_or(path),
            looped: request.durations.needs_loop(),
        },
    };

    info!(
        scene_number = scene_number,
        media_type = %scene.media.kind(),
        final_duration = final_duration,
        looped = matches!(visual, VisualInput::Clip { looped: true, .. }),
        has_narration = request.narration.is_some(),
        "Rendering scene"
    );

    let cmd = build_render_command(
        visual,
        request.narration,
        final_duration,
        request.output,
        encoding,
    );

    let last_bucket = std::sync::atomic::AtomicU8::new(0);
    runner
        .run_with_progress(&cmd, move |progress: FfmpegProgress| {
            let bucket = progress.percent_bucket(final_duration, PROGRESS_LOG_STEP);
            if bucket > last_bucket.swap(bucket, std::sync::atomic::Ordering::Relaxed) {
                debug!(scene_number = scene_number, percent = bucket, "Scene render progress");
            }
        })
        .await
        .map_err(|e| e.into_render_failure(scene_number))?;

    if !request.output.exists() {
        return Err(MediaError::SceneRenderFailed {
            scene_number,
            message: format!("encoder produced no file at {}", request.output.display()),
        });
    }

    info!(
        scene_number = scene_number,
        output = %request.output.display(),
        "Scene rendered"
    );

    Ok(RenderedScene {
        scene_number,
        path: request.output.to_path_buf(),
        duration: final_duration,
    })
}
