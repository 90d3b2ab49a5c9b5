//! Scene duration resolution.
//!
//! Three independent lengths meet here: the image display length (declared
//! or default), the source video's own length, and the narration length.
//! Narration is authoritative whenever it exists.

use std::path::Path;
use tracing::debug;

use scenecraft_models::{ResolvedDurations, Scene, SceneMedia, DEFAULT_IMAGE_DURATION_SECS};

use crate::error::{MediaError, MediaResult};
use crate::probe::DurationProbe;

/// Resolve the video, audio and final durations of one scene.
///
/// Only reads files (through `probe`); any error is fatal for the scene.
pub async fn resolve_durations<P>(scene: &Scene, probe: &P) -> MediaResult<ResolvedDurations>
where
    P: DurationProbe + ?Sized,
{
    let video_duration = match &scene.media {
        SceneMedia::Image { .. } => scene
            .media
            .image_duration()
            .unwrap_or(DEFAULT_IMAGE_DURATION_SECS),
        SceneMedia::Video { path } => probe_positive(probe, path).await?,
    };

    let audio_duration = match &scene.audio {
        Some(audio) => {
            let mut total = 0.0;
            for track in audio.tracks() {
                total += probe_positive(probe, track).await?;
            }
            Some(total)
        }
        None => None,
    };

    let resolved = ResolvedDurations::reconcile(video_duration, audio_duration);

    debug!(
        scene_number = scene.scene_number,
        media_type = %scene.media.kind(),
        video_duration = resolved.video_duration,
        audio_duration = ?resolved.audio_duration,
        final_duration = resolved.final_duration,
        "Resolved scene durations"
    );

    Ok(resolved)
}

/// Probe and classify every failure as an unresolvable duration, except a
/// missing file, missing tooling, a timeout or a cancellation.
async fn probe_positive<P>(probe: &P, path: &Path) -> MediaResult<f64>
where
    P: DurationProbe + ?Sized,
{
    match probe.duration(path).await {
        Ok(d) if d.is_finite() && d > 0.0 => Ok(d),
        Ok(d) => Err(MediaError::invalid_duration(
            path,
            format!("probed duration {} is not a positive number", d),
        )),
        Err(e @ (MediaError::MediaFileMissing(_)
        | MediaError::InvalidMediaDuration { .. }
        | MediaError::FfprobeNotFound
        | MediaError::Cancelled
        | MediaError::Timeout(_))) => Err(e),
        Err(e) => Err(MediaError::invalid_duration(path, e.detail())),
    }
}
