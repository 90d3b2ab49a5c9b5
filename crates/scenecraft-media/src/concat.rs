//! Timeline concatenation via the FFmpeg concat demuxer.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, warn};

use scenecraft_models::{EncodingConfig, RenderedScene, TimelineArtifact};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::probe::DurationProbe;
use crate::verify::{verify_duration, TIMELINE_TOLERANCE_SECS};

/// One clip in the concat manifest.
#[derive(Debug, Clone, PartialEq)]
pub struct ManifestEntry {
    pub scene_number: u32,
    pub path: PathBuf,
    /// Probed duration of the clip as written
    pub duration: f64,
}

/// Render an ffconcat manifest.
pub fn render_manifest(entries: &[ManifestEntry]) -> String {
    let mut manifest = String::from("ffconcat version 1.0\n");
    for entry in entries {
        let _ = writeln!(manifest, "file '{}'", escape_path(&entry.path));
        let _ = writeln!(manifest, "duration {:.6}", entry.duration);
    }
    manifest
}

/// Quote escaping for ffconcat single-quoted strings.
fn escape_path(path: &Path) -> String {
    path.to_string_lossy().replace('\'', r"'\''")
}

/// Probe every clip and build manifest entries in scene order.
///
/// The probed length is used rather than the requested one so the manifest
/// describes the files as they actually are. When a clip cannot be probed
/// its rendered duration stands in.
pub async fn build_manifest<P>(clips: &[RenderedScene], probe: &P) -> MediaResult<Vec<ManifestEntry>>
where
    P: DurationProbe + ?Sized,
{
    let mut ordered: Vec<&RenderedScene> = clips.iter().collect();
    ordered.sort_by_key(|c| c.scene_number);

    let mut entries = Vec::with_capacity(ordered.len());
    for clip in ordered {
        let path = fs::canonicalize(&clip.path)
            .await
            .map_err(|_| MediaError::MediaFileMissing(clip.path.clone()))?;

        let duration = match probe.duration(&path).await {
            Ok(d) => d,
            Err(MediaError::Cancelled) => return Err(MediaError::Cancelled),
            Err(e) => {
                warn!(
                    scene_number = clip.scene_number,
                    error = %e,
                    "Could not probe clip, using rendered duration"
                );
                clip.duration
            }
        };

        entries.push(ManifestEntry {
            scene_number: clip.scene_number,
            path,
            duration,
        });
    }

    Ok(entries)
}

/// Build the concat command for a written manifest.
pub fn build_concat_command(
    manifest_path: &Path,
    output: &Path,
    encoding: &EncodingConfig,
) -> FfmpegCommand {
    FfmpegCommand::new(manifest_path, output)
        .input_args(["-f", "concat", "-safe", "0"])
        .map("0:v:0")
        .map("0:a:0")
        .output_args(encoding.to_ffmpeg_args())
}

/// Join `clips` in ascending scene order into one file at `output`.
///
/// The result is re-encoded with the canonical profile and then checked
/// against the sum of the probed clip durations.
pub async fn concatenate<P>(
    clips: &[RenderedScene],
    manifest_path: &Path,
    output: &Path,
    encoding: &EncodingConfig,
    runner: &FfmpegRunner,
    probe: &P,
) -> MediaResult<TimelineArtifact>
where
    P: DurationProbe + ?Sized,
{
    if clips.is_empty() {
        return Err(MediaError::ConcatenationFailed(
            "no rendered scenes to concatenate".to_string(),
        ));
    }

    let entries = build_manifest(clips, probe)
        .await
        .map_err(MediaError::into_concatenation_failure)?;
    let expected_duration: f64 = entries.iter().map(|e| e.duration).sum();

    fs::write(manifest_path, render_manifest(&entries))
        .await
        .map_err(|e| MediaError::ConcatenationFailed(format!("writing manifest: {}", e)))?;

    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await.map_err(|e| {
                MediaError::ConcatenationFailed(format!(
                    "creating output directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }
    }

    info!(
        clips = entries.len(),
        expected_duration = expected_duration,
        output = %output.display(),
        "Concatenating timeline"
    );

    let cmd = build_concat_command(manifest_path, output, encoding);
    runner
        .run(&cmd)
        .await
        .map_err(MediaError::into_concatenation_failure)?;

    let check = verify_duration(probe, output, expected_duration, TIMELINE_TOLERANCE_SECS).await;

    Ok(TimelineArtifact {
        path: output.to_path_buf(),
        expected_duration,
        scene_numbers: entries.iter().map(|e| e.scene_number).collect(),
        check,
    })
}
