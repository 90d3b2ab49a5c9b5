//! FFprobe media information.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::ffi::OsStr;
use std::path::Path;

use crate::command::FfmpegRunner;
use crate::error::{MediaError, MediaResult};

/// Media file information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaInfo {
    /// Duration in seconds (0.0 when FFprobe reports none)
    pub duration: f64,
    pub has_video: bool,
    pub has_audio: bool,
    /// Width in pixels (0 without a video stream)
    pub width: u32,
    /// Height in pixels (0 without a video stream)
    pub height: u32,
    /// Frame rate (fps)
    pub fps: f64,
    /// Codec of the first video stream, else of the first audio stream
    pub codec: String,
    /// File size in bytes
    pub size: u64,
}

/// FFprobe JSON output format.
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: FfprobeFormat,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
    size: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: String,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    duration: Option<String>,
}

/// Source of media durations.
///
/// Duration resolution and verification only need this much of FFprobe,
/// so they are written against the trait.
#[async_trait]
pub trait DurationProbe: Send + Sync {
    /// Positive, finite duration of the file in seconds.
    async fn duration(&self, path: &Path) -> MediaResult<f64>;
}

/// [`DurationProbe`] backed by the `ffprobe` binary.
///
/// Probes run through `runner`, so they observe its cancellation signal and
/// timeout.
#[derive(Debug, Clone, Default)]
pub struct FfprobeProbe {
    runner: FfmpegRunner,
}

impl FfprobeProbe {
    pub fn new(runner: FfmpegRunner) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl DurationProbe for FfprobeProbe {
    async fn duration(&self, path: &Path) -> MediaResult<f64> {
        let info = probe_media_with(path, &self.runner).await?;
        validate_duration(path, info.duration)
    }
}

/// Probe a media file for information.
pub async fn probe_media(path: impl AsRef<Path>) -> MediaResult<MediaInfo> {
    probe_media_with(path.as_ref(), &FfmpegRunner::new()).await
}

/// Probe a media file, running FFprobe under `runner`.
pub async fn probe_media_with(path: &Path, runner: &FfmpegRunner) -> MediaResult<MediaInfo> {
    if !path.exists() {
        return Err(MediaError::MediaFileMissing(path.to_path_buf()));
    }

    let args = [
        OsStr::new("-v"),
        OsStr::new("error"),
        OsStr::new("-print_format"),
        OsStr::new("json"),
        OsStr::new("-show_format"),
        OsStr::new("-show_streams"),
        path.as_os_str(),
    ];
    let output = runner.probe_output(&args).await?;

    if !output.status.success() {
        return Err(MediaError::FfprobeFailed {
            message: format!("FFprobe failed for {}", path.display()),
            stderr: Some(String::from_utf8_lossy(&output.stderr).to_string()),
        });
    }

    let probe: FfprobeOutput = serde_json::from_slice(&output.stdout)?;
    Ok(media_info_from_probe(probe))
}

/// Probe a file's duration, rejecting non-positive or non-numeric values.
pub async fn probe_duration(path: impl AsRef<Path>) -> MediaResult<f64> {
    let path = path.as_ref();
    let info = probe_media(path).await?;
    validate_duration(path, info.duration)
}

/// Accept only finite durations strictly greater than zero.
pub fn validate_duration(path: &Path, duration: f64) -> MediaResult<f64> {
    if duration.is_finite() && duration > 0.0 {
        Ok(duration)
    } else {
        Err(MediaError::invalid_duration(
            path,
            format!("probed duration {} is not a positive number", duration),
        ))
    }
}

fn media_info_from_probe(probe: FfprobeOutput) -> MediaInfo {
    let video_stream = probe.streams.iter().find(|s| s.codec_type == "video");
    let audio_stream = probe.streams.iter().find(|s| s.codec_type == "audio");

    // Container duration first, then the longest stream
    let duration = probe
        .format
        .duration
        .as_deref()
        .and_then(parse_seconds)
        .or_else(|| {
            probe
                .streams
                .iter()
                .filter_map(|s| s.duration.as_deref().and_then(parse_seconds))
                .reduce(f64::max)
        })
        .unwrap_or(0.0);

    let size = probe
        .format
        .size
        .as_ref()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(0);

    let fps = video_stream
        .and_then(|s| s.avg_frame_rate.as_ref().or(s.r_frame_rate.as_ref()))
        .and_then(|r| parse_frame_rate(r))
        .unwrap_or(0.0);

    let codec = video_stream
        .or(audio_stream)
        .and_then(|s| s.codec_name.clone())
        .unwrap_or_default();

    MediaInfo {
        duration,
        has_video: video_stream.is_some(),
        has_audio: audio_stream.is_some(),
        width: video_stream.and_then(|s| s.width).unwrap_or(0),
        height: video_stream.and_then(|s| s.height).unwrap_or(0),
        fps,
        codec,
        size,
    }
}

/// Parse an FFprobe seconds field ("N/A" and garbage yield `None`).
fn parse_seconds(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok().filter(|d| d.is_finite())
}

/// Parse frame rate string (e.g., "30/1" or "29.97").
fn parse_frame_rate(s: &str) -> Option<f64> {
    if let Some((num, den)) = s.split_once('/') {
        let num: f64 = num.parse().ok()?;
        let den: f64 = den.parse().ok()?;
        if den > 0.0 {
            return Some(num / den);
        }
        return None;
    }
    s.parse().ok()
}
