#![deny(unreachable_patterns)]
//! FFmpeg CLI wrapper for scene composition.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building
//! - Progress parsing from `-progress pipe:2`
//! - Cancellation and timeouts via tokio
//! - Duration resolution, narration normalization, per-scene rendering,
//!   output verification and timeline concatenation

pub mod audio;
pub mod command;
pub mod concat;
pub mod duration;
pub mod error;
pub mod fs_utils;
pub mod probe;
pub mod progress;
pub mod render;
pub mod verify;

pub use audio::normalize_audio;
pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use concat::{concatenate, render_manifest, ManifestEntry};
pub use duration::resolve_durations;
pub use error::{MediaError, MediaResult};
pub use probe::{probe_duration, probe_media, probe_media_with, DurationProbe, FfprobeProbe, MediaInfo};
pub use progress::FfmpegProgress;
pub use render::{render_scene, strip_audio, SceneRenderRequest};
pub use verify::{verify_duration, SCENE_TOLERANCE_SECS, TIMELINE_TOLERANCE_SECS};
