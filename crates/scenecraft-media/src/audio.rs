//! Narration loudness normalization.

use std::path::{Path, PathBuf};
use tracing::info;

use scenecraft_models::EncodingConfig;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};

/// Silence kept past the target so narration never ends before the picture.
/// The renderer's output cap trims it.
pub const AUDIO_PAD_MARGIN_SECS: f64 = 0.25;

/// Filter graph: concatenate the tracks, normalize loudness, resample back
/// from loudnorm's 192 kHz, pad with silence.
pub fn narration_filter_graph(track_count: usize, encoding: &EncodingConfig) -> String {
    let tail = format!(
        "{},aresample={},apad[narration]",
        encoding.loudness.to_filter(),
        encoding.sample_rate
    );

    if track_count <= 1 {
        format!("[0:a]{}", tail)
    } else {
        let labels: String = (0..track_count).map(|i| format!("[{}:a]", i)).collect();
        format!("{}concat=n={}:v=0:a=1,{}", labels, track_count, tail)
    }
}

/// Build the normalization command for `tracks` padded to `target_secs`.
pub fn build_normalize_command(
    tracks: &[PathBuf],
    target_secs: f64,
    output: &Path,
    encoding: &EncodingConfig,
) -> MediaResult<FfmpegCommand> {
    if !target_secs.is_finite() || target_secs <= 0.0 {
        return Err(MediaError::AudioNormalizationFailed(format!(
            "invalid target duration: {}",
            target_secs
        )));
    }

    let (first, rest) = tracks.split_first().ok_or_else(|| {
        MediaError::AudioNormalizationFailed("no audio tracks to normalize".to_string())
    })?;

    let cmd = rest
        .iter()
        .fold(FfmpegCommand::new(first, output), |cmd, track| {
            cmd.add_input(track)
        });

    Ok(cmd
        .filter_complex(narration_filter_graph(tracks.len(), encoding))
        .map("[narration]")
        .audio_codec("pcm_s16le")
        .output_duration(target_secs + AUDIO_PAD_MARGIN_SECS))
}

/// Loudness-normalize narration into a WAV at `output`, at least
/// `target_secs` long.
pub async fn normalize_audio(
    tracks: &[PathBuf],
    target_secs: f64,
    output: &Path,
    encoding: &EncodingConfig,
    runner: &FfmpegRunner,
) -> MediaResult<PathBuf> {
    let cmd = build_normalize_command(tracks, target_secs, output, encoding)?;

    info!(
        tracks = tracks.len(),
        target_secs = target_secs,
        output = %output.display(),
        "Normalizing narration"
    );

    runner
        .run(&cmd)
        .await
        .map_err(MediaError::into_normalization_failure)?;

    Ok(output.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_track_graph() {
        let graph = narration_filter_graph(1, &EncodingConfig::default());
        assert_eq!(
            graph,
            "[0:a]loudnorm=I=-16:LRA=11:TP=-1.5,aresample=48000,apad[narration]"
        );
    }

    #[test]
    fn test_multi_track_graph_concatenates_first() {
        let graph = narration_filter_graph(3, &EncodingConfig::default());
        assert!(graph.starts_with("[0:a][1:a][2:a]concat=n=3:v=0:a=1,loudnorm="));
        assert!(graph.ends_with("apad[narration]"));
    }

    #[test]
    fn test_command_pads_past_target() {
        let tracks = vec![PathBuf::from("/n/a.mp3"), PathBuf::from("/n/b.mp3")];
        let cmd = build_normalize_command(
            &tracks,
            8.0,
            Path::new("/w/scene_1_narration.wav"),
            &EncodingConfig::default(),
        )
        .unwrap();

        let args = cmd.build_args();
        assert_eq!(cmd.input_count(), 2);
        assert!(args.contains(&"[narration]".to_string()));
        assert!(args.contains(&"8.250".to_string()));
        assert!(args.contains(&"pcm_s16le".to_string()));
    }

    #[test]
    fn test_invalid_targets_are_rejected() {
        let tracks = vec![PathBuf::from("/n/a.mp3")];
        let out = Path::new("/w/out.wav");
        let encoding = EncodingConfig::default();

        for target in [0.0, -2.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                build_normalize_command(&tracks, target, out, &encoding),
                Err(MediaError::AudioNormalizationFailed(_))
            ));
        }

        assert!(matches!(
            build_normalize_command(&[], 3.0, out, &encoding),
            Err(MediaError::AudioNormalizationFailed(_))
        ));
    }
}
