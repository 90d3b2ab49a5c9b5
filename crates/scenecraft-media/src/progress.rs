//! FFmpeg progress parsing.

use serde::{Deserialize, Serialize};

/// Progress information from FFmpeg.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FfmpegProgress {
    /// Current frame number
    pub frame: u64,
    /// Current FPS
    pub fps: f64,
    /// Output time in milliseconds
    pub out_time_ms: i64,
    /// Output time as string (HH:MM:SS.microseconds)
    pub out_time: String,
    /// Encoding speed (e.g., 1.5 = 1.5x realtime)
    pub speed: f64,
    /// Whether encoding is complete
    pub is_complete: bool,
}

impl FfmpegProgress {
    /// Progress percentage of an output expected to last `target_secs`.
    pub fn percentage(&self, target_secs: f64) -> f64 {
        if target_secs <= 0.0 {
            return 0.0;
        }
        ((self.out_time_ms as f64 / 1000.0 / target_secs) * 100.0).clamp(0.0, 100.0)
    }

    /// Whole-percent bucket, used to throttle progress logging.
    pub fn percent_bucket(&self, target_secs: f64, step: u8) -> u8 {
        let step = step.max(1);
        let pct = self.percentage(target_secs) as u8;
        pct - pct % step
    }
}
