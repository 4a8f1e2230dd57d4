//! FFmpeg progress snapshots.

use serde::{Deserialize, Serialize};

/// Progress information from FFmpeg's `-progress` stream.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FfmpegProgress {
    /// Frames written so far
    pub frame: u64,
    /// Current processing rate
    pub fps: f64,
    /// Output time in milliseconds
    pub out_time_ms: i64,
    /// Output time as string (HH:MM:SS.microseconds)
    pub out_time: String,
    /// Encoding speed relative to realtime
    pub speed: f64,
    /// Whether FFmpeg reported `progress=end`
    pub is_complete: bool,
}

impl FfmpegProgress {
    /// Percentage of `total_frames` written. Extraction and reassembly both
    /// know their frame count up front, so frames are the natural unit.
    pub fn frame_percentage(&self, total_frames: u64) -> f64 {
        if total_frames == 0 {
            return 0.0;
        }
        ((self.frame as f64 / total_frames as f64) * 100.0).min(100.0)
    }

    /// Seconds until `total_frames` are written at the current rate.
    pub fn eta_seconds(&self, total_frames: u64) -> Option<f64> {
        if self.fps <= 0.0 {
            return None;
        }
        let remaining = total_frames.saturating_sub(self.frame);
        Some(remaining as f64 / self.fps)
    }
}
