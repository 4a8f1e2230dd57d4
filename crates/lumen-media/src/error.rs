//! Error types for media operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur during media processing.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("FFmpeg not found in PATH")]
    FfmpegNotFound,

    #[error("FFprobe not found in PATH")]
    FfprobeNotFound,

    #[error("FFmpeg command failed: {message}")]
    FfmpegFailed {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("FFprobe command failed: {message}")]
    FfprobeFailed {
        message: String,
        stderr: Option<String>,
    },

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Invalid video file: {0}")]
    InvalidVideo(String),

    #[error("No frames extracted from {0}")]
    NoFrames(PathBuf),

    #[error("Geometry mismatch: expected {expected:?}, got {actual:?}")]
    GeometryMismatch {
        expected: (u32, u32),
        actual: (u32, u32),
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl MediaError {
    /// Create an FFmpeg failure error.
    pub fn ffmpeg_failed(
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::FfmpegFailed {
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    /// Create a geometry mismatch error from two `(width, height)` pairs.
    pub fn geometry_mismatch(expected: (u32, u32), actual: (u32, u32)) -> Self {
        Self::GeometryMismatch { expected, actual }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Whether this error comes from the external codec toolkit
    /// (missing binary, non-zero exit, timeout).
    pub fn is_tool_failure(&self) -> bool {
        matches!(
            self,
            MediaError::FfmpegNotFound
                | MediaError::FfprobeNotFound
                | MediaError::FfmpegFailed { .. }
                | MediaError::FfprobeFailed { .. }
                | MediaError::Timeout(_)
        )
    }
}
