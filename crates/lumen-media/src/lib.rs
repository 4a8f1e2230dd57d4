#![deny(unreachable_patterns)]
//! FFmpeg CLI wrapper and pixel algorithms for frame-group enhancement.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building with multiple inputs
//! - Progress parsing from `-progress pipe:2`
//! - Cancellation and timeouts via tokio
//! - Frame extraction, frame files and reassembly with audio passthrough
//! - Colour histograms and temporal grouping
//! - Group colour transforms (3D LUTs)

pub mod command;
pub mod error;
pub mod frames;
pub mod grouping;
pub mod histogram;
pub mod lut;
pub mod probe;
pub mod progress;

pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use error::{MediaError, MediaResult};
pub use frames::{
    extract_frames, extraction_rate, list_frames, reassemble, save_frame, Frame, FrameRef,
    ReassembleOptions,
};
pub use grouping::{group_by_histograms, group_frames, select_representative};
pub use histogram::{compute_histograms, ColorHistogram};
pub use lut::ColorTransform;
pub use probe::{probe_video, VideoInfo};
pub use progress::FfmpegProgress;
