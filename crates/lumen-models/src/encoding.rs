//! Output encoding profile.
//!
//! Enhanced videos are always written with one fixed container profile:
//! H.264 in MP4 with the source audio stream copied verbatim.

/// Video codec for reassembly.
pub const OUTPUT_VIDEO_CODEC: &str = "libx264";
/// Pixel format for reassembly (widest player compatibility).
pub const OUTPUT_PIXEL_FORMAT: &str = "yuv420p";
/// Encoding preset.
pub const OUTPUT_PRESET: &str = "medium";
/// Constant Rate Factor; near-transparent for enhanced footage.
pub const OUTPUT_CRF: u8 = 16;
/// Container extension.
pub const OUTPUT_CONTAINER_EXT: &str = "mp4";

/// printf-style pattern for extracted and edited frame files (1-based).
pub const FRAME_FILE_PATTERN: &str = "frame_%06d.png";

/// File name for the frame at zero-based `index`, matching [`FRAME_FILE_PATTERN`].
pub fn frame_file_name(index: usize) -> String {
    format!("frame_{:06}.png", index + 1)
}
