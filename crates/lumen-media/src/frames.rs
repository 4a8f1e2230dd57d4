//! Frame extraction, frame files and reassembly.
//!
//! Frames live on disk as `frame_%06d.png` (1-based) inside a run's work
//! directory and are decoded on demand, so a run never holds the whole clip
//! in memory.

use std::path::{Path, PathBuf};

use image::RgbImage;
use tracing::{debug, info};

use lumen_models::encoding::{
    frame_file_name, FRAME_FILE_PATTERN, OUTPUT_CRF, OUTPUT_PIXEL_FORMAT, OUTPUT_PRESET,
    OUTPUT_VIDEO_CODEC,
};
use lumen_models::EnhanceConfig;

use crate::command::{format_rate, FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::probe::VideoInfo;

/// Lowest rate the extraction policy will pick.
pub const MIN_EXTRACTION_RATE: f64 = 1.0;

/// Rate assumed when the probe reports none.
const FALLBACK_SOURCE_FPS: f64 = 30.0;

/// Rates closer than this are treated as equal.
const RATE_EPSILON: f64 = 1e-3;

/// A decoded frame.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Position in the extracted sequence
    pub index: usize,
    /// Source timestamp in seconds
    pub timestamp: f64,
    /// RGB8 pixels
    pub pixels: RgbImage,
}

impl Frame {
    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }
}

/// A frame file on disk.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameRef {
    pub index: usize,
    pub timestamp: f64,
    pub path: PathBuf,
}

impl FrameRef {
    /// Decode the frame's pixels as RGB8.
    pub fn load_pixels(&self) -> MediaResult<RgbImage> {
        if !self.path.exists() {
            return Err(MediaError::FileNotFound(self.path.clone()));
        }
        Ok(image::open(&self.path)?.to_rgb8())
    }

    /// Decode into a [`Frame`].
    pub fn load(&self) -> MediaResult<Frame> {
        Ok(Frame {
            index: self.index,
            timestamp: self.timestamp,
            pixels: self.load_pixels()?,
        })
    }
}

/// Pick the extraction rate for a clip.
///
/// An explicit rate wins (capped at the source rate). Otherwise the source
/// rate is used, reduced so that the clip yields at most `max_frames`
/// frames, but never below [`MIN_EXTRACTION_RATE`].
pub fn extraction_rate(info: &VideoInfo, config: &EnhanceConfig) -> f64 {
    let source = if info.fps > 0.0 {
        info.fps
    } else {
        FALLBACK_SOURCE_FPS
    };

    if let Some(rate) = config.extraction_frame_rate {
        return rate.min(source);
    }

    if info.duration <= 0.0 {
        return source;
    }

    let frame_cap_rate = config.max_frames as f64 / info.duration;
    source.min(frame_cap_rate).max(MIN_EXTRACTION_RATE)
}

/// Write `pixels` as the frame file for `index` inside `dir`.
pub fn save_frame(pixels: &RgbImage, dir: &Path, index: usize) -> MediaResult<PathBuf> {
    let path = dir.join(frame_file_name(index));
    pixels.save(&path)?;
    Ok(path)
}

/// List frame files in `dir` in sequence order.
pub fn list_frames(dir: &Path, rate: f64) -> MediaResult<Vec<FrameRef>> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| is_frame_file(path))
        .collect();
    paths.sort();

    let step = if rate > 0.0 { 1.0 / rate } else { 0.0 };
    Ok(paths
        .into_iter()
        .enumerate()
        .map(|(index, path)| FrameRef {
            index,
            timestamp: index as f64 * step,
            path,
        })
        .collect())
}

fn is_frame_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .and_then(|n| n.strip_prefix("frame_"))
        .and_then(|n| n.strip_suffix(".png"))
        .map(|digits| digits.len() == 6 && digits.bytes().all(|b| b.is_ascii_digit()))
        .unwrap_or(false)
}

/// Build the extraction command for `input` at `rate`.
pub fn extraction_command(info: &VideoInfo, input: &Path, rate: f64, dir: &Path) -> FfmpegCommand {
    let cmd = FfmpegCommand::new(input, dir.join(FRAME_FILE_PATTERN)).map("0:v:0");

    let cmd = if (rate - info.fps).abs() < RATE_EPSILON {
        // Native rate: keep every decoded frame exactly once
        cmd.output_args(["-fps_mode", "passthrough"])
    } else {
        cmd.video_filter(format!("fps={}", format_rate(rate)))
    };
    cmd.output_args(["-start_number", "1"])
}

/// Extract `input` into `dir` at `rate` and return the frames in order.
pub async fn extract_frames(
    runner: &FfmpegRunner,
    info: &VideoInfo,
    input: &Path,
    rate: f64,
    dir: &Path,
) -> MediaResult<Vec<FrameRef>> {
    tokio::fs::create_dir_all(dir).await?;

    let cmd = extraction_command(info, input, rate, dir);
    let expected = info.expected_frames(rate);
    runner
        .run_with_progress(&cmd, move |progress| {
            debug!(
                frame = progress.frame,
                percent = format!("{:.0}", progress.frame_percentage(expected)),
                eta_secs = ?progress.eta_seconds(expected),
                "Extracting frames"
            );
        })
        .await?;

    let dir_owned = dir.to_path_buf();
    let frames = tokio::task::spawn_blocking(move || list_frames(&dir_owned, rate))
        .await
        .map_err(|e| MediaError::internal(format!("frame listing task failed: {}", e)))??;

    if frames.is_empty() {
        return Err(MediaError::NoFrames(input.to_path_buf()));
    }

    info!(
        frames = frames.len(),
        rate = format_rate(rate),
        "Extracted frames from {}",
        input.display()
    );
    Ok(frames)
}

/// Options for muxing edited frames back into a video.
#[derive(Debug, Clone)]
pub struct ReassembleOptions {
    /// Rate the frames were extracted at
    pub frame_rate: f64,
    /// Source frame rate, used for optional interpolation
    pub source_fps: f64,
    /// Copy the source's first audio stream verbatim
    pub copy_audio: bool,
    /// Upsample back to `source_fps` with motion interpolation
    pub interpolate_to_source: bool,
}

/// Build the reassembly command.
pub fn reassembly_command(
    frames_dir: &Path,
    original: &Path,
    output: &Path,
    options: &ReassembleOptions,
) -> FfmpegCommand {
    // libx264 + yuv420p needs even dimensions
    let mut filters = vec!["scale=trunc(iw/2)*2:trunc(ih/2)*2".to_string()];
    if options.interpolate_to_source && options.source_fps > options.frame_rate + RATE_EPSILON {
        filters.push(format!(
            "minterpolate=fps={}:mi_mode=mci",
            format_rate(options.source_fps)
        ));
    }

    let cmd = FfmpegCommand::new(frames_dir.join(FRAME_FILE_PATTERN), output)
        .input_frame_rate(options.frame_rate)
        .input_args(["-start_number", "1"])
        .add_input(original)
        .map("0:v:0");

    let cmd = if options.copy_audio {
        cmd.map("1:a:0").audio_codec("copy")
    } else {
        cmd.no_audio()
    };

    cmd.video_filter(filters.join(","))
        .video_codec(OUTPUT_VIDEO_CODEC)
        .preset(OUTPUT_PRESET)
        .crf(OUTPUT_CRF)
        .pixel_format(OUTPUT_PIXEL_FORMAT)
        .output_args(["-movflags", "+faststart"])
}

/// Mux the frame sequence in `frames_dir` with the audio of `original`.
pub async fn reassemble(
    runner: &FfmpegRunner,
    frames_dir: &Path,
    original: &Path,
    output: &Path,
    frame_count: usize,
    options: &ReassembleOptions,
) -> MediaResult<PathBuf> {
    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    let cmd = reassembly_command(frames_dir, original, output, options);
    let total = frame_count as u64;
    runner
        .run_with_progress(&cmd, move |progress| {
            debug!(
                frame = progress.frame,
                percent = format!("{:.0}", progress.frame_percentage(total)),
                eta_secs = ?progress.eta_seconds(total),
                "Reassembling"
            );
        })
        .await?;

    if !output.exists() {
        return Err(MediaError::ffmpeg_failed(
            "FFmpeg reported success but produced no output",
            None,
            None,
        ));
    }

    info!(
        frames = frame_count,
        audio_copied = options.copy_audio,
        "Reassembled {}",
        output.display()
    );
    Ok(output.to_path_buf())
}
