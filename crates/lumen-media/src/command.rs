//! FFmpeg command builder and runner.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::{MediaError, MediaResult};
use crate::progress::FfmpegProgress;

/// Number of non-progress stderr lines kept for error reports.
const STDERR_TAIL_LINES: usize = 20;

/// Distance from `N/1001` (in units of 1/1001 fps) still treated as NTSC.
const NTSC_TOLERANCE: f64 = 0.1;

/// One `-i` input with the arguments that precede it.
#[derive(Debug, Clone)]
struct FfmpegInput {
    path: PathBuf,
    args: Vec<String>,
}

/// Builder for FFmpeg commands.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    /// Inputs in `-i` order
    inputs: Vec<FfmpegInput>,
    /// Output file path (or printf-style pattern)
    output: PathBuf,
    /// Output arguments (after all inputs)
    output_args: Vec<String>,
    /// Whether to overwrite output
    overwrite: bool,
}

impl FfmpegCommand {
    /// Create a new FFmpeg command with a single input.
    pub fn new(input: impl AsRef<Path>, output: impl AsRef<Path>) -> Self {
        Self {
            inputs: vec![FfmpegInput {
                path: input.as_ref().to_path_buf(),
                args: Vec::new(),
            }],
            output: output.as_ref().to_path_buf(),
            output_args: Vec::new(),
            overwrite: true,
        }
    }

    /// Add input arguments to the most recently added input.
    pub fn input_arg(mut self, arg: impl Into<String>) -> Self {
        if let Some(input) = self.inputs.last_mut() {
            input.args.push(arg.into());
        }
        self
    }

    /// Add multiple input arguments to the most recently added input.
    pub fn input_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if let Some(input) = self.inputs.last_mut() {
            input.args.extend(args.into_iter().map(Into::into));
        }
        self
    }

    /// Append another input; subsequent `input_arg` calls apply to it.
    pub fn add_input(mut self, input: impl AsRef<Path>) -> Self {
        self.inputs.push(FfmpegInput {
            path: input.as_ref().to_path_buf(),
            args: Vec::new(),
        });
        self
    }

    /// Add output arguments (after -i).
    pub fn output_arg(mut self, arg: impl Into<String>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    /// Add multiple output arguments.
    pub fn output_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Read the current input as an image sequence at `fps`.
    pub fn input_frame_rate(self, fps: f64) -> Self {
        self.input_arg("-framerate").input_arg(format_rate(fps))
    }

    /// Set video filter.
    pub fn video_filter(self, filter: impl Into<String>) -> Self {
        self.output_arg("-vf").output_arg(filter)
    }

    /// Select a stream for the output (`-map`).
    pub fn map(self, spec: impl Into<String>) -> Self {
        self.output_arg("-map").output_arg(spec)
    }

    /// Set video codec.
    pub fn video_codec(self, codec: impl Into<String>) -> Self {
        self.output_arg("-c:v").output_arg(codec)
    }

    /// Set audio codec.
    pub fn audio_codec(self, codec: impl Into<String>) -> Self {
        self.output_arg("-c:a").output_arg(codec)
    }

    /// Drop audio from the output.
    pub fn no_audio(self) -> Self {
        self.output_arg("-an")
    }

    /// Set CRF (quality).
    pub fn crf(self, crf: u8) -> Self {
        self.output_arg("-crf").output_arg(crf.to_string())
    }

    /// Set preset.
    pub fn preset(self, preset: impl Into<String>) -> Self {
        self.output_arg("-preset").output_arg(preset)
    }

    /// Set output pixel format.
    pub fn pixel_format(self, pix_fmt: impl Into<String>) -> Self {
        self.output_arg("-pix_fmt").output_arg(pix_fmt)
    }

    /// Build the command arguments.
    pub fn build_args(&self) -> Vec<String> {
        let mut args = Vec::new();

        if self.overwrite {
            args.push("-y".to_string());
        }

        args.push("-v".to_string());
        args.push("error".to_string());

        // Progress output to stderr
        args.push("-progress".to_string());
        args.push("pipe:2".to_string());

        for input in &self.inputs {
            args.extend(input.args.iter().cloned());
            args.push("-i".to_string());
            args.push(input.path.to_string_lossy().to_string());
        }

        args.extend(self.output_args.iter().cloned());
        args.push(self.output.to_string_lossy().to_string());

        args
    }
}

/// Format a frame rate for FFmpeg without trailing noise ("30", "7.5").
///
/// NTSC-family rates come back from ffprobe as `N/1001` and are written
/// the same way, since any decimal rendering drifts over long clips.
pub fn format_rate(fps: f64) -> String {
    if fps.fract() != 0.0 {
        let numerator = (fps * 1001.0).round();
        if numerator % 1000.0 == 0.0 && (fps * 1001.0 - numerator).abs() < NTSC_TOLERANCE {
            return format!("{}/1001", numerator as u64);
        }
    }

    let formatted = format!("{:.3}", fps);
    formatted
        .trim_end_matches('0')
        .trim_end_matches('.')
        .to_string()
}

/// Runner for FFmpeg commands with progress tracking and cancellation.
pub struct FfmpegRunner {
    /// Cancellation signal receiver
    cancel_rx: Option<watch::Receiver<bool>>,
    /// Timeout in seconds
    timeout_secs: Option<u64>,
}

impl Default for FfmpegRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl FfmpegRunner {
    /// Create a new runner.
    pub fn new() -> Self {
        Self {
            cancel_rx: None,
            timeout_secs: None,
        }
    }

    /// Set cancellation signal.
    pub fn with_cancel(mut self, cancel_rx: watch::Receiver<bool>) -> Self {
        self.cancel_rx = Some(cancel_rx);
        self
    }

    /// Set timeout.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    /// Run an FFmpeg command.
    pub async fn run(&self, cmd: &FfmpegCommand) -> MediaResult<()> {
        self.run_with_progress(cmd, |_| {}).await
    }

    /// Run an FFmpeg command with progress callback.
    pub async fn run_with_progress<F>(
        &self,
        cmd: &FfmpegCommand,
        progress_callback: F,
    ) -> MediaResult<()>
    where
        F: Fn(FfmpegProgress) + Send + 'static,
    {
        which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)?;

        let args = cmd.build_args();
        debug!("Running FFmpeg: ffmpeg {}", args.join(" "));

        let mut child = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| MediaError::internal("FFmpeg stderr not captured"))?;
        let mut reader = BufReader::new(stderr).lines();

        // Progress lines go to the callback, everything else is kept as a tail
        let progress_handle = tokio::spawn(async move {
            let mut current_progress = FfmpegProgress::default();
            let mut tail: Vec<String> = Vec::new();

            while let Ok(Some(line)) = reader.next_line().await {
                match parse_progress_line(&line, &mut current_progress) {
                    ParsedLine::Progress(progress) => progress_callback(progress),
                    ParsedLine::Field => {}
                    ParsedLine::Other => {
                        if tail.len() == STDERR_TAIL_LINES {
                            tail.remove(0);
                        }
                        tail.push(line);
                    }
                }
            }
            tail
        });

        let result = self.wait_for_completion(&mut child).await;
        let tail = progress_handle.await.unwrap_or_default();

        result.map_err(|e| match e {
            MediaError::FfmpegFailed {
                message, exit_code, ..
            } => MediaError::FfmpegFailed {
                message,
                stderr: (!tail.is_empty()).then(|| tail.join("\n")),
                exit_code,
            },
            other => other,
        })
    }

    /// Wait for child process with cancellation and timeout.
    async fn wait_for_completion(&self, child: &mut Child) -> MediaResult<()> {
        let wait_future = child.wait();

        let wait_result = if let Some(timeout_secs) = self.timeout_secs {
            let timeout = tokio::time::timeout(
                std::time::Duration::from_secs(timeout_secs),
                wait_future,
            );
            match timeout.await {
                Ok(result) => result,
                Err(_) => {
                    warn!(
                        "FFmpeg timed out after {} seconds, killing process",
                        timeout_secs
                    );
                    let _ = child.kill().await;
                    return Err(MediaError::Timeout(timeout_secs));
                }
            }
        } else {
            wait_future.await
        };

        if let Some(ref cancel_rx) = self.cancel_rx {
            if *cancel_rx.borrow() {
                info!("FFmpeg cancelled, killing process");
                let _ = child.kill().await;
                return Err(MediaError::Cancelled);
            }
        }

        let status = wait_result?;

        if status.success() {
            Ok(())
        } else {
            Err(MediaError::ffmpeg_failed(
                "FFmpeg exited with non-zero status",
                None,
                status.code(),
            ))
        }
    }
}

/// Classification of one stderr line.
#[derive(Debug)]
enum ParsedLine {
    /// A `progress=` line closing a block
    Progress(FfmpegProgress),
    /// A `key=value` progress field
    Field,
    /// Regular log output
    Other,
}

/// Parse a line from FFmpeg's -progress output.
fn parse_progress_line(line: &str, current: &mut FfmpegProgress) -> ParsedLine {
    let line = line.trim();

    let Some((key, value)) = line.split_once('=') else {
        return ParsedLine::Other;
    };

    match key {
        "out_time_ms" | "out_time_us" => {
            if let Ok(us) = value.parse::<i64>() {
                current.out_time_ms = if key == "out_time_us" { us / 1000 } else { us };
            }
        }
        "out_time" => {
            current.out_time = value.to_string();
        }
        "frame" => {
            if let Ok(frame) = value.parse() {
                current.frame = frame;
            }
        }
        "fps" => {
            if let Ok(fps) = value.parse() {
                current.fps = fps;
            }
        }
        "speed" => {
            if let Some(speed) = value.strip_suffix('x').and_then(|s| s.trim().parse().ok()) {
                current.speed = speed;
            }
        }
        "progress" => {
            if value == "end" {
                current.is_complete = true;
            }
            return ParsedLine::Progress(current.clone());
        }
        "bitrate" | "total_size" | "dup_frames" | "drop_frames" | "stream_0_0_q" => {}
        _ => return ParsedLine::Other,
    }

    ParsedLine::Field
}

/// Check if FFmpeg is available.
pub fn check_ffmpeg() -> MediaResult<PathBuf> {
    which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)
}

/// Check if FFprobe is available.
pub fn check_ffprobe() -> MediaResult<PathBuf> {
    which::which("ffprobe").map_err(|_| MediaError::FfprobeNotFound)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_builder_multi_input() {
        let cmd = FfmpegCommand::new("frames/frame_%06d.png", "out.mp4")
            .input_frame_rate(30.0)
            .add_input("source.mp4")
            .map("0:v:0")
            .map("1:a:0")
            .video_codec("libx264")
            .audio_codec("copy")
            .crf(16);

        let args = cmd.build_args();
        let first_input = args.iter().position(|a| a == "-i").unwrap();
        let framerate = args.iter().position(|a| a == "-framerate").unwrap();
        assert!(framerate < first_input);
        assert_eq!(args[framerate + 1], "30");
        assert_eq!(args.iter().filter(|a| *a == "-i").count(), 2);
        assert!(args.contains(&"copy".to_string()));
        assert_eq!(args.last().unwrap(), "out.mp4");
    }

    #[test]
    fn test_format_rate() {
        assert_eq!(format_rate(30.0), "30");
        assert_eq!(format_rate(7.5), "7.5");
        assert_eq!(format_rate(12.345), "12.345");
    }

    #[test]
    fn test_format_rate_keeps_ntsc_rationals_exact() {
        assert_eq!(format_rate(30000.0 / 1001.0), "30000/1001");
        assert_eq!(format_rate(24000.0 / 1001.0), "24000/1001");
        assert_eq!(format_rate(60000.0 / 1001.0), "60000/1001");
        // Rounded decimals from ffprobe's avg_frame_rate land on the same ratio
        assert_eq!(format_rate(29.97), "30000/1001");
        assert_eq!(format_rate(23.976), "24000/1001");
        assert_eq!(format_rate(59.94), "60000/1001");
    }

    #[test]
    fn test_ntsc_frame_rate_in_image_sequence_args() {
        let cmd = FfmpegCommand::new("frames/frame_%06d.png", "out.mp4")
            .input_frame_rate(30000.0 / 1001.0);
        let args = cmd.build_args();
        let framerate = args.iter().position(|a| a == "-framerate").unwrap();
        assert_eq!(args[framerate + 1], "30000/1001");
    }

    #[test]
    fn test_progress_parsing() {
        let mut progress = FfmpegProgress::default();

        assert!(matches!(
            parse_progress_line("out_time_ms=5000000", &mut progress),
            ParsedLine::Field
        ));
        assert_eq!(progress.out_time_ms, 5000000);

        parse_progress_line("speed=1.5x", &mut progress);
        assert!((progress.speed - 1.5).abs() < 0.01);

        let result = parse_progress_line("progress=end", &mut progress);
        assert!(matches!(result, ParsedLine::Progress(_)));
        assert!(progress.is_complete);
    }

    #[test]
    fn test_non_progress_lines_are_other() {
        let mut progress = FfmpegProgress::default();
        assert!(matches!(
            parse_progress_line("Error opening input file", &mut progress),
            ParsedLine::Other
        ));
        assert!(matches!(
            parse_progress_line("[png @ 0x1] Invalid PNG signature", &mut progress),
            ParsedLine::Other
        ));
    }
}
