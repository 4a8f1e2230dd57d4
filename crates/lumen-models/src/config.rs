//! Caller-facing enhancement configuration.

use std::time::Duration;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Default maximum accepted input duration (seconds).
pub const DEFAULT_MAX_DURATION_SECS: f64 = 60.0;
/// Default histogram similarity below which a new group starts.
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.92;
/// Default hard cap on enhance/surgical iterations per group.
pub const DEFAULT_MAX_ITERATIONS: u32 = 3;
/// Default critique score at which a group is accepted.
pub const DEFAULT_QUALITY_TARGET: f64 = 8.5;
/// Default number of groups enhanced concurrently.
pub const DEFAULT_CONCURRENCY: usize = 5;
/// Default histogram bins per channel.
pub const DEFAULT_HISTOGRAM_BINS: usize = 32;
/// Default LUT lattice points per channel.
pub const DEFAULT_LUT_LEVELS: usize = 32;
/// Upper bound on histogram bins per channel (64^3 bins per frame).
pub const MAX_HISTOGRAM_BINS: usize = 64;
/// Upper bound on LUT lattice points per channel.
pub const MAX_LUT_LEVELS: usize = 64;
/// Default maximum accepted input file size (bytes).
pub const DEFAULT_MAX_SIZE_BYTES: u64 = 512 * 1024 * 1024;
/// Default upper bound on extracted frames per run.
pub const DEFAULT_MAX_FRAMES: usize = 600;
/// Default wall-clock budget for one run (seconds).
pub const DEFAULT_BUDGET_SECS: u64 = 1800;

/// Instruction sent with every enhancement pass.
pub const DEFAULT_ENHANCEMENT_INSTRUCTION: &str = "Enhance this video frame to look like a \
high-end photograph: improve dynamic range, colour grading, clarity and fine detail. \
Keep the exact composition, framing, subject positions and image dimensions unchanged. \
Do not add, remove or move any objects.";

/// Instruction sent with every surgical region edit.
pub const DEFAULT_SURGICAL_INSTRUCTION: &str = "Fix only the described region so it looks \
natural and photographic. Leave every pixel outside the region untouched.";

/// Configuration for one `enhance_video` run.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Validate)]
pub struct EnhanceConfig {
    /// Inputs longer than this are rejected as not cost-effective.
    #[serde(default = "default_max_duration")]
    #[validate(range(min = 0.1))]
    pub max_duration_seconds: f64,

    /// Inputs larger than this many bytes are rejected as not cost-effective.
    #[serde(default = "default_max_size")]
    #[validate(range(min = 1))]
    pub max_size_bytes: u64,

    /// Explicit extraction rate; derived from the source when unset.
    #[serde(default)]
    #[validate(range(min = 0.1, max = 240.0))]
    pub extraction_frame_rate: Option<f64>,

    /// Consecutive-frame similarity below which a new group starts.
    #[serde(default = "default_threshold")]
    #[validate(range(min = -1.0, max = 1.0))]
    pub group_similarity_threshold: f64,

    /// Hard cap on enhance/surgical iterations per group.
    #[serde(default = "default_max_iterations")]
    #[validate(range(min = 1, max = 10))]
    pub max_iterations_per_group: u32,

    /// Critique score at which a group is accepted.
    #[serde(default = "default_quality_target")]
    #[validate(range(min = 0.0, max = 10.0))]
    pub quality_score_target: f64,

    /// Number of groups enhanced concurrently.
    #[serde(default = "default_concurrency")]
    #[validate(range(min = 1, max = 64))]
    pub concurrency: usize,

    /// Histogram bins per channel.
    #[serde(default = "default_histogram_bins")]
    #[validate(range(min = 2, max = 64))]
    pub histogram_bins: usize,

    /// LUT lattice points per channel.
    #[serde(default = "default_lut_levels")]
    #[validate(range(min = 2, max = 64))]
    pub lut_levels: usize,

    /// Upper bound on extracted frames; drives the extraction-rate policy.
    #[serde(default = "default_max_frames")]
    #[validate(range(min = 1))]
    pub max_frames: usize,

    /// Wall-clock budget for the whole run, in seconds.
    #[serde(default = "default_budget_secs")]
    #[validate(range(min = 1))]
    pub wall_clock_budget_secs: u64,

    /// Upsample back to the source frame rate on reassembly.
    #[serde(default)]
    pub interpolate_to_source_rate: bool,

    /// Write each group's LUT as a `.cube` file into the work directory.
    #[serde(default)]
    pub export_luts: bool,

    /// Instruction for enhancement passes.
    #[serde(default = "default_enhancement_instruction")]
    #[validate(length(min = 1))]
    pub enhancement_instruction: String,

    /// Instruction for surgical region edits.
    #[serde(default = "default_surgical_instruction")]
    #[validate(length(min = 1))]
    pub surgical_instruction: String,
}

fn default_max_duration() -> f64 {
    DEFAULT_MAX_DURATION_SECS
}
fn default_max_size() -> u64 {
    DEFAULT_MAX_SIZE_BYTES
}
fn default_threshold() -> f64 {
    DEFAULT_SIMILARITY_THRESHOLD
}
fn default_max_iterations() -> u32 {
    DEFAULT_MAX_ITERATIONS
}
fn default_quality_target() -> f64 {
    DEFAULT_QUALITY_TARGET
}
fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}
fn default_histogram_bins() -> usize {
    DEFAULT_HISTOGRAM_BINS
}
fn default_lut_levels() -> usize {
    DEFAULT_LUT_LEVELS
}
fn default_max_frames() -> usize {
    DEFAULT_MAX_FRAMES
}
fn default_budget_secs() -> u64 {
    DEFAULT_BUDGET_SECS
}
fn default_enhancement_instruction() -> String {
    DEFAULT_ENHANCEMENT_INSTRUCTION.to_string()
}
fn default_surgical_instruction() -> String {
    DEFAULT_SURGICAL_INSTRUCTION.to_string()
}

impl Default for EnhanceConfig {
    fn default() -> Self {
        Self {
            max_duration_seconds: DEFAULT_MAX_DURATION_SECS,
            max_size_bytes: DEFAULT_MAX_SIZE_BYTES,
            extraction_frame_rate: None,
            group_similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            max_iterations_per_group: DEFAULT_MAX_ITERATIONS,
            quality_score_target: DEFAULT_QUALITY_TARGET,
            concurrency: DEFAULT_CONCURRENCY,
            histogram_bins: DEFAULT_HISTOGRAM_BINS,
            lut_levels: DEFAULT_LUT_LEVELS,
            max_frames: DEFAULT_MAX_FRAMES,
            wall_clock_budget_secs: DEFAULT_BUDGET_SECS,
            interpolate_to_source_rate: false,
            export_luts: false,
            enhancement_instruction: default_enhancement_instruction(),
            surgical_instruction: default_surgical_instruction(),
        }
    }
}

impl EnhanceConfig {
    /// Wall-clock budget as a `Duration`.
    pub fn wall_clock_budget(&self) -> Duration {
        Duration::from_secs(self.wall_clock_budget_secs)
    }
}
