//! Worker configuration.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use lumen_models::EnhanceConfig;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Root for per-run work directories
    pub work_dir: String,
    /// Keep the run's work directory (frames, LUTs) after completion
    pub keep_work_dir: bool,
    /// Maximum concurrent outbound AI calls across all groups
    pub max_ai_calls: usize,
    /// Base delay before retrying a failed AI call
    pub retry_base_delay: Duration,
    /// Timeout for a single FFmpeg invocation
    pub ffmpeg_timeout: Duration,
    /// Per-run enhancement settings
    pub enhance: EnhanceConfig,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            work_dir: "/tmp/lumen".to_string(),
            keep_work_dir: false,
            max_ai_calls: 4,
            retry_base_delay: Duration::from_millis(500),
            ffmpeg_timeout: Duration::from_secs(1800), // 30 minutes
            enhance: EnhanceConfig::default(),
        }
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            work_dir: std::env::var("LUMEN_WORK_DIR").unwrap_or(defaults.work_dir),
            keep_work_dir: env_parse("LUMEN_KEEP_WORK_DIR").unwrap_or(defaults.keep_work_dir),
            max_ai_calls: env_parse("LUMEN_MAX_AI_CALLS").unwrap_or(defaults.max_ai_calls),
            retry_base_delay: env_parse("LUMEN_RETRY_BASE_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.retry_base_delay),
            ffmpeg_timeout: env_parse("LUMEN_FFMPEG_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.ffmpeg_timeout),
            enhance: enhance_config_from_env(defaults.enhance),
        }
    }

    /// Work directory for one run.
    pub fn run_dir(&self, run_short_id: &str) -> PathBuf {
        PathBuf::from(&self.work_dir).join(format!("run-{}", run_short_id))
    }
}

/// Apply `LUMEN_*` overrides on top of `base`.
pub fn enhance_config_from_env(base: EnhanceConfig) -> EnhanceConfig {
    EnhanceConfig {
        max_duration_seconds: env_parse("LUMEN_MAX_DURATION_SECS")
            .unwrap_or(base.max_duration_seconds),
        max_size_bytes: env_parse("LUMEN_MAX_SIZE_BYTES").unwrap_or(base.max_size_bytes),
        extraction_frame_rate: env_parse("LUMEN_FRAME_RATE").or(base.extraction_frame_rate),
        group_similarity_threshold: env_parse("LUMEN_SIMILARITY_THRESHOLD")
            .unwrap_or(base.group_similarity_threshold),
        max_iterations_per_group: env_parse("LUMEN_MAX_ITERATIONS")
            .unwrap_or(base.max_iterations_per_group),
        quality_score_target: env_parse("LUMEN_QUALITY_TARGET")
            .unwrap_or(base.quality_score_target),
        concurrency: env_parse("LUMEN_CONCURRENCY").unwrap_or(base.concurrency),
        wall_clock_budget_secs: env_parse("LUMEN_BUDGET_SECS")
            .unwrap_or(base.wall_clock_budget_secs),
        export_luts: env_parse("LUMEN_EXPORT_LUTS").unwrap_or(base.export_luts),
        ..base
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = WorkerConfig::default();
        assert_eq!(config.max_ai_calls, 4);
        assert!(!config.keep_work_dir);
        assert_eq!(config.enhance.max_iterations_per_group, 3);
    }

    #[test]
    fn test_run_dir() {
        let config = WorkerConfig {
            work_dir: "/work".to_string(),
            ..Default::default()
        };
        assert_eq!(config.run_dir("abcd1234"), PathBuf::from("/work/run-abcd1234"));
    }

    #[test]
    fn test_env_overrides() {
        // Only this test touches these variables
        std::env::set_var("LUMEN_QUALITY_TARGET", "9.25");
        std::env::set_var("LUMEN_MAX_ITERATIONS", "not-a-number");
        let config = enhance_config_from_env(EnhanceConfig::default());
        std::env::remove_var("LUMEN_QUALITY_TARGET");
        std::env::remove_var("LUMEN_MAX_ITERATIONS");

        assert!((config.quality_score_target - 9.25).abs() < 1e-9);
        assert_eq!(config.max_iterations_per_group, 3);
    }
}
