//! End-to-end enhancement run: probe, extract, group, enhance, reassemble.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio::sync::{watch, Semaphore};
use tracing::Instrument;
use validator::Validate;

use lumen_ai::AiServices;
use lumen_media::{
    extract_frames, extraction_rate, group_frames, probe_video, reassemble, FfmpegRunner,
    ReassembleOptions, VideoInfo,
};
use lumen_models::{EnhanceConfig, EnhancementReport, RunId};

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::group_stage::GroupStage;
use crate::logging::RunLogger;
use crate::metrics;
use crate::orchestrator::{Orchestrator, OrchestratorSettings};
use crate::retry::RetryConfig;

/// Enhance `input` into `output` with the given services.
pub async fn enhance_video(
    input: &Path,
    output: &Path,
    config: &WorkerConfig,
    services: AiServices,
) -> WorkerResult<EnhancementReport> {
    Pipeline::new(config.clone(), services)
        .run(RunId::new(), input, output)
        .await
}

/// Runs enhancement jobs against one configuration and service bundle.
pub struct Pipeline {
    config: WorkerConfig,
    services: AiServices,
    runner: FfmpegRunner,
    /// Shared across runs so concurrent runs respect one call ceiling
    limiter: Arc<Semaphore>,
}

impl Pipeline {
    pub fn new(config: WorkerConfig, services: AiServices) -> Self {
        let runner = FfmpegRunner::new().with_timeout(config.ffmpeg_timeout.as_secs());
        let limiter = Arc::new(Semaphore::new(config.max_ai_calls.max(1)));
        Self {
            config,
            services,
            runner,
            limiter,
        }
    }

    /// Abort FFmpeg work when `cancel_rx` flips to true.
    pub fn with_cancel(mut self, cancel_rx: watch::Receiver<bool>) -> Self {
        self.runner = self.runner.with_cancel(cancel_rx);
        self
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Run one job; the work directory is removed afterwards unless
    /// `keep_work_dir` is set.
    pub async fn run(
        &self,
        run_id: RunId,
        input: &Path,
        output: &Path,
    ) -> WorkerResult<EnhancementReport> {
        let logger = RunLogger::new(&run_id, "enhance_video");
        let span = logger.create_span();
        self.run_inner(run_id, input, output, &logger)
            .instrument(span)
            .await
    }

    async fn run_inner(
        &self,
        run_id: RunId,
        input: &Path,
        output: &Path,
        logger: &RunLogger,
    ) -> WorkerResult<EnhancementReport> {
        let started_at = Utc::now();
        let started = Instant::now();
        let deadline = tokio::time::Instant::now() + self.config.enhance.wall_clock_budget();

        self.config.enhance.validate()?;
        logger.log_start(&input.display().to_string());

        let info = probe_video(input).await?;
        if let Err(e) = check_cost(&info, &self.config.enhance) {
            logger.log_warning(&format!("Rejecting input: {}", e));
            return Err(e);
        }

        let run_dir = self.config.run_dir(run_id.short());
        let result = self
            .process(&run_id, &info, input, output, &run_dir, deadline, logger)
            .await;

        if !self.config.keep_work_dir {
            if let Err(e) = tokio::fs::remove_dir_all(&run_dir).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    logger.log_warning(&format!(
                        "Failed to remove work dir {}: {}",
                        run_dir.display(),
                        e
                    ));
                }
            }
        }

        let (extraction_rate, frame_count, stage) = match result {
            Ok(done) => done,
            Err(e) => {
                match &e {
                    WorkerError::Media(media) if media.is_tool_failure() => {
                        logger.log_error(&format!("FFmpeg invocation failed: {}", media))
                    }
                    _ => logger.log_error(&e.to_string()),
                }
                return Err(e);
            }
        };

        let report = EnhancementReport {
            run_id,
            output_path: output.display().to_string(),
            source: info.summary(),
            extraction_rate,
            frame_count,
            groups: stage.groups,
            degradations: stage.degradations,
            started_at,
            finished_at: Utc::now(),
        };

        let elapsed = started.elapsed().as_secs_f64();
        metrics::record_run_duration(elapsed, report.is_degraded());
        logger.log_completion(&format!(
            "{} frames, {} groups, {} iterations, {} degradations in {:.1}s",
            report.frame_count,
            report.groups.len(),
            report.total_iterations(),
            report.degradations.len(),
            elapsed
        ));
        Ok(report)
    }

    #[allow(clippy::too_many_arguments)]
    async fn process(
        &self,
        run_id: &RunId,
        info: &VideoInfo,
        input: &Path,
        output: &Path,
        run_dir: &Path,
        deadline: tokio::time::Instant,
        logger: &RunLogger,
    ) -> WorkerResult<(f64, usize, crate::group_stage::StageOutput)> {
        let enhance = &self.config.enhance;
        let frames_dir = run_dir.join("frames");
        let edited_dir = run_dir.join("edited");

        let rate = extraction_rate(info, enhance);
        let frames = extract_frames(&self.runner, info, input, rate, &frames_dir).await?;
        let frame_count = frames.len();

        let (threshold, bins) = (enhance.group_similarity_threshold, enhance.histogram_bins);
        let for_grouping = frames.clone();
        let groups = tokio::task::spawn_blocking(move || group_frames(&for_grouping, threshold, bins))
            .await
            .map_err(|e| WorkerError::processing_failed(format!("grouping task failed: {}", e)))??;

        logger.for_stage("group").log_progress(&format!(
            "{} frames at {:.3} fps in {} groups",
            frame_count,
            rate,
            groups.len()
        ));

        let retry = RetryConfig::new(format!("ai_call:{}", run_id.short()))
            .with_base_delay(self.config.retry_base_delay);
        let orchestrator = Orchestrator::new(
            self.services.clone(),
            Arc::clone(&self.limiter),
            OrchestratorSettings::from_config(enhance, retry),
        )
        .with_deadline(deadline);

        let stage = GroupStage {
            orchestrator,
            output_dir: edited_dir.clone(),
            lut_levels: enhance.lut_levels,
            lut_dir: enhance.export_luts.then(|| lut_dir(run_dir)),
            concurrency: enhance.concurrency,
        };
        let stage_output = stage.run(frames, groups).await?;

        logger.for_stage("reassemble").log_progress(&format!(
            "Muxing {} frames into {}",
            frame_count,
            output.display()
        ));
        let options = ReassembleOptions {
            frame_rate: rate,
            source_fps: info.fps,
            copy_audio: info.has_audio,
            interpolate_to_source: enhance.interpolate_to_source_rate,
        };
        reassemble(&self.runner, &edited_dir, input, output, frame_count, &options).await?;

        Ok((rate, frame_count, stage_output))
    }
}

fn lut_dir(run_dir: &Path) -> PathBuf {
    run_dir.join("luts")
}

/// Reject inputs too long or too large to be worth the AI spend.
fn check_cost(info: &VideoInfo, config: &EnhanceConfig) -> WorkerResult<()> {
    if info.duration > config.max_duration_seconds {
        return Err(WorkerError::not_cost_effective(
            info.duration,
            config.max_duration_seconds,
        ));
    }
    if info.size > config.max_size_bytes {
        return Err(WorkerError::too_large(info.size, config.max_size_bytes));
    }
    Ok(())
}
