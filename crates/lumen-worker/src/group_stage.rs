//! Concurrent per-group stage: enhance the representative, derive the
//! group's colour transform and write every frame of the group.
//!
//! Each group owns its frame range, its transform and its output files, so
//! workers share nothing but the orchestrator's AI call limiter. Frames are
//! written under their original sequence index, which keeps temporal order
//! intact however groups interleave.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::{imageops, imageops::FilterType, RgbImage};
use tracing::{debug, info, warn};

use lumen_media::frames::save_frame;
use lumen_media::{ColorTransform, FrameRef, MediaError};
use lumen_models::encoding::frame_file_name;
use lumen_models::{DegradationReason, FrameGroup, GroupDegradationNotice, GroupReport};

use crate::error::{WorkerError, WorkerResult};
use crate::metrics;
use crate::orchestrator::{GroupOutcome, Orchestrator};
use crate::pool::run_ordered;

/// Settings and collaborators for the group stage.
pub struct GroupStage {
    pub orchestrator: Orchestrator,
    /// Directory receiving `frame_%06d.png` for every frame
    pub output_dir: PathBuf,
    pub lut_levels: usize,
    /// Write `group_<n>.cube` files here when set
    pub lut_dir: Option<PathBuf>,
    /// Groups processed concurrently
    pub concurrency: usize,
}

/// Reports for every group, in temporal order.
#[derive(Debug, Default)]
pub struct StageOutput {
    pub groups: Vec<GroupReport>,
    pub degradations: Vec<GroupDegradationNotice>,
}

impl GroupStage {
    /// Process every group and write the full edited frame sequence.
    pub async fn run(self, frames: Vec<FrameRef>, groups: Vec<FrameGroup>) -> WorkerResult<StageOutput> {
        let invalid = groups
            .iter()
            .find(|g| g.is_empty() || g.end > frames.len() || !g.contains(g.representative));
        if let Some(group) = invalid {
            return Err(WorkerError::processing_failed(format!(
                "group {} [{}, {}) with representative {} does not fit {} frames",
                group.index,
                group.start,
                group.end,
                group.representative,
                frames.len()
            )));
        }

        tokio::fs::create_dir_all(&self.output_dir).await?;
        if let Some(dir) = &self.lut_dir {
            tokio::fs::create_dir_all(dir).await?;
        }

        let concurrency = self.concurrency;
        let stage = Arc::new(self);
        let frames = Arc::new(frames);

        let results = run_ordered(groups, concurrency, move |group| {
            let stage = Arc::clone(&stage);
            let frames = Arc::clone(&frames);
            async move { stage.process_group(&frames, group).await }
        })
        .await?;

        let mut output = StageOutput::default();
        for result in results {
            let (report, notices) = result?;
            output.groups.push(report);
            output.degradations.extend(notices);
        }
        Ok(output)
    }

    async fn process_group(
        &self,
        frames: &Arc<Vec<FrameRef>>,
        group: FrameGroup,
    ) -> WorkerResult<(GroupReport, Vec<GroupDegradationNotice>)> {
        let (outcome, original) = if self.orchestrator.budget_expired() {
            debug!(group = group.index, "Budget expired, leaving group unchanged");
            (GroupOutcome::skipped(DegradationReason::BudgetExpired), None)
        } else {
            let representative = frames[group.representative].clone();
            let original = tokio::task::spawn_blocking(move || representative.load_pixels())
                .await
                .map_err(|e| WorkerError::processing_failed(format!("frame load task failed: {}", e)))??;
            let outcome = self.orchestrator.run(group.index, &original).await;
            (outcome, Some(original))
        };

        let frames = Arc::clone(frames);
        let output_dir = self.output_dir.clone();
        let lut_dir = self.lut_dir.clone();
        let levels = self.lut_levels;
        let (outcome, extra) = tokio::task::spawn_blocking(move || {
            let written = write_group(
                &frames[group.start..group.end],
                &group,
                original.as_ref(),
                &outcome,
                &output_dir,
                lut_dir.as_deref(),
                levels,
            );
            written.map(|extra| (outcome, extra))
        })
        .await
        .map_err(|e| WorkerError::processing_failed(format!("group write task failed: {}", e)))??;

        let report = GroupReport {
            index: group.index,
            start: group.start,
            end: group.end,
            representative: group.representative,
            iterations: outcome.iterations,
            final_score: outcome.final_score,
            stop_reason: outcome.stop_reason,
            edited: outcome.is_edited(),
        };

        let notices: Vec<GroupDegradationNotice> = outcome
            .degradations
            .into_iter()
            .chain(extra)
            .map(|reason| {
                metrics::record_degradation(&reason);
                GroupDegradationNotice {
                    group_index: group.index,
                    start: group.start,
                    end: group.end,
                    reason,
                }
            })
            .collect();

        Ok((report, notices))
    }
}

/// Write one group's frames; returns degradations found while doing so.
///
/// `frames` is the group's slice of the sequence.
fn write_group(
    frames: &[FrameRef],
    group: &FrameGroup,
    original: Option<&RgbImage>,
    outcome: &GroupOutcome,
    output_dir: &Path,
    lut_dir: Option<&Path>,
    levels: usize,
) -> WorkerResult<Vec<DegradationReason>> {
    let mut degradations = Vec::new();

    let (Some(original), Some(graded), Some(representative)) = (
        original,
        outcome.graded.as_ref(),
        outcome.representative.as_ref(),
    ) else {
        for frame in frames {
            copy_unchanged(frame, output_dir)?;
        }
        return Ok(degradations);
    };

    let transform = match ColorTransform::build(original, graded, levels) {
        Ok(transform) => Some(transform),
        Err(MediaError::GeometryMismatch { expected, actual }) => {
            warn!(
                group = group.index,
                ?expected,
                ?actual,
                "Enhanced frame changed geometry, propagating identity"
            );
            degradations.push(DegradationReason::GeometryMismatch { expected, actual });
            None
        }
        Err(e) => {
            warn!(group = group.index, "Transform build failed: {}", e);
            degradations.push(DegradationReason::TransformFailed {
                message: e.to_string(),
            });
            None
        }
    };

    // The representative keeps its own edit, surgical fixes included
    let representative = fit_to(representative, original.dimensions());
    save_frame(&representative, output_dir, group.representative)?;

    for frame in frames.iter().filter(|f| f.index != group.representative) {
        match &transform {
            Some(transform) => {
                let pixels = frame.load_pixels()?;
                save_frame(&transform.apply(&pixels), output_dir, frame.index)?;
            }
            None => copy_unchanged(frame, output_dir)?,
        }
    }

    if let (Some(dir), Some(transform)) = (lut_dir, &transform) {
        let path = dir.join(format!("group_{}.cube", group.index));
        std::fs::write(&path, transform.to_cube(&format!("lumen group {}", group.index)))?;
        debug!(group = group.index, path = %path.display(), "Exported LUT");
    }

    info!(
        group = group.index,
        frames = frames.len(),
        observed_nodes = transform.as_ref().map(|t| t.observed_nodes()).unwrap_or(0),
        "Group written"
    );
    Ok(degradations)
}

fn copy_unchanged(frame: &FrameRef, output_dir: &Path) -> WorkerResult<()> {
    std::fs::copy(&frame.path, output_dir.join(frame_file_name(frame.index)))?;
    Ok(())
}

/// Resize to `dimensions` when an edit changed the frame size.
fn fit_to(image: &RgbImage, dimensions: (u32, u32)) -> RgbImage {
    if image.dimensions() == dimensions {
        image.clone()
    } else {
        imageops::resize(image, dimensions.0, dimensions.1, FilterType::Lanczos3)
    }
}
