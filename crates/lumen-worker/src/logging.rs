//! Structured run logging utilities.
//!
//! Provides consistent, structured logging for enhancement runs with
//! tracing spans and contextual information.

use tracing::{error, info, warn, Span};

use lumen_models::RunId;

/// Run logger for structured logging with consistent formatting.
///
/// Tags every lifecycle event with the run ID and the stage it belongs to.
#[derive(Debug, Clone)]
pub struct RunLogger {
    run_id: String,
    stage: String,
}

impl RunLogger {
    /// Create a new run logger for a specific run and stage.
    ///
    /// # Arguments
    /// * `run_id` - The unique identifier for the run
    /// * `stage` - The pipeline stage (e.g., "extract", "enhance_groups")
    pub fn new(run_id: &RunId, stage: &str) -> Self {
        Self {
            run_id: run_id.to_string(),
            stage: stage.to_string(),
        }
    }

    /// Same run, another stage.
    pub fn for_stage(&self, stage: &str) -> Self {
        Self {
            run_id: self.run_id.clone(),
            stage: stage.to_string(),
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(
            run_id = %self.run_id,
            stage = %self.stage,
            "Run started: {}", message
        );
    }

    pub fn log_progress(&self, message: &str) {
        info!(
            run_id = %self.run_id,
            stage = %self.stage,
            "Run progress: {}", message
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            run_id = %self.run_id,
            stage = %self.stage,
            "Run warning: {}", message
        );
    }

    pub fn log_error(&self, message: &str) {
        error!(
            run_id = %self.run_id,
            stage = %self.stage,
            "Run error: {}", message
        );
    }

    pub fn log_completion(&self, message: &str) {
        info!(
            run_id = %self.run_id,
            stage = %self.stage,
            "Run completed: {}", message
        );
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn stage(&self) -> &str {
        &self.stage
    }

    /// Create a tracing span for this run.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "run",
            run_id = %self.run_id,
            stage = %self.stage
        )
    }
}
