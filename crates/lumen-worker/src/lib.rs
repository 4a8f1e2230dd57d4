//! Video enhancement worker.
//!
//! This crate provides:
//! - The end-to-end `enhance_video` pipeline
//! - The per-group enhance/critique/surgical-edit loop
//! - Concurrent group processing and colour-transform propagation
//! - Retry, logging and metrics helpers

pub mod config;
pub mod error;
pub mod group_stage;
pub mod logging;
pub mod metrics;
pub mod orchestrator;
pub mod pipeline;
pub mod pool;
pub mod retry;

#[cfg(test)]
mod test_support;

pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use group_stage::{GroupStage, StageOutput};
pub use logging::RunLogger;
pub use orchestrator::{GroupOutcome, Orchestrator, OrchestratorSettings};
pub use pipeline::{enhance_video, Pipeline};
pub use retry::RetryConfig;
