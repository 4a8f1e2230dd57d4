//! Shared data models for the Lumen enhancement pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Enhancement configuration
//! - Frame groups and representative selection
//! - Critique payloads (fixed internal shape)
//! - Degradation notices and run reports

pub mod config;
pub mod critique;
pub mod degradation;
pub mod encoding;
pub mod group;
pub mod report;
pub mod run;

// Re-export common types
pub use config::EnhanceConfig;
pub use critique::{Critique, CritiqueIssue, IssueScope};
pub use degradation::{DegradationReason, GroupDegradationNotice, ServiceStep};
pub use group::{FrameGroup, GroupError};
pub use report::{EnhancementReport, GroupReport, SourceSummary, StopReason};
pub use run::RunId;
