//! Group-local degradation notices.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Which external step failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ServiceStep {
    Enhance,
    Critique,
    SurgicalEdit,
}

impl ServiceStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceStep::Enhance => "enhance",
            ServiceStep::Critique => "critique",
            ServiceStep::SurgicalEdit => "surgical_edit",
        }
    }
}

/// Why a group fell back to a lower-quality result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DegradationReason {
    /// An external call failed twice; best-known edit accepted.
    ServiceFailure { step: ServiceStep, message: String },
    /// Critique payload could not be parsed twice; group treated as satisfied.
    MalformedCritique { message: String },
    /// Enhanced representative changed geometry; rest of group left unchanged.
    GeometryMismatch {
        expected: (u32, u32),
        actual: (u32, u32),
    },
    /// Wall-clock budget expired before the group reached a natural stop.
    BudgetExpired,
    /// Colour transform could not be built or applied for another reason.
    TransformFailed { message: String },
}

impl DegradationReason {
    /// Stable label for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            DegradationReason::ServiceFailure { .. } => "service_failure",
            DegradationReason::MalformedCritique { .. } => "malformed_critique",
            DegradationReason::GeometryMismatch { .. } => "geometry_mismatch",
            DegradationReason::BudgetExpired => "budget_expired",
            DegradationReason::TransformFailed { .. } => "transform_failed",
        }
    }
}

/// A per-group fallback reported to the caller alongside the output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GroupDegradationNotice {
    /// Group position in the partition
    pub group_index: usize,
    /// First frame of the group
    pub start: usize,
    /// One past the last frame of the group
    pub end: usize,
    pub reason: DegradationReason,
}
