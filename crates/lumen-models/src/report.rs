//! Run and group outcome reports.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{GroupDegradationNotice, RunId};

/// Why a group's enhancement loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Critique score reached the quality target
    ScoreReached,
    /// Critique reported no remaining issues
    NoIssues,
    /// Iteration cap reached; last edit accepted
    IterationCap,
    /// Critique unparseable after retry; treated as satisfied
    CritiqueUnavailable,
    /// External call failed after retry; best-known edit accepted
    ServiceFailure,
    /// Wall-clock budget expired; latest edit (if any) accepted
    BudgetExpired,
}

impl StopReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            StopReason::ScoreReached => "score_reached",
            StopReason::NoIssues => "no_issues",
            StopReason::IterationCap => "iteration_cap",
            StopReason::CritiqueUnavailable => "critique_unavailable",
            StopReason::ServiceFailure => "service_failure",
            StopReason::BudgetExpired => "budget_expired",
        }
    }

    /// Natural stop conditions (no degradation involved).
    pub fn is_satisfied(&self) -> bool {
        matches!(self, StopReason::ScoreReached | StopReason::NoIssues)
    }
}

/// Summary of the source video.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SourceSummary {
    pub duration: f64,
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub has_audio: bool,
}

/// Outcome of one group.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GroupReport {
    pub index: usize,
    pub start: usize,
    pub end: usize,
    pub representative: usize,
    /// Enhance + surgical iterations consumed
    pub iterations: u32,
    /// Score of the accepted edit, when a critique succeeded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_score: Option<f64>,
    pub stop_reason: StopReason,
    /// False when the group's frames were written unchanged
    pub edited: bool,
}

/// Terminal artifact description of one run.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct EnhancementReport {
    pub run_id: RunId,
    pub output_path: String,
    pub source: SourceSummary,
    /// Rate frames were extracted at
    pub extraction_rate: f64,
    pub frame_count: usize,
    pub groups: Vec<GroupReport>,
    pub degradations: Vec<GroupDegradationNotice>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl EnhancementReport {
    /// Total AI iterations across all groups.
    pub fn total_iterations(&self) -> u32 {
        self.groups.iter().map(|g| g.iterations).sum()
    }

    pub fn is_degraded(&self) -> bool {
        !self.degradations.is_empty()
    }
}
