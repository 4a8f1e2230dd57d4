//! Structured critique of an enhanced frame.
//!
//! This is the fixed internal shape; provider payloads are coerced into it
//! at the AI client boundary and nothing downstream sees raw responses.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Whether a remaining issue can be fixed locally or needs another full pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum IssueScope {
    /// Localized defect fixed with a region-constrained edit
    Surgical,
    /// Frame-wide defect fixed by resubmitting for enhancement
    Global,
}

/// One remaining defect reported by the critique service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CritiqueIssue {
    /// Human-readable description of the defect
    pub description: String,
    /// Region descriptor (free text, e.g. "upper-left face"); empty for global issues
    #[serde(default)]
    pub region: String,
    /// Scope of the fix
    pub scope: IssueScope,
}

impl CritiqueIssue {
    pub fn surgical(description: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            region: region.into(),
            scope: IssueScope::Surgical,
        }
    }

    pub fn global(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            region: String::new(),
            scope: IssueScope::Global,
        }
    }

    pub fn is_surgical(&self) -> bool {
        self.scope == IssueScope::Surgical
    }
}

/// Quality score plus remaining issues for one edited frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Critique {
    /// Quality score in [0, 10]
    pub score: f64,
    /// Remaining issues, possibly empty
    #[serde(default)]
    pub issues: Vec<CritiqueIssue>,
}

impl Critique {
    /// Minimum valid score.
    pub const MIN_SCORE: f64 = 0.0;
    /// Maximum valid score.
    pub const MAX_SCORE: f64 = 10.0;

    /// Create a critique, clamping the score into range.
    pub fn new(score: f64, issues: Vec<CritiqueIssue>) -> Self {
        let score = if score.is_finite() {
            score.clamp(Self::MIN_SCORE, Self::MAX_SCORE)
        } else {
            Self::MIN_SCORE
        };
        Self { score, issues }
    }

    /// Critique with no remaining issues.
    pub fn clean(score: f64) -> Self {
        Self::new(score, Vec::new())
    }

    pub fn meets_target(&self, target: f64) -> bool {
        self.score >= target
    }

    pub fn has_issues(&self) -> bool {
        !self.issues.is_empty()
    }

    pub fn has_surgical_issues(&self) -> bool {
        self.issues.iter().any(CritiqueIssue::is_surgical)
    }

    /// Issues fixable with region-constrained edits.
    pub fn surgical_issues(&self) -> impl Iterator<Item = &CritiqueIssue> {
        self.issues.iter().filter(|issue| issue.is_surgical())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_clamped() {
        assert_eq!(Critique::clean(12.0).score, 10.0);
        assert_eq!(Critique::clean(-1.0).score, 0.0);
        assert_eq!(Critique::clean(f64::NAN).score, 0.0);
    }

    #[test]
    fn test_surgical_detection() {
        let critique = Critique::new(
            5.0,
            vec![
                CritiqueIssue::global("flat contrast"),
                CritiqueIssue::surgical("warped hand", "bottom right"),
            ],
        );
        assert!(critique.has_surgical_issues());
        assert_eq!(critique.surgical_issues().count(), 1);
        assert!(!critique.meets_target(8.5));
    }

    #[test]
    fn test_scope_serializes_snake_case() {
        let json = serde_json::to_string(&IssueScope::Surgical).unwrap();
        assert_eq!(json, "\"surgical\"");
    }
}
