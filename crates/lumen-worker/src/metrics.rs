//! Enhancement metrics.
//!
//! Recorded through the `metrics` facade; the embedding process installs
//! whichever recorder/exporter it wants. Without one these are no-ops.

use metrics::{counter, histogram};

use lumen_models::{DegradationReason, ServiceStep, StopReason};

/// Metric names as constants for consistency.
pub mod names {
    pub const AI_CALLS_TOTAL: &str = "lumen_ai_calls_total";
    pub const GROUP_ITERATIONS: &str = "lumen_group_iterations";
    pub const GROUPS_TOTAL: &str = "lumen_groups_total";
    pub const DEGRADATIONS_TOTAL: &str = "lumen_degradations_total";
    pub const RUN_DURATION_SECONDS: &str = "lumen_run_duration_seconds";
}

/// Record one AI call (after retries) and whether it succeeded.
pub fn record_ai_call(step: ServiceStep, success: bool) {
    let labels = [
        ("service", step.as_str().to_string()),
        ("outcome", if success { "ok" } else { "error" }.to_string()),
    ];
    counter!(names::AI_CALLS_TOTAL, &labels).increment(1);
}

/// Record a group reaching a terminal state.
pub fn record_group(stop_reason: StopReason, iterations: u32) {
    let labels = [("stop_reason", stop_reason.as_str().to_string())];
    counter!(names::GROUPS_TOTAL, &labels).increment(1);
    histogram!(names::GROUP_ITERATIONS).record(iterations as f64);
}

pub fn record_degradation(reason: &DegradationReason) {
    let labels = [("reason", reason.label().to_string())];
    counter!(names::DEGRADATIONS_TOTAL, &labels).increment(1);
}

pub fn record_run_duration(duration_secs: f64, degraded: bool) {
    let labels = [("degraded", degraded.to_string())];
    histogram!(names::RUN_DURATION_SECONDS, &labels).record(duration_secs);
}
