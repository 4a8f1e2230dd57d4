//! Per-group enhancement loop.
//!
//! ```text
//! Enhancing -> Analyzing -> Terminal                  (score >= target | no issues | cap)
//!                        -> SurgicalEdit -> Analyzing (any surgical issue)
//!                        -> GlobalRetry  -> Enhancing (only global issues)
//! ```
//!
//! The iteration counter increments on every `Enhancing` and `SurgicalEdit`
//! entry and never exceeds `max_iterations`. Every external call is retried
//! once; a second failure ends the group with the best frame obtained so far.
//! A critique that cannot be parsed twice ends the group as if satisfied.
//!
//! Two images come out of a group: `graded`, the latest whole-frame
//! enhancement (the colour transform is derived from it), and
//! `representative`, which additionally carries surgical fixes and is only
//! written for the representative frame itself. Global retries enhance the
//! previous `graded` image; surgical fixes are then re-applied as a pixel
//! delta, so they never reach the grade.

use std::future::Future;
use std::sync::Arc;

use image::RgbImage;
use tokio::sync::Semaphore;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use lumen_ai::{AiError, AiResult, AiServices};
use lumen_models::{Critique, DegradationReason, EnhanceConfig, ServiceStep, StopReason};

use crate::metrics;
use crate::retry::{retry_async_if, RetryConfig, RetryResult};

/// Loop settings, derived from [`EnhanceConfig`].
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub max_iterations: u32,
    pub quality_target: f64,
    pub enhancement_instruction: String,
    pub surgical_instruction: String,
    pub retry: RetryConfig,
}

impl OrchestratorSettings {
    pub fn from_config(config: &EnhanceConfig, retry: RetryConfig) -> Self {
        Self {
            max_iterations: config.max_iterations_per_group.max(1),
            quality_target: config.quality_score_target,
            enhancement_instruction: config.enhancement_instruction.clone(),
            surgical_instruction: config.surgical_instruction.clone(),
            retry,
        }
    }
}

/// Terminal result of one group's loop.
#[derive(Debug, Clone)]
pub struct GroupOutcome {
    /// Latest whole-frame enhancement; `None` when no pass succeeded
    pub graded: Option<RgbImage>,
    /// Final representative pixels, including surgical fixes
    pub representative: Option<RgbImage>,
    pub iterations: u32,
    /// Score of the accepted frame, when it was critiqued
    pub final_score: Option<f64>,
    pub stop_reason: StopReason,
    pub degradations: Vec<DegradationReason>,
}

impl GroupOutcome {
    /// Group skipped before any call was made.
    pub fn skipped(reason: DegradationReason) -> Self {
        Self {
            graded: None,
            representative: None,
            iterations: 0,
            final_score: None,
            stop_reason: StopReason::BudgetExpired,
            degradations: vec![reason],
        }
    }

    pub fn is_edited(&self) -> bool {
        self.representative.is_some()
    }
}

enum State {
    Enhancing,
    Analyzing,
    SurgicalEdit(Critique),
    GlobalRetry,
    Terminal(StopReason),
}

/// One candidate edit and the grade it was derived from.
#[derive(Clone)]
struct Candidate {
    representative: RgbImage,
    graded: RgbImage,
    score: Option<f64>,
}

/// Mutable state of one group's attempt.
struct Attempt<'a> {
    original: &'a RgbImage,
    latest: Option<Candidate>,
    best: Option<Candidate>,
    iterations: u32,
    degradations: Vec<DegradationReason>,
}

impl<'a> Attempt<'a> {
    fn new(original: &'a RgbImage) -> Self {
        Self {
            original,
            latest: None,
            best: None,
            iterations: 0,
            degradations: Vec::new(),
        }
    }

    /// Frame critiques and surgical edits operate on.
    fn current(&self) -> &RgbImage {
        self.latest
            .as_ref()
            .map(|c| &c.representative)
            .unwrap_or(self.original)
    }

    /// Frame the next enhancement pass operates on; never has surgical fixes.
    fn grade_source(&self) -> &RgbImage {
        self.latest
            .as_ref()
            .map(|c| &c.graded)
            .unwrap_or(self.original)
    }

    fn accept_enhancement(&mut self, graded: RgbImage) {
        let representative = match &self.latest {
            Some(previous) => carry_surgical_fixes(previous, &graded),
            None => graded.clone(),
        };
        self.latest = Some(Candidate {
            representative,
            graded,
            score: None,
        });
    }

    fn accept_surgical(&mut self, image: RgbImage) {
        if let Some(latest) = self.latest.as_mut() {
            latest.representative = image;
            latest.score = None;
        }
    }

    fn record_score(&mut self, score: f64) {
        let Some(latest) = self.latest.as_mut() else {
            return;
        };
        latest.score = Some(score);
        let better = self
            .best
            .as_ref()
            .and_then(|b| b.score)
            .map_or(true, |best| score > best);
        if better {
            self.best = Some(latest.clone());
        }
    }

    fn finish(self, stop_reason: StopReason) -> GroupOutcome {
        // Failures fall back to the best critiqued frame; every other stop
        // accepts the latest one
        let accepted = match stop_reason {
            StopReason::ServiceFailure => self.best.or(self.latest),
            _ => self.latest,
        };
        GroupOutcome {
            final_score: accepted.as_ref().and_then(|c| c.score),
            graded: accepted.as_ref().map(|c| c.graded.clone()),
            representative: accepted.map(|c| c.representative),
            iterations: self.iterations,
            stop_reason,
            degradations: self.degradations,
        }
    }
}

/// Re-apply the local edits `previous` carries on top of a new grade.
///
/// Fixes are dropped when an edit changed geometry, since there is no
/// pixel alignment to carry them across.
fn carry_surgical_fixes(previous: &Candidate, graded: &RgbImage) -> RgbImage {
    let aligned = previous.representative.dimensions() == previous.graded.dimensions()
        && previous.graded.dimensions() == graded.dimensions();
    if !aligned || previous.representative == previous.graded {
        return graded.clone();
    }

    let mut out = graded.clone();
    let fixes = previous.representative.pixels().zip(previous.graded.pixels());
    for (px, (fixed, base)) in out.pixels_mut().zip(fixes) {
        for c in 0..3 {
            let delta = fixed.0[c] as i16 - base.0[c] as i16;
            px.0[c] = (px.0[c] as i16 + delta).clamp(0, 255) as u8;
        }
    }
    out
}

/// Runs the enhancement loop for groups, sharing one AI call limiter.
#[derive(Clone)]
pub struct Orchestrator {
    services: AiServices,
    limiter: Arc<Semaphore>,
    settings: OrchestratorSettings,
    deadline: Option<Instant>,
}

impl Orchestrator {
    pub fn new(services: AiServices, limiter: Arc<Semaphore>, settings: OrchestratorSettings) -> Self {
        Self {
            services,
            limiter,
            settings,
            deadline: None,
        }
    }

    /// Stop starting new iterations once `deadline` passes.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn budget_expired(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    /// Run the loop for one group's representative frame.
    pub async fn run(&self, group_index: usize, original: &RgbImage) -> GroupOutcome {
        let mut attempt = Attempt::new(original);
        let mut state = State::Enhancing;

        let stop_reason = loop {
            state = match state {
                State::Enhancing => self.enhance(group_index, &mut attempt).await,
                State::Analyzing => self.analyze(group_index, &mut attempt).await,
                State::SurgicalEdit(critique) => {
                    self.surgical_edit(group_index, &mut attempt, &critique)
                        .await
                }
                State::GlobalRetry => {
                    debug!(group = group_index, "Only global issues remain, resubmitting");
                    State::Enhancing
                }
                State::Terminal(reason) => break reason,
            };
        };

        info!(
            group = group_index,
            iterations = attempt.iterations,
            stop_reason = stop_reason.as_str(),
            "Group enhancement finished"
        );
        metrics::record_group(stop_reason, attempt.iterations);
        attempt.finish(stop_reason)
    }

    async fn enhance(&self, group_index: usize, attempt: &mut Attempt<'_>) -> State {
        if let Some(terminal) = self.check_budget(attempt) {
            return terminal;
        }
        attempt.iterations += 1;
        debug!(group = group_index, iteration = attempt.iterations, "Enhancing");

        let source = attempt.grade_source();
        let instruction = self.settings.enhancement_instruction.as_str();
        let enhancer = &self.services.enhancer;
        let result = self
            .call(ServiceStep::Enhance, || enhancer.enhance(source, instruction))
            .await;
        match result {
            Ok(image) => {
                attempt.accept_enhancement(image);
                State::Analyzing
            }
            Err(e) => self.service_failure(group_index, attempt, ServiceStep::Enhance, e),
        }
    }

    async fn analyze(&self, group_index: usize, attempt: &mut Attempt<'_>) -> State {
        let current = attempt.current();
        let critic = &self.services.critic;
        let result = self
            .call(ServiceStep::Critique, || critic.critique(current))
            .await;
        match result {
            Ok(critique) => {
                attempt.record_score(critique.score);
                debug!(
                    group = group_index,
                    iteration = attempt.iterations,
                    score = critique.score,
                    issues = critique.issues.len(),
                    "Critique received"
                );
                self.decide(attempt.iterations, critique)
            }
            Err(e) if e.is_malformed() => {
                warn!(group = group_index, "Critique unparseable twice, accepting frame: {}", e);
                attempt.degradations.push(DegradationReason::MalformedCritique {
                    message: e.to_string(),
                });
                State::Terminal(StopReason::CritiqueUnavailable)
            }
            Err(e) => self.service_failure(group_index, attempt, ServiceStep::Critique, e),
        }
    }

    async fn surgical_edit(
        &self,
        group_index: usize,
        attempt: &mut Attempt<'_>,
        critique: &Critique,
    ) -> State {
        if let Some(terminal) = self.check_budget(attempt) {
            return terminal;
        }
        attempt.iterations += 1;

        // One edit call covers every surgical issue of this critique
        let (regions, descriptions): (Vec<&str>, Vec<&str>) = critique
            .surgical_issues()
            .map(|issue| (issue.region.as_str(), issue.description.as_str()))
            .unzip();
        let region = regions
            .iter()
            .filter(|r| !r.is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join("; ");
        let instruction = format!(
            "{} Problems to fix: {}.",
            self.settings.surgical_instruction,
            descriptions.join("; ")
        );
        debug!(
            group = group_index,
            iteration = attempt.iterations,
            region = %region,
            "Surgical edit"
        );

        let current = attempt.current();
        let editor = &self.services.editor;
        let (region, instruction) = (region.as_str(), instruction.as_str());
        let result = self
            .call(ServiceStep::SurgicalEdit, || {
                editor.edit(current, region, instruction)
            })
            .await;
        match result {
            Ok(image) => {
                attempt.accept_surgical(image);
                State::Analyzing
            }
            Err(e) => self.service_failure(group_index, attempt, ServiceStep::SurgicalEdit, e),
        }
    }

    /// Stop conditions, then the branch for the remaining issues.
    fn decide(&self, iterations: u32, critique: Critique) -> State {
        if critique.meets_target(self.settings.quality_target) {
            State::Terminal(StopReason::ScoreReached)
        } else if !critique.has_issues() {
            State::Terminal(StopReason::NoIssues)
        } else if iterations >= self.settings.max_iterations {
            State::Terminal(StopReason::IterationCap)
        } else if critique.has_surgical_issues() {
            State::SurgicalEdit(critique)
        } else {
            State::GlobalRetry
        }
    }

    fn check_budget(&self, attempt: &mut Attempt<'_>) -> Option<State> {
        if !self.budget_expired() {
            return None;
        }
        attempt.degradations.push(DegradationReason::BudgetExpired);
        Some(State::Terminal(StopReason::BudgetExpired))
    }

    fn service_failure(
        &self,
        group_index: usize,
        attempt: &mut Attempt<'_>,
        step: ServiceStep,
        error: AiError,
    ) -> State {
        warn!(
            group = group_index,
            step = step.as_str(),
            "AI call failed after retry, accepting best frame so far: {}",
            error
        );
        attempt.degradations.push(DegradationReason::ServiceFailure {
            step,
            message: error.to_string(),
        });
        State::Terminal(StopReason::ServiceFailure)
    }

    /// One external call: limiter permit per attempt, one retry for transient errors.
    async fn call<T, F, Fut>(&self, step: ServiceStep, operation: F) -> AiResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = AiResult<T>>,
    {
        let limiter = &self.limiter;
        let operation = &operation;
        let retry = self.settings.retry.named(step.as_str());

        let result = retry_async_if(&retry, AiError::is_retryable, move || async move {
            let _permit = limiter
                .acquire()
                .await
                .map_err(|_| AiError::ServiceUnavailable("AI call limiter closed".to_string()))?;
            operation().await
        })
        .await;

        match result {
            RetryResult::Success(value) => {
                metrics::record_ai_call(step, true);
                Ok(value)
            }
            RetryResult::Failed { error, attempts } => {
                metrics::record_ai_call(step, false);
                debug!(step = step.as_str(), attempts, "AI call gave up");
                Err(error)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use image::Rgb;
    use lumen_models::CritiqueIssue;

    use crate::test_support::{
        brighten, low_global, low_surgical, FakeCritic, FakeEditor, FakeEnhancer, Fakes, Reply,
    };

    fn frame() -> RgbImage {
        RgbImage::from_fn(12, 8, |x, y| Rgb([(x * 10) as u8, (y * 20) as u8, 90]))
    }

    fn orchestrator(fakes: &Fakes, max_iterations: u32) -> Orchestrator {
        let config = EnhanceConfig {
            max_iterations_per_group: max_iterations,
            ..Default::default()
        };
        let retry = RetryConfig::new("test").with_base_delay(Duration::from_millis(1));
        Orchestrator::new(
            fakes.services(),
            Arc::new(Semaphore::new(2)),
            OrchestratorSettings::from_config(&config, retry),
        )
    }

    #[tokio::test]
    async fn test_satisfied_after_one_iteration() {
        let fakes = Fakes::satisfied();
        let outcome = orchestrator(&fakes, 3).run(0, &frame()).await;

        assert_eq!(outcome.iterations, 1);
        assert_eq!(outcome.stop_reason, StopReason::ScoreReached);
        assert_eq!(outcome.final_score, Some(9.0));
        assert!(outcome.degradations.is_empty());
        assert_eq!(fakes.enhancer.calls(), 1);
        assert_eq!(fakes.critic.calls(), 1);
        assert_eq!(outcome.representative, Some(brighten(&frame(), 20)));
    }

    #[tokio::test]
    async fn test_no_issues_is_terminal_below_target() {
        let fakes = Fakes::new(
            FakeEnhancer::brighten(5),
            FakeCritic::always(Critique::clean(6.0)),
            FakeEditor::new(),
        );
        let outcome = orchestrator(&fakes, 3).run(0, &frame()).await;
        assert_eq!(outcome.stop_reason, StopReason::NoIssues);
        assert_eq!(outcome.iterations, 1);
    }

    #[tokio::test]
    async fn test_global_issues_hit_iteration_cap() {
        for max in [1u32, 3, 5] {
            let fakes = Fakes::new(
                FakeEnhancer::brighten(10),
                FakeCritic::always(low_global()),
                FakeEditor::new(),
            );
            let outcome = orchestrator(&fakes, max).run(0, &frame()).await;

            assert_eq!(outcome.iterations, max);
            assert_eq!(outcome.stop_reason, StopReason::IterationCap);
            assert_eq!(fakes.enhancer.calls(), max as usize);
            assert_eq!(fakes.critic.calls(), max as usize);
            assert_eq!(fakes.editor.calls(), 0);
            // Each global retry resubmits the previous edit
            assert_eq!(
                outcome.representative,
                Some(brighten(&frame(), 10 * max as u8))
            );
            assert!(outcome.degradations.is_empty());
        }
    }

    #[tokio::test]
    async fn test_surgical_edit_not_in_graded_frame() {
        let fakes = Fakes::new(
            FakeEnhancer::brighten(10),
            FakeCritic::scripted(
                vec![Reply::Ok(low_surgical("top-left corner"))],
                Reply::Ok(Critique::clean(9.0)),
            ),
            FakeEditor::new(),
        );
        let outcome = orchestrator(&fakes, 3).run(0, &frame()).await;

        assert_eq!(outcome.iterations, 2);
        assert_eq!(outcome.stop_reason, StopReason::ScoreReached);
        assert_eq!(fakes.enhancer.calls(), 1);
        assert_eq!(fakes.editor.calls(), 1);
        assert_eq!(
            fakes.editor.regions.lock().unwrap().as_slice(),
            ["top-left corner"]
        );

        let graded = outcome.graded.unwrap();
        let representative = outcome.representative.unwrap();
        assert_eq!(graded, brighten(&frame(), 10));
        assert_eq!(representative.get_pixel(0, 0).0, [255, 255, 255]);
        assert_ne!(graded, representative);
    }

    #[tokio::test]
    async fn test_global_pass_after_surgical_edit_keeps_fix_out_of_grade() {
        let fakes = Fakes::new(
            FakeEnhancer::brighten(20),
            FakeCritic::scripted(
                vec![
                    Reply::Ok(low_surgical("top-left corner")),
                    Reply::Ok(low_global()),
                ],
                Reply::Ok(Critique::clean(9.0)),
            ),
            FakeEditor::new(),
        );
        let outcome = orchestrator(&fakes, 3).run(0, &frame()).await;

        assert_eq!(outcome.stop_reason, StopReason::ScoreReached);
        assert_eq!(outcome.iterations, 3);
        assert_eq!(fakes.enhancer.calls(), 2);
        assert_eq!(fakes.editor.calls(), 1);

        // Second pass grades the first grade, not the fixed frame
        let graded = outcome.graded.unwrap();
        assert_eq!(graded, brighten(&frame(), 40));
        assert_eq!(graded.get_pixel(0, 0).0, [40, 40, 130]);

        // The fix survives on the representative only
        let representative = outcome.representative.unwrap();
        assert_eq!(representative.get_pixel(0, 0).0, [255, 255, 255]);
        assert_eq!(representative.get_pixel(5, 3), graded.get_pixel(5, 3));

        // The group transform therefore carries the pure grade
        let transform = lumen_media::ColorTransform::build(&frame(), &graded, 32).unwrap();
        let mapped = transform.map_color([0, 0, 90]);
        for (got, want) in mapped.iter().zip([40u8, 40, 130]) {
            assert!((*got as i32 - want as i32).abs() <= 1, "{:?}", mapped);
        }
    }

    #[tokio::test]
    async fn test_iteration_bound_for_mixed_critiques() {
        let mixed = Critique::new(
            4.0,
            vec![
                CritiqueIssue::global("noise"),
                CritiqueIssue::surgical("smudge", "center"),
            ],
        );
        let scripts = [
            vec![Reply::Ok(low_surgical("a")), Reply::Ok(low_global())],
            vec![Reply::Ok(mixed.clone()), Reply::Ok(mixed)],
            vec![Reply::Ok(low_global()), Reply::Ok(low_surgical("b"))],
        ];
        for script in scripts {
            for max in 1..=4u32 {
                let fakes = Fakes::new(
                    FakeEnhancer::brighten(1),
                    FakeCritic::scripted(script.clone(), Reply::Ok(low_surgical("c"))),
                    FakeEditor::new(),
                );
                let outcome = orchestrator(&fakes, max).run(0, &frame()).await;
                assert!(outcome.iterations <= max);
                assert_eq!(
                    fakes.enhancer.calls() + fakes.editor.calls(),
                    outcome.iterations as usize
                );
                assert_eq!(outcome.stop_reason, StopReason::IterationCap);
            }
        }
    }

    #[tokio::test]
    async fn test_transient_failure_retried_once() {
        let fakes = Fakes::new(
            FakeEnhancer::brighten(10).with_failures(vec![Reply::Transient]),
            FakeCritic::always(Critique::clean(9.5)),
            FakeEditor::new(),
        );
        let outcome = orchestrator(&fakes, 3).run(0, &frame()).await;

        assert_eq!(outcome.stop_reason, StopReason::ScoreReached);
        assert_eq!(outcome.iterations, 1);
        assert_eq!(fakes.enhancer.calls(), 2);
        assert!(outcome.degradations.is_empty());
    }

    #[tokio::test]
    async fn test_first_enhancement_failure_leaves_group_unedited() {
        let fakes = Fakes::new(
            FakeEnhancer::always(Reply::Transient),
            FakeCritic::always(Critique::clean(9.0)),
            FakeEditor::new(),
        );
        let outcome = orchestrator(&fakes, 3).run(4, &frame()).await;

        assert_eq!(outcome.stop_reason, StopReason::ServiceFailure);
        assert!(!outcome.is_edited());
        assert!(outcome.graded.is_none());
        assert_eq!(fakes.enhancer.calls(), 2);
        assert_eq!(fakes.critic.calls(), 0);
        assert!(matches!(
            outcome.degradations.as_slice(),
            [DegradationReason::ServiceFailure {
                step: ServiceStep::Enhance,
                ..
            }]
        ));
    }

    #[tokio::test]
    async fn test_critique_outage_keeps_latest_edit() {
        let fakes = Fakes::new(
            FakeEnhancer::brighten(10),
            FakeCritic::scripted(Vec::new(), Reply::Transient),
            FakeEditor::new(),
        );
        let outcome = orchestrator(&fakes, 3).run(0, &frame()).await;

        assert_eq!(outcome.stop_reason, StopReason::ServiceFailure);
        assert_eq!(fakes.critic.calls(), 2);
        assert_eq!(outcome.representative, Some(brighten(&frame(), 10)));
        assert_eq!(outcome.final_score, None);
    }

    #[tokio::test]
    async fn test_failure_falls_back_to_best_scored_frame() {
        // Iteration 1 scores 6 with global issues; iteration 2 scores worse
        // and then the third enhancement fails twice
        let fakes = Fakes::new(
            FakeEnhancer::brighten(10).with_failures(vec![
                Reply::Ok(()),
                Reply::Ok(()),
                Reply::Transient,
                Reply::Transient,
            ]),
            FakeCritic::scripted(
                vec![
                    Reply::Ok(Critique::new(6.0, vec![CritiqueIssue::global("dull")])),
                    Reply::Ok(Critique::new(4.0, vec![CritiqueIssue::global("overcooked")])),
                ],
                Reply::Ok(low_global()),
            ),
            FakeEditor::new(),
        );
        let outcome = orchestrator(&fakes, 5).run(0, &frame()).await;

        assert_eq!(outcome.stop_reason, StopReason::ServiceFailure);
        assert_eq!(outcome.iterations, 3);
        assert_eq!(outcome.final_score, Some(6.0));
        assert_eq!(outcome.representative, Some(brighten(&frame(), 10)));
        assert_eq!(outcome.graded, Some(brighten(&frame(), 10)));
    }

    #[tokio::test]
    async fn test_malformed_critique_twice_treated_as_satisfied() {
        let fakes = Fakes::new(
            FakeEnhancer::brighten(10),
            FakeCritic::scripted(Vec::new(), Reply::Malformed),
            FakeEditor::new(),
        );
        let outcome = orchestrator(&fakes, 3).run(0, &frame()).await;

        assert_eq!(outcome.stop_reason, StopReason::CritiqueUnavailable);
        assert_eq!(outcome.iterations, 1);
        assert_eq!(fakes.critic.calls(), 2);
        assert!(outcome.is_edited());
        assert!(matches!(
            outcome.degradations.as_slice(),
            [DegradationReason::MalformedCritique { .. }]
        ));
    }

    #[tokio::test]
    async fn test_malformed_once_recovers() {
        let fakes = Fakes::new(
            FakeEnhancer::brighten(10),
            FakeCritic::scripted(vec![Reply::Malformed], Reply::Ok(Critique::clean(9.0))),
            FakeEditor::new(),
        );
        let outcome = orchestrator(&fakes, 3).run(0, &frame()).await;
        assert_eq!(outcome.stop_reason, StopReason::ScoreReached);
        assert!(outcome.degradations.is_empty());
    }

    #[tokio::test]
    async fn test_rejected_request_not_retried() {
        let fakes = Fakes::new(
            FakeEnhancer::always(Reply::Rejected),
            FakeCritic::always(Critique::clean(9.0)),
            FakeEditor::new(),
        );
        let outcome = orchestrator(&fakes, 3).run(0, &frame()).await;
        assert_eq!(fakes.enhancer.calls(), 1);
        assert_eq!(outcome.stop_reason, StopReason::ServiceFailure);
    }

    #[tokio::test]
    async fn test_surgical_failure_keeps_enhanced_frame() {
        let fakes = Fakes::new(
            FakeEnhancer::brighten(10),
            FakeCritic::always(low_surgical("face")),
            FakeEditor::scripted(vec![Reply::Transient, Reply::Transient]),
        );
        let outcome = orchestrator(&fakes, 3).run(0, &frame()).await;

        assert_eq!(outcome.stop_reason, StopReason::ServiceFailure);
        assert_eq!(fakes.editor.calls(), 2);
        assert_eq!(outcome.representative, Some(brighten(&frame(), 10)));
        assert_eq!(outcome.final_score, Some(5.0));
    }

    #[tokio::test]
    async fn test_expired_budget_makes_no_calls() {
        let fakes = Fakes::satisfied();
        let orchestrator = orchestrator(&fakes, 3).with_deadline(Instant::now());
        assert!(orchestrator.budget_expired());

        let outcome = orchestrator.run(0, &frame()).await;
        assert_eq!(outcome.stop_reason, StopReason::BudgetExpired);
        assert_eq!(outcome.iterations, 0);
        assert!(!outcome.is_edited());
        assert_eq!(fakes.enhancer.calls(), 0);
        assert_eq!(outcome.degradations, vec![DegradationReason::BudgetExpired]);
    }
}
