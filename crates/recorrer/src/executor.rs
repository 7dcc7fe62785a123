//! Step executor.
//!
//! Runs a step tree against one scenario's context. Leaf failures are
//! caught right here at the step boundary and converted into
//! [`StepResult`]s — they never unwind past the owning scenario. A failed
//! step does not stop its siblings unless it was marked critical, in which
//! case the remaining siblings are recorded as skipped. Environment-level
//! failures are the one exception: they abort the whole scenario.

use std::future::Future;
use std::pin::Pin;
use std::time::Instant;

use serde_json::Value;

use crate::assertion::{
    assert_count, assert_equal, assert_record_equal, assert_visible, AssertionResult,
};
use crate::fixture::{Fixtures, NotificationController};
use crate::result::{RecorrerError, RecorrerResult};
use crate::scenario::Scenario;
use crate::session::Session;
use crate::step::{Action, CapturedValue, Step, StepKind, StepResult, StepStatus};
use crate::wait::{wait_for_state, WaitOptions};

/// Everything one scenario's steps execute against.
///
/// Owned by the runner for exactly one scenario; nothing here is shared
/// across scenarios.
pub struct ScenarioContext {
    /// The scenario's isolated session
    pub session: Box<dyn Session>,
    /// Named collaborators, constructed lazily
    pub fixtures: Fixtures,
    /// Notification-dismissal capability, if injected
    pub notifications: Option<Box<dyn NotificationController>>,
    /// Default wait options for this scenario
    pub wait: WaitOptions,
}

impl std::fmt::Debug for ScenarioContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScenarioContext")
            .field("url", &self.session.url())
            .field("fixtures", &self.fixtures)
            .field("wait", &self.wait)
            .finish_non_exhaustive()
    }
}

/// Outcome of executing one scenario's step tree
#[derive(Debug)]
pub struct ScenarioExecution {
    /// Step results in declaration order, one per declared step
    pub results: Vec<StepResult>,
    /// Message of the environment failure that aborted the scenario, if any
    pub fatal: Option<String>,
}

impl ScenarioExecution {
    /// Whether any step failed or errored
    #[must_use]
    pub fn has_failure(&self) -> bool {
        self.fatal.is_some() || self.results.iter().any(StepResult::has_failure)
    }
}

/// What a leaf action produced besides pass/fail
#[derive(Debug, Default)]
struct LeafOutcome {
    assertion: Option<AssertionResult>,
    captured: Option<CapturedValue>,
    flagged_delay: bool,
}

/// Execute all of a scenario's steps in order.
pub async fn execute_scenario(
    scenario: &Scenario,
    ctx: &mut ScenarioContext,
) -> ScenarioExecution {
    let (results, fatal) = run_sequence(ctx, &scenario.steps).await;
    ScenarioExecution { results, fatal }
}

/// Run an ordered sequence of sibling steps.
///
/// Once a critical step fails (or an environment failure occurs), the
/// remaining siblings are recorded as `Skipped` — explicitly, so the
/// report has one result per declared step.
async fn run_sequence(
    ctx: &mut ScenarioContext,
    steps: &[Step],
) -> (Vec<StepResult>, Option<String>) {
    let mut results = Vec::with_capacity(steps.len());
    let mut fatal: Option<String> = None;
    let mut abort = false;

    for step in steps {
        if abort || fatal.is_some() {
            results.push(StepResult::skipped(step));
            continue;
        }

        let (result, step_fatal) = run_step(ctx, step).await;
        if step_fatal.is_some() {
            fatal = step_fatal;
        }
        if result.status.is_failure() && step.critical {
            tracing::debug!(step = step.name.as_str(), "critical step failed, skipping siblings");
            abort = true;
        }
        results.push(result);
    }

    (results, fatal)
}

/// Run a single step, leaf or composite.
///
/// Boxed because composite steps recurse through `run_sequence`.
fn run_step<'a>(
    ctx: &'a mut ScenarioContext,
    step: &'a Step,
) -> Pin<Box<dyn Future<Output = (StepResult, Option<String>)> + Send + 'a>> {
    Box::pin(async move {
        let start = Instant::now();
        match &step.kind {
            StepKind::Leaf { action } => run_leaf(ctx, step, action, start).await,
            StepKind::Composite { steps } => {
                let (children, fatal) = run_sequence(ctx, steps).await;
                let status = composite_status(step, &children, fatal.as_deref());
                let result = StepResult {
                    name: step.name.clone(),
                    status,
                    duration_ms: elapsed_ms(start),
                    assertion: None,
                    error: None,
                    captured: None,
                    flagged_delay: false,
                    pending_reason: step.pending_assertion.clone(),
                    children,
                };
                (result, fatal)
            }
        }
    })
}

async fn run_leaf(
    ctx: &mut ScenarioContext,
    step: &Step,
    action: &Action,
    start: Instant,
) -> (StepResult, Option<String>) {
    tracing::debug!(step = step.name.as_str(), action = action.label(), "running");

    let mut result = StepResult {
        name: step.name.clone(),
        status: StepStatus::Passed,
        duration_ms: 0,
        assertion: None,
        error: None,
        captured: None,
        flagged_delay: false,
        pending_reason: step.pending_assertion.clone(),
        children: Vec::new(),
    };
    let mut fatal = None;

    match perform(ctx, action).await {
        Ok(outcome) => {
            result.flagged_delay = outcome.flagged_delay;
            result.captured = outcome.captured;
            if let Some(assertion) = outcome.assertion {
                if !assertion.passed {
                    result.status = StepStatus::Failed;
                    result.error = Some(format!(
                        "{}: expected {}, got {}",
                        assertion.description, assertion.expected, assertion.actual
                    ));
                }
                result.assertion = Some(assertion);
            }
            if result.status == StepStatus::Passed && step.pending_assertion.is_some() {
                result.status = StepStatus::Pending;
            }
        }
        Err(e) => {
            result.status = if e.is_step_error() {
                StepStatus::Errored
            } else {
                StepStatus::Failed
            };
            result.error = Some(e.to_string());
            if e.is_fatal() {
                fatal = Some(e.to_string());
            }
            tracing::debug!(step = step.name.as_str(), error = %e, "leaf failed");
        }
    }

    result.duration_ms = elapsed_ms(start);
    (result, fatal)
}

/// Execute one atomic action against the session
async fn perform(ctx: &mut ScenarioContext, action: &Action) -> RecorrerResult<LeafOutcome> {
    let mut outcome = LeafOutcome::default();

    match action {
        Action::Navigate { url } => {
            ctx.session.navigate(url).await?;
        }
        Action::Click { locator } => {
            let handle = ctx.session.resolve_one(locator).await?;
            handle.ensure_fresh(ctx.session.epoch())?;
            ctx.session.click(&handle).await?;
        }
        Action::Fill { locator, text } => {
            let handle = ctx.session.resolve_one(locator).await?;
            handle.ensure_fresh(ctx.session.epoch())?;
            ctx.session.fill(&handle, text).await?;
        }
        Action::WaitFor {
            locator,
            state,
            timeout_ms,
        } => {
            let options = match timeout_ms {
                Some(ms) => ctx.wait.clone().with_timeout(*ms),
                None => ctx.wait.clone(),
            };
            wait_for_state(ctx.session.as_mut(), locator, *state, &options).await?;
        }
        Action::Delay { ms } => {
            // Deliberate debt: no deterministic signal existed here.
            tracing::warn!(ms, "fixed delay in scenario; prefer a wait_for step");
            tokio::time::sleep(std::time::Duration::from_millis(*ms)).await;
            outcome.flagged_delay = true;
        }
        Action::Capture { locator, key } => {
            let handle = ctx.session.resolve_one(locator).await?;
            let text = ctx.session.text(&handle).await?;
            outcome.captured = Some(CapturedValue {
                key: key.clone(),
                value: Value::String(text),
            });
        }
        Action::AssertText { locator, expected } => {
            let handle = ctx.session.resolve_one(locator).await?;
            let actual = ctx.session.text(&handle).await?;
            outcome.assertion = Some(assert_equal(
                &actual,
                expected,
                format!("text of {}", locator.description()),
            ));
        }
        Action::AssertCount { locator, expected } => {
            let handles = ctx.session.resolve(locator).await?;
            outcome.assertion = Some(assert_count(
                handles.len(),
                *expected,
                format!("count of {}", locator.description()),
            ));
        }
        Action::AssertVisible { locator } => {
            let visible = any_visible(ctx, locator).await?;
            outcome.assertion = Some(assert_visible(
                visible,
                format!("{} visible", locator.description()),
            ));
        }
        Action::AssertHidden { locator } => {
            let visible = any_visible(ctx, locator).await?;
            outcome.assertion = Some(AssertionResult::new(
                format!("{} hidden", locator.description()),
                "hidden",
                if visible { "visible" } else { "hidden" },
                !visible,
            ));
        }
        Action::AssertEvaluate {
            expression,
            expected,
        } => {
            let actual = ctx.session.evaluate(expression).await?;
            outcome.assertion = Some(assert_record_equal(
                &actual,
                expected,
                format!("evaluate({expression})"),
            ));
        }
        Action::DismissNotifications => {
            let mut controller =
                ctx.notifications
                    .take()
                    .ok_or_else(|| RecorrerError::Fixture {
                        message: "no notification controller injected".to_string(),
                    })?;
            let dismissed = controller.dismiss_all(ctx.session.as_mut()).await;
            ctx.notifications = Some(controller);
            dismissed?;
        }
    }

    Ok(outcome)
}

async fn any_visible(
    ctx: &mut ScenarioContext,
    locator: &crate::locator::Locator,
) -> RecorrerResult<bool> {
    let handles = ctx.session.resolve(locator).await?;
    for handle in &handles {
        if ctx.session.is_visible(handle).await? {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Worst-of-children status for a composite step
fn composite_status(step: &Step, children: &[StepResult], fatal: Option<&str>) -> StepStatus {
    if fatal.is_some() || children.iter().any(|c| c.status == StepStatus::Errored) {
        return StepStatus::Errored;
    }
    if children.iter().any(StepResult::has_failure) {
        return StepStatus::Failed;
    }
    if step.pending_assertion.is_some() {
        return StepStatus::Pending;
    }
    StepStatus::Passed
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}
