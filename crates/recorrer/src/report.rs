//! Suite reporting.
//!
//! The runner aggregates per-scenario outcomes into a [`Report`]: results
//! in scenario input order, failure details with full step paths, an
//! explicit list of pending assertions, and the fixed delays flagged by
//! the executor. Reports serialize to JSON for machine consumption and
//! render a one-line summary for humans.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::scenario::ScenarioState;
use crate::step::{StepResult, StepStatus};

/// Where a step sits in its scenario, outermost first
fn join_path(path: &[&str]) -> String {
    path.join(" > ")
}

/// One failure, located precisely enough to act on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureDetail {
    /// Path of step names from the scenario root to the failing step
    pub step_path: String,
    /// Failed/errored
    pub status: StepStatus,
    /// Error or assertion message
    pub message: String,
    /// Expected value when an assertion failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,
    /// Actual value when an assertion failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual: Option<String>,
}

/// One step whose assertion is knowingly missing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingDetail {
    /// Path of step names from the scenario root to the pending step
    pub step_path: String,
    /// Why the assertion is missing
    pub reason: String,
}

/// Outcome of one scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioReport {
    /// Scenario id
    pub id: Uuid,
    /// Scenario name
    pub name: String,
    /// Terminal state the scenario reached
    pub state: ScenarioState,
    /// Wall-clock duration in milliseconds
    pub duration_ms: u64,
    /// Step results, one per declared step, in declaration order
    pub steps: Vec<StepResult>,
    /// Message of the environment failure that aborted the scenario
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fatal: Option<String>,
}

impl ScenarioReport {
    /// Failures in this scenario, with step paths
    #[must_use]
    pub fn failures(&self) -> Vec<FailureDetail> {
        let mut failures = Vec::new();
        for step in &self.steps {
            collect_failures(step, &mut vec![&self.name], &mut failures);
        }
        failures
    }

    /// Pending assertions in this scenario, with step paths
    #[must_use]
    pub fn pending(&self) -> Vec<PendingDetail> {
        let mut pending = Vec::new();
        for step in &self.steps {
            collect_pending(step, &mut vec![&self.name], &mut pending);
        }
        pending
    }

    /// Paths of steps that relied on a fixed delay
    #[must_use]
    pub fn flagged_delays(&self) -> Vec<String> {
        let mut flagged = Vec::new();
        for step in &self.steps {
            collect_delays(step, &mut vec![&self.name], &mut flagged);
        }
        flagged
    }

    /// Number of step results, subtrees included
    #[must_use]
    pub fn step_count(&self) -> usize {
        self.steps.iter().map(StepResult::result_count).sum()
    }
}

fn collect_failures<'a>(
    step: &'a StepResult,
    path: &mut Vec<&'a str>,
    out: &mut Vec<FailureDetail>,
) {
    path.push(&step.name);
    // Composite failures are reported at the leaves that caused them
    if step.status.is_failure() && step.children.is_empty() {
        out.push(FailureDetail {
            step_path: join_path(path),
            status: step.status,
            message: step.error.clone().unwrap_or_default(),
            expected: step.assertion.as_ref().map(|a| a.expected.clone()),
            actual: step.assertion.as_ref().map(|a| a.actual.clone()),
        });
    }
    for child in &step.children {
        collect_failures(child, path, out);
    }
    let _ = path.pop();
}

fn collect_pending<'a>(
    step: &'a StepResult,
    path: &mut Vec<&'a str>,
    out: &mut Vec<PendingDetail>,
) {
    path.push(&step.name);
    if step.status == StepStatus::Pending {
        out.push(PendingDetail {
            step_path: join_path(path),
            reason: step.pending_reason.clone().unwrap_or_default(),
        });
    }
    for child in &step.children {
        collect_pending(child, path, out);
    }
    let _ = path.pop();
}

fn collect_delays<'a>(step: &'a StepResult, path: &mut Vec<&'a str>, out: &mut Vec<String>) {
    path.push(&step.name);
    if step.flagged_delay {
        out.push(join_path(path));
    }
    for child in &step.children {
        collect_delays(child, path, out);
    }
    let _ = path.pop();
}

/// Aggregated outcome of one suite run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    /// Suite name
    pub suite: String,
    /// When the run started
    pub started_at: DateTime<Utc>,
    /// When the run finished
    pub finished_at: DateTime<Utc>,
    /// Scenario reports, in the order scenarios were submitted
    pub scenarios: Vec<ScenarioReport>,
}

impl Report {
    /// Create an empty report; `finished_at` is set by [`Report::finish`]
    #[must_use]
    pub fn new(suite: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            suite: suite.into(),
            started_at: now,
            finished_at: now,
            scenarios: Vec::new(),
        }
    }

    /// Append a scenario outcome
    pub fn push(&mut self, scenario: ScenarioReport) {
        self.scenarios.push(scenario);
    }

    /// Stamp the finish time
    pub fn finish(&mut self) {
        self.finished_at = Utc::now();
    }

    /// Scenarios that reached `state`
    #[must_use]
    pub fn count(&self, state: ScenarioState) -> usize {
        self.scenarios.iter().filter(|s| s.state == state).count()
    }

    /// Whether every scenario passed
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.scenarios
            .iter()
            .all(|s| s.state == ScenarioState::Passed)
    }

    /// Every failure in the run, with scenario-qualified step paths
    #[must_use]
    pub fn failures(&self) -> Vec<FailureDetail> {
        self.scenarios.iter().flat_map(ScenarioReport::failures).collect()
    }

    /// Every pending assertion in the run
    #[must_use]
    pub fn pending(&self) -> Vec<PendingDetail> {
        self.scenarios.iter().flat_map(ScenarioReport::pending).collect()
    }

    /// Every flagged fixed delay in the run
    #[must_use]
    pub fn flagged_delays(&self) -> Vec<String> {
        self.scenarios
            .iter()
            .flat_map(ScenarioReport::flagged_delays)
            .collect()
    }

    /// One-line human summary
    #[must_use]
    pub fn summary(&self) -> String {
        let pending = self.pending().len();
        let mut line = format!(
            "{}: {} scenarios, {} passed, {} failed, {} errored",
            self.suite,
            self.scenarios.len(),
            self.count(ScenarioState::Passed),
            self.count(ScenarioState::Failed),
            self.count(ScenarioState::Errored),
        );
        if pending > 0 {
            line.push_str(&format!(", {pending} pending assertions"));
        }
        line
    }

    /// Serialize to pretty JSON
    ///
    /// # Errors
    ///
    /// Returns a JSON error if serialization fails.
    pub fn to_json(&self) -> crate::result::RecorrerResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assertion::AssertionResult;

    fn leaf(name: &str, status: StepStatus) -> StepResult {
        StepResult {
            name: name.to_string(),
            status,
            duration_ms: 1,
            assertion: None,
            error: None,
            captured: None,
            flagged_delay: false,
            pending_reason: None,
            children: Vec::new(),
        }
    }

    fn scenario_report(name: &str, state: ScenarioState, steps: Vec<StepResult>) -> ScenarioReport {
        ScenarioReport {
            id: Uuid::new_v4(),
            name: name.to_string(),
            state,
            duration_ms: 10,
            steps,
            fatal: None,
        }
    }

    #[test]
    fn test_failure_paths_are_scenario_qualified() {
        let mut failing = leaf("row count", StepStatus::Failed);
        failing.error = Some("expected 1, got 0".to_string());
        failing.assertion = Some(AssertionResult::new("rows", "1 match(es)", "0 match(es)", false));

        let group = StepResult {
            name: "Delete the role".to_string(),
            status: StepStatus::Failed,
            duration_ms: 5,
            assertion: None,
            error: None,
            captured: None,
            flagged_delay: false,
            pending_reason: None,
            children: vec![leaf("open modal", StepStatus::Passed), failing],
        };

        let report = scenario_report("delete role", ScenarioState::Failed, vec![group]);
        let failures = report.failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].step_path, "delete role > Delete the role > row count");
        assert_eq!(failures[0].expected.as_deref(), Some("1 match(es)"));
    }

    #[test]
    fn test_pending_assertions_are_listed_not_hidden() {
        let mut pending_step = leaf("confirm delete", StepStatus::Pending);
        pending_step.pending_reason = Some("snackbar variant undecided".to_string());

        let report = scenario_report("delete user", ScenarioState::Passed, vec![pending_step]);
        let pending = report.pending();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].reason, "snackbar variant undecided");
    }

    #[test]
    fn test_flagged_delays_surface_in_the_report() {
        let mut delayed = leaf("legacy pause", StepStatus::Passed);
        delayed.flagged_delay = true;

        let report = scenario_report("edit role", ScenarioState::Passed, vec![delayed]);
        assert_eq!(report.flagged_delays(), vec!["edit role > legacy pause"]);
    }

    #[test]
    fn test_suite_summary_counts_states() {
        let mut report = Report::new("role admin");
        report.push(scenario_report("a", ScenarioState::Passed, vec![]));
        report.push(scenario_report("b", ScenarioState::Failed, vec![]));
        report.push(scenario_report("c", ScenarioState::Passed, vec![]));
        report.finish();

        assert_eq!(report.count(ScenarioState::Passed), 2);
        assert!(!report.all_passed());
        let summary = report.summary();
        assert!(summary.contains("3 scenarios"));
        assert!(summary.contains("2 passed"));
        assert!(summary.contains("1 failed"));
    }

    #[test]
    fn test_report_serializes_to_json() {
        let mut report = Report::new("role admin");
        report.push(scenario_report("a", ScenarioState::Passed, vec![]));
        let json = report.to_json().unwrap();
        assert!(json.contains("\"suite\": \"role admin\""));
        assert!(json.contains("\"state\": \"passed\""));
    }
}
