//! Scenario runner.
//!
//! Takes a batch of scenarios and a [`SessionProvider`], runs each scenario
//! in its own isolated session with bounded concurrency, and aggregates a
//! [`Report`] in submission order. Sessions are released on every path out
//! of a scenario, including fatal ones, and fixture teardown always runs.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Semaphore;

use crate::executor::{execute_scenario, ScenarioContext, ScenarioExecution};
use crate::fixture::{Fixtures, SessionProvider};
use crate::report::{Report, ScenarioReport};
use crate::scenario::{Scenario, ScenarioLifecycle, ScenarioState};
use crate::step::{StepResult, StepStatus};

/// Default cap on concurrently running scenarios
pub const DEFAULT_MAX_CONCURRENCY: usize = 4;

/// Runner configuration
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Suite name used in the report
    pub suite: String,
    /// Maximum number of scenarios running at once
    pub max_concurrency: usize,
}

impl RunnerConfig {
    /// Configuration with defaults
    #[must_use]
    pub fn new(suite: impl Into<String>) -> Self {
        Self {
            suite: suite.into(),
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }

    /// Cap concurrent scenarios; a cap of 1 runs them serially
    #[must_use]
    pub const fn with_max_concurrency(mut self, max: usize) -> Self {
        self.max_concurrency = max;
        self
    }
}

/// Runs scenario batches against a session provider
pub struct ScenarioRunner {
    config: RunnerConfig,
    provider: Arc<dyn SessionProvider>,
}

impl std::fmt::Debug for ScenarioRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScenarioRunner")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ScenarioRunner {
    /// Create a runner
    #[must_use]
    pub fn new(config: RunnerConfig, provider: Arc<dyn SessionProvider>) -> Self {
        Self { config, provider }
    }

    /// Run every scenario and aggregate the report.
    ///
    /// Scenario outcomes land in the report in submission order regardless
    /// of completion order. One scenario's failure never affects another:
    /// each gets a fresh session and its own fixture store.
    pub async fn run(&self, scenarios: Vec<Scenario>) -> Report {
        let mut report = Report::new(self.config.suite.clone());
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency.max(1)));

        let mut handles = Vec::with_capacity(scenarios.len());
        let mut fallbacks = Vec::with_capacity(scenarios.len());
        for scenario in scenarios {
            let provider = Arc::clone(&self.provider);
            let semaphore = Arc::clone(&semaphore);
            // Kept outside the task so a panicking scenario still gets a
            // report entry instead of vanishing from the suite.
            fallbacks.push((
                scenario.id,
                scenario.name.clone(),
                scenario.steps.iter().map(StepResult::skipped).collect::<Vec<_>>(),
            ));
            handles.push(tokio::spawn(async move {
                // Semaphore is never closed while tasks hold a clone
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .expect("semaphore open for the whole run");
                run_one(provider.as_ref(), scenario).await
            }));
        }

        let joined = futures::future::join_all(handles).await;
        for ((id, name, steps), joined) in fallbacks.into_iter().zip(joined) {
            match joined {
                Ok(scenario_report) => report.push(scenario_report),
                Err(e) => {
                    tracing::error!(scenario = name.as_str(), error = %e, "scenario task panicked");
                    report.push(ScenarioReport {
                        id,
                        name,
                        state: ScenarioState::Errored,
                        duration_ms: 0,
                        steps,
                        fatal: Some(format!("scenario task panicked: {}", panic_reason(e))),
                    });
                }
            }
        }

        report.finish();
        tracing::info!(summary = report.summary().as_str(), "suite finished");
        report
    }
}

/// Run one scenario through its full lifecycle
async fn run_one(provider: &dyn SessionProvider, scenario: Scenario) -> ScenarioReport {
    let start = Instant::now();
    let mut lifecycle = ScenarioLifecycle::new();
    lifecycle
        .advance(ScenarioState::Running)
        .expect("fresh lifecycle accepts Running");
    tracing::info!(scenario = scenario.name.as_str(), "starting");

    let session = match provider.acquire(&scenario).await {
        Ok(session) => session,
        Err(e) => {
            // Never ran: every declared step is recorded as skipped
            tracing::error!(scenario = scenario.name.as_str(), error = %e, "session acquisition failed");
            lifecycle
                .advance(ScenarioState::Errored)
                .expect("Running accepts Errored");
            lifecycle
                .advance(ScenarioState::Reported)
                .expect("outcome accepts Reported");
            return ScenarioReport {
                id: scenario.id,
                name: scenario.name,
                state: ScenarioState::Errored,
                duration_ms: elapsed_ms(start),
                steps: scenario.steps.iter().map(StepResult::skipped).collect(),
                fatal: Some(e.to_string()),
            };
        }
    };

    let mut ctx = ScenarioContext {
        session,
        fixtures: Fixtures::new(provider.fixtures()),
        notifications: provider.notifications(),
        wait: scenario.wait.clone(),
    };

    let mut execution = execute_scenario(&scenario, &mut ctx).await;

    if let Err(e) = ctx.fixtures.teardown_all() {
        tracing::warn!(scenario = scenario.name.as_str(), error = %e, "fixture teardown failed");
        if execution.fatal.is_none() {
            execution.fatal = Some(e.to_string());
        }
    }

    if let Err(e) = provider.release(ctx.session).await {
        tracing::warn!(scenario = scenario.name.as_str(), error = %e, "session release failed");
        if execution.fatal.is_none() {
            execution.fatal = Some(e.to_string());
        }
    }

    let state = outcome_state(&execution);
    lifecycle.advance(state).expect("Running accepts an outcome");
    lifecycle
        .advance(ScenarioState::Reported)
        .expect("outcome accepts Reported");
    tracing::info!(scenario = scenario.name.as_str(), state = ?state, "finished");

    ScenarioReport {
        id: scenario.id,
        name: scenario.name,
        state,
        duration_ms: elapsed_ms(start),
        steps: execution.results,
        fatal: execution.fatal,
    }
}

/// Map an execution to the scenario's terminal state
fn outcome_state(execution: &ScenarioExecution) -> ScenarioState {
    if execution.fatal.is_some()
        || execution
            .results
            .iter()
            .any(|r| contains_status(r, StepStatus::Errored))
    {
        ScenarioState::Errored
    } else if execution.results.iter().any(StepResult::has_failure) {
        ScenarioState::Failed
    } else {
        ScenarioState::Passed
    }
}

fn contains_status(result: &StepResult, status: StepStatus) -> bool {
    result.status == status
        || result
            .children
            .iter()
            .any(|c| contains_status(c, status))
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// Extract the panic message from a failed scenario task
fn panic_reason(error: tokio::task::JoinError) -> String {
    match error.try_into_panic() {
        Ok(payload) => payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_string()),
        Err(error) => error.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::locator::Locator;
    use crate::mock::MockSession;
    use crate::result::{RecorrerError, RecorrerResult};
    use crate::session::Session;
    use crate::step::{Action, Step};

    type SessionSetup = Box<dyn Fn(&Scenario, &mut MockSession) + Send + Sync>;

    /// Provider that builds a fresh scripted `MockSession` per scenario
    struct MockProvider {
        setup: SessionSetup,
        acquired: AtomicUsize,
        released: AtomicUsize,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl MockProvider {
        fn new<F>(setup: F) -> Arc<Self>
        where
            F: Fn(&Scenario, &mut MockSession) + Send + Sync + 'static,
        {
            Arc::new(Self {
                setup: Box::new(setup),
                acquired: AtomicUsize::new(0),
                released: AtomicUsize::new(0),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl SessionProvider for MockProvider {
        async fn acquire(&self, scenario: &Scenario) -> RecorrerResult<Box<dyn Session>> {
            self.acquired.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            let mut session = MockSession::new();
            (self.setup)(scenario, &mut session);
            Ok(Box::new(session))
        }

        async fn release(&self, session: Box<dyn Session>) -> RecorrerResult<()> {
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.released.fetch_add(1, Ordering::SeqCst);
            drop(session);
            Ok(())
        }
    }

    fn runner(provider: Arc<MockProvider>) -> ScenarioRunner {
        ScenarioRunner::new(RunnerConfig::new("test suite"), provider)
    }

    #[tokio::test]
    async fn test_passing_suite() {
        let provider = MockProvider::new(|_, session| {
            let _ = session.add_element(|e| e.test_id("root").text("ready"));
        });
        let scenarios = vec![
            Scenario::new("a", vec![Step::assert_text("check", Locator::test_id("root"), "ready")]),
            Scenario::new("b", vec![Step::assert_count("count", Locator::test_id("root"), 1)]),
        ];

        let report = runner(Arc::clone(&provider)).run(scenarios).await;
        assert!(report.all_passed());
        assert_eq!(report.count(ScenarioState::Passed), 2);
    }

    #[tokio::test]
    async fn test_report_preserves_submission_order() {
        let provider = MockProvider::new(|_, _| {});
        let scenarios: Vec<Scenario> = (0..8)
            .map(|i| Scenario::new(format!("scenario-{i}"), vec![]))
            .collect();

        let report = runner(Arc::clone(&provider)).run(scenarios).await;
        let names: Vec<&str> = report.scenarios.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(
            names,
            (0..8).map(|i| format!("scenario-{i}")).collect::<Vec<_>>()
        );
    }

    #[tokio::test]
    async fn test_assertion_mismatch_fails_the_scenario() {
        let provider = MockProvider::new(|_, session| {
            let _ = session.add_element(|e| e.test_id("root").text("wrong"));
        });
        let scenarios = vec![Scenario::new(
            "bad",
            vec![Step::assert_text("check", Locator::test_id("root"), "right")],
        )];

        let report = runner(Arc::clone(&provider)).run(scenarios).await;
        assert_eq!(report.scenarios[0].state, ScenarioState::Failed);
        let failures = report.failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].step_path, "bad > check");
    }

    #[tokio::test]
    async fn test_resolution_error_marks_scenario_errored() {
        let provider = MockProvider::new(|_, _| {});
        let scenarios = vec![Scenario::new(
            "missing target",
            vec![Step::click("click", Locator::test_id("nope"))],
        )];

        let report = runner(Arc::clone(&provider)).run(scenarios).await;
        assert_eq!(report.scenarios[0].state, ScenarioState::Errored);
    }

    #[tokio::test]
    async fn test_acquire_failure_reports_errored_with_skipped_steps() {
        struct FailingProvider;

        #[async_trait]
        impl SessionProvider for FailingProvider {
            async fn acquire(&self, _: &Scenario) -> RecorrerResult<Box<dyn Session>> {
                Err(RecorrerError::Environment {
                    message: "browser pool exhausted".to_string(),
                })
            }
        }

        let runner = ScenarioRunner::new(
            RunnerConfig::new("test suite"),
            Arc::new(FailingProvider),
        );
        let scenarios = vec![Scenario::new(
            "never runs",
            vec![Step::click("click", Locator::test_id("x"))],
        )];

        let report = runner.run(scenarios).await;
        let scenario = &report.scenarios[0];
        assert_eq!(scenario.state, ScenarioState::Errored);
        assert_eq!(scenario.fatal.as_deref(), Some("Environment error: browser pool exhausted"));
        assert_eq!(scenario.steps[0].status, StepStatus::Skipped);
    }

    #[tokio::test]
    async fn test_session_released_once_per_scenario_on_every_path() {
        let provider = MockProvider::new(|scenario, session| {
            if scenario.name == "passing" {
                let _ = session.add_element(|e| e.test_id("root"));
            }
        });
        let scenarios = vec![
            Scenario::new("passing", vec![Step::assert_count("c", Locator::test_id("root"), 1)]),
            Scenario::new("erroring", vec![Step::click("c", Locator::test_id("root"))]),
            Scenario::new(
                "fatal",
                vec![Step::leaf("dismiss", Action::DismissNotifications)],
            ),
        ];

        let report = runner(Arc::clone(&provider)).run(scenarios).await;
        assert_eq!(report.scenarios.len(), 3);
        assert_eq!(provider.acquired.load(Ordering::SeqCst), 3);
        assert_eq!(provider.released.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let provider = MockProvider::new(|_, _| {});
        let scenarios: Vec<Scenario> = (0..6)
            .map(|i| {
                Scenario::new(
                    format!("s{i}"),
                    vec![Step::leaf("pause", Action::Delay { ms: 20 })],
                )
            })
            .collect();

        let runner = ScenarioRunner::new(
            RunnerConfig::new("test suite").with_max_concurrency(2),
            Arc::clone(&provider) as Arc<dyn SessionProvider>,
        );
        let report = runner.run(scenarios).await;

        assert_eq!(report.scenarios.len(), 6);
        assert!(provider.max_in_flight.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_scenarios_do_not_share_document_state() {
        // Both scenarios write to the same input, and each checks the
        // input is empty before filling it. A shared session would leak
        // one writer's value into the other's pre-fill check.
        let provider = MockProvider::new(|_, session| {
            let input = session.add_element(|e| e.label("Name"));
            session.on_evaluate_with("nameValue", move |dom| {
                json!(dom.value_of(input).unwrap_or_default())
            });
        });
        let write_then_check = |name: &str, value: &str| {
            Scenario::new(
                name,
                vec![
                    Step::leaf(
                        "starts empty",
                        Action::AssertEvaluate {
                            expression: "nameValue".to_string(),
                            expected: json!(""),
                        },
                    ),
                    Step::fill("fill", Locator::label("Name"), value),
                    Step::leaf(
                        "holds the fill",
                        Action::AssertEvaluate {
                            expression: "nameValue".to_string(),
                            expected: json!(value),
                        },
                    ),
                ],
            )
        };
        let scenarios = vec![
            write_then_check("writer a", "alpha"),
            write_then_check("writer b", "beta"),
        ];

        let report = runner(Arc::clone(&provider)).run(scenarios).await;
        assert!(report.all_passed(), "{:?}", report.failures());
    }

    #[tokio::test]
    async fn test_panicking_scenario_still_appears_in_the_report() {
        struct PanickingSession;

        #[async_trait]
        impl Session for PanickingSession {
            async fn navigate(&mut self, _: &str) -> RecorrerResult<()> {
                Ok(())
            }
            fn url(&self) -> String {
                String::new()
            }
            fn epoch(&self) -> u64 {
                0
            }
            async fn resolve(
                &mut self,
                _: &Locator,
            ) -> RecorrerResult<Vec<crate::session::ElementHandle>> {
                panic!("driver crashed")
            }
            async fn click(&mut self, _: &crate::session::ElementHandle) -> RecorrerResult<()> {
                Ok(())
            }
            async fn fill(
                &mut self,
                _: &crate::session::ElementHandle,
                _: &str,
            ) -> RecorrerResult<()> {
                Ok(())
            }
            async fn text(&mut self, _: &crate::session::ElementHandle) -> RecorrerResult<String> {
                Ok(String::new())
            }
            async fn is_visible(
                &mut self,
                _: &crate::session::ElementHandle,
            ) -> RecorrerResult<bool> {
                Ok(true)
            }
            async fn evaluate(&mut self, _: &str) -> RecorrerResult<serde_json::Value> {
                Ok(serde_json::Value::Null)
            }
        }

        struct MixedProvider;

        #[async_trait]
        impl SessionProvider for MixedProvider {
            async fn acquire(&self, scenario: &Scenario) -> RecorrerResult<Box<dyn Session>> {
                if scenario.name == "crashes" {
                    Ok(Box::new(PanickingSession))
                } else {
                    let mut session = MockSession::new();
                    let _ = session.add_element(|e| e.test_id("root"));
                    Ok(Box::new(session))
                }
            }
        }

        let runner = ScenarioRunner::new(
            RunnerConfig::new("test suite"),
            Arc::new(MixedProvider),
        );
        let scenarios = vec![
            Scenario::new("crashes", vec![Step::click("boom", Locator::test_id("root"))]),
            Scenario::new(
                "survives",
                vec![Step::assert_count("root exists", Locator::test_id("root"), 1)],
            ),
        ];

        let report = runner.run(scenarios).await;
        assert_eq!(report.scenarios.len(), 2);

        let crashed = &report.scenarios[0];
        assert_eq!(crashed.name, "crashes");
        assert_eq!(crashed.state, ScenarioState::Errored);
        assert_eq!(crashed.steps[0].status, StepStatus::Skipped);
        let fatal = crashed.fatal.as_deref().unwrap();
        assert!(fatal.contains("panicked"), "{fatal}");
        assert!(fatal.contains("driver crashed"), "{fatal}");

        assert_eq!(report.scenarios[1].state, ScenarioState::Passed);
        assert!(!report.all_passed());
    }
}
