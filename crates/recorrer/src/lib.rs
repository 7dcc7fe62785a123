//! Recorrer: Declarative Browser-Flow Testing
//!
//! Recorrer (Spanish: "to walk through") runs admin-UI flows — create a
//! role, attach it to a user, delete it, watch the snackbar confirm — as
//! declarative scenarios instead of imperative driver scripts. Scenarios
//! are plain data (YAML/JSON-serializable step trees); the runner gives
//! each one an isolated session and aggregates a structured report.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    RECORRER Architecture                      │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌───────────┐   ┌───────────┐   ┌───────────┐   ┌─────────┐ │
//! │  │ Scenario  │   │ Step      │   │ Session   │   │ Report  │ │
//! │  │ (YAML /   │──►│ Executor  │──►│ seam      │──►│ (JSON / │ │
//! │  │  builder) │   │ + waits   │   │ (driver)  │   │ summary)│ │
//! │  └───────────┘   └───────────┘   └───────────┘   └─────────┘ │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Failures stop at the step boundary: a failed assertion marks its step
//! and the scenario, never the suite. Only environment-level failures
//! (session gone, fixture broken) abort a scenario early, and even then
//! every declared step still appears in the report.

#![warn(missing_docs)]
// Lints are configured in workspace Cargo.toml [workspace.lints.clippy]
#![cfg_attr(test, allow(clippy::large_stack_arrays, clippy::large_stack_frames))]

mod assertion;
#[allow(
    clippy::missing_errors_doc,
    clippy::must_use_candidate,
    clippy::missing_const_for_fn
)]
mod executor;
#[allow(
    clippy::missing_errors_doc,
    clippy::must_use_candidate,
    clippy::missing_const_for_fn
)]
mod fixture;
mod locator;
mod logging;
mod report;
mod result;
#[allow(
    clippy::missing_errors_doc,
    clippy::must_use_candidate,
    clippy::missing_const_for_fn
)]
mod runner;
mod scenario;
mod session;
mod step;
mod wait;

/// Page Object Model Support
#[allow(
    clippy::missing_errors_doc,
    clippy::must_use_candidate,
    clippy::missing_const_for_fn
)]
pub mod page_object;

/// In-Memory Session Driver for Tests
///
/// Drive the full runner without a browser: scripted click handlers,
/// navigation routes, and poll-scheduled document mutations.
#[allow(
    clippy::missing_errors_doc,
    clippy::must_use_candidate,
    clippy::missing_const_for_fn
)]
pub mod mock;

pub use assertion::{
    assert_contains, assert_count, assert_equal, assert_record_equal, assert_visible,
    AssertionResult,
};
pub use executor::{execute_scenario, ScenarioContext, ScenarioExecution};
pub use fixture::{
    ClickToDismiss, FixtureFactory, FixtureRegistry, Fixtures, NotificationController,
    ScenarioFixture, SessionProvider, DEFAULT_DISMISS_ROUNDS,
};
pub use locator::{Locator, Selector};
pub use logging::{init_json_tracing, init_tracing};
pub use page_object::{ConfirmModal, PageModel, UrlMatcher};
pub use report::{FailureDetail, PendingDetail, Report, ScenarioReport};
pub use result::{RecorrerError, RecorrerResult};
pub use runner::{RunnerConfig, ScenarioRunner, DEFAULT_MAX_CONCURRENCY};
pub use scenario::{filter_by_tag, Scenario, ScenarioLifecycle, ScenarioState};
pub use session::{ElementHandle, Session};
pub use step::{Action, CapturedValue, Step, StepKind, StepResult, StepStatus};
pub use wait::{
    wait_for_state, wait_until, ElementState, PollSample, Probe, WaitOptions, WaitSuccess,
    DEFAULT_POLL_INTERVAL_MS, DEFAULT_WAIT_TIMEOUT_MS,
};
