//! Predicate-based waiting.
//!
//! The wait primitive polls a probe until it holds or a timeout elapses,
//! yielding to the runtime between polls (`tokio::time::sleep`) so queued
//! UI work — animations, network responses — can proceed. It never
//! partially succeeds: either the probe held, or the caller gets a
//! [`RecorrerError::Timeout`] carrying the last observed value.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use crate::locator::Locator;
use crate::result::{RecorrerError, RecorrerResult};
use crate::session::Session;

/// Default timeout for wait operations (5 seconds)
pub const DEFAULT_WAIT_TIMEOUT_MS: u64 = 5000;

/// Default polling interval (50ms)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 50;

/// Element states a wait can target.
///
/// Appear (`Attached`/`Visible`) and disappear (`Detached`/`Hidden`)
/// semantics are both first-class; disappearance is not modeled as a
/// negated attachment check bolted on by callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementState {
    /// At least one match is present in the document
    Attached,
    /// No match is present in the document
    Detached,
    /// At least one match is present and visible
    Visible,
    /// No match is visible (absent or hidden)
    Hidden,
}

impl ElementState {
    /// Whether this state waits for the element to go away
    #[must_use]
    pub const fn is_disappear(&self) -> bool {
        matches!(self, Self::Detached | Self::Hidden)
    }

    /// State name used in diagnostics
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Attached => "attached",
            Self::Detached => "detached",
            Self::Visible => "visible",
            Self::Hidden => "hidden",
        }
    }
}

impl std::fmt::Display for ElementState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Options for wait operations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitOptions {
    /// Timeout in milliseconds
    pub timeout_ms: u64,
    /// Polling interval in milliseconds
    pub poll_interval_ms: u64,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_WAIT_TIMEOUT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

impl WaitOptions {
    /// Create wait options with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set timeout in milliseconds
    #[must_use]
    pub const fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Set polling interval in milliseconds
    #[must_use]
    pub const fn with_poll_interval(mut self, poll_interval_ms: u64) -> Self {
        self.poll_interval_ms = poll_interval_ms;
        self
    }

    /// Timeout as a Duration
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Poll interval as a Duration
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// One observation of the awaited condition
#[derive(Debug, Clone)]
pub struct PollSample {
    /// Whether the condition currently holds
    pub holds: bool,
    /// What was observed, for timeout diagnostics
    pub observed: String,
}

impl PollSample {
    /// Create a sample
    #[must_use]
    pub fn new(holds: bool, observed: impl Into<String>) -> Self {
        Self {
            holds,
            observed: observed.into(),
        }
    }
}

/// A pollable condition.
///
/// Sampling may itself fail (driver errors propagate); a failed sample
/// aborts the wait rather than counting as "condition false".
#[async_trait]
pub trait Probe: Send {
    /// Take one sample of the condition
    async fn sample(&mut self) -> RecorrerResult<PollSample>;
}

/// Successful wait outcome
#[derive(Debug, Clone)]
pub struct WaitSuccess {
    /// Time spent waiting
    pub elapsed: Duration,
    /// Number of samples taken
    pub polls: u32,
}

/// Poll `probe` until it holds or `options.timeout_ms` elapses.
///
/// Always samples at least once, so a condition that already holds
/// succeeds even with a zero timeout.
///
/// # Errors
///
/// [`RecorrerError::Timeout`] with the probe's last observed value, or any
/// error the probe itself returns.
pub async fn wait_until(
    waited_for: &str,
    options: &WaitOptions,
    probe: &mut dyn Probe,
) -> RecorrerResult<WaitSuccess> {
    let start = Instant::now();
    let mut polls = 0u32;
    let mut last_observed;

    loop {
        let sample = probe.sample().await?;
        polls += 1;
        last_observed = sample.observed;

        if sample.holds {
            tracing::debug!(waited_for, polls, "wait satisfied");
            return Ok(WaitSuccess {
                elapsed: start.elapsed(),
                polls,
            });
        }

        if start.elapsed() >= options.timeout() {
            return Err(RecorrerError::Timeout {
                ms: options.timeout_ms,
                waited_for: waited_for.to_string(),
                last_observed,
            });
        }

        tokio::time::sleep(options.poll_interval()).await;
    }
}

/// Probe for an element reaching a target state
struct StateProbe<'a> {
    session: &'a mut dyn Session,
    locator: &'a Locator,
    state: ElementState,
}

#[async_trait]
impl Probe for StateProbe<'_> {
    async fn sample(&mut self) -> RecorrerResult<PollSample> {
        let handles = self.session.resolve(self.locator).await?;
        let attached = handles.len();
        let visible = {
            let mut n = 0usize;
            for handle in &handles {
                if self.session.is_visible(handle).await? {
                    n += 1;
                }
            }
            n
        };

        let holds = match self.state {
            ElementState::Attached => attached > 0,
            ElementState::Detached => attached == 0,
            ElementState::Visible => visible > 0,
            ElementState::Hidden => visible == 0,
        };

        Ok(PollSample::new(
            holds,
            format!("{attached} attached, {visible} visible"),
        ))
    }
}

/// Wait for `locator` to reach `state`.
///
/// # Errors
///
/// [`RecorrerError::Timeout`] if the state is never reached, or any
/// session error raised while sampling.
pub async fn wait_for_state(
    session: &mut dyn Session,
    locator: &Locator,
    state: ElementState,
    options: &WaitOptions,
) -> RecorrerResult<WaitSuccess> {
    let waited_for = format!("{} to be {state}", locator.description());
    let mut probe = StateProbe {
        session,
        locator,
        state,
    };
    wait_until(&waited_for, options, &mut probe).await
}
