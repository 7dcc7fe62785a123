//! Scenarios and their lifecycle.
//!
//! A scenario is a named, ordered sequence of steps with its own isolated
//! session. Its lifecycle is a small state machine —
//! `Pending -> Running -> {Passed, Failed, Errored} -> Reported` — and
//! terminal outcomes are final: the runner refuses illegal transitions
//! instead of silently overwriting a result.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::result::{RecorrerError, RecorrerResult};
use crate::step::Step;
use crate::wait::WaitOptions;

fn new_id() -> Uuid {
    Uuid::new_v4()
}

/// One end-to-end test case
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    /// Unique id, generated when the scenario is defined
    #[serde(default = "new_id")]
    pub id: Uuid,
    /// Scenario name, unique within a suite by convention
    pub name: String,
    /// Free-form tags for suite filtering
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// Ordered top-level steps
    pub steps: Vec<Step>,
    /// Default wait options for this scenario's `wait_for` steps
    #[serde(default)]
    pub wait: WaitOptions,
}

impl Scenario {
    /// Create a scenario from steps
    #[must_use]
    pub fn new(name: impl Into<String>, steps: Vec<Step>) -> Self {
        Self {
            id: new_id(),
            name: name.into(),
            tags: Vec::new(),
            steps,
            wait: WaitOptions::default(),
        }
    }

    /// Add a tag
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Override the default wait options
    #[must_use]
    pub fn with_wait(mut self, wait: WaitOptions) -> Self {
        self.wait = wait;
        self
    }

    /// Whether the scenario carries the given tag
    #[must_use]
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// Total number of declared steps, composites included
    #[must_use]
    pub fn declared_step_count(&self) -> usize {
        self.steps.iter().map(Step::declared_count).sum()
    }

    /// Parse a scenario from a YAML definition
    ///
    /// # Errors
    ///
    /// Returns [`RecorrerError::ScenarioParse`] on malformed input.
    pub fn from_yaml(yaml: &str) -> RecorrerResult<Self> {
        serde_yaml_ng::from_str(yaml).map_err(|e| RecorrerError::ScenarioParse {
            message: e.to_string(),
        })
    }

    /// Parse a scenario from a JSON definition
    ///
    /// # Errors
    ///
    /// Returns [`RecorrerError::ScenarioParse`] on malformed input.
    pub fn from_json(json: &str) -> RecorrerResult<Self> {
        serde_json::from_str(json).map_err(|e| RecorrerError::ScenarioParse {
            message: e.to_string(),
        })
    }
}

/// Keep only the scenarios carrying `tag`
#[must_use]
pub fn filter_by_tag(scenarios: Vec<Scenario>, tag: &str) -> Vec<Scenario> {
    scenarios.into_iter().filter(|s| s.has_tag(tag)).collect()
}

/// Scenario lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioState {
    /// Defined but not yet started
    Pending,
    /// Steps are executing
    Running,
    /// All steps passed
    Passed,
    /// At least one assertion or wait failed
    Failed,
    /// A resolution or environment failure occurred
    Errored,
    /// Outcome has been written to the report; nothing changes after this
    Reported,
}

impl ScenarioState {
    /// Whether this is an outcome state (terminal except for reporting)
    #[must_use]
    pub const fn is_outcome(&self) -> bool {
        matches!(self, Self::Passed | Self::Failed | Self::Errored)
    }

    /// Whether the transition `self -> next` is legal
    #[must_use]
    pub const fn can_transition(&self, next: ScenarioState) -> bool {
        match (self, next) {
            (Self::Pending, Self::Running) => true,
            (Self::Running, Self::Passed | Self::Failed | Self::Errored) => true,
            (Self::Passed | Self::Failed | Self::Errored, Self::Reported) => true,
            _ => false,
        }
    }
}

/// Enforced scenario lifecycle
#[derive(Debug, Clone, Copy)]
pub struct ScenarioLifecycle {
    state: ScenarioState,
}

impl Default for ScenarioLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl ScenarioLifecycle {
    /// Start in `Pending`
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: ScenarioState::Pending,
        }
    }

    /// Current state
    #[must_use]
    pub const fn state(&self) -> ScenarioState {
        self.state
    }

    /// Advance to `next`.
    ///
    /// # Errors
    ///
    /// Returns [`RecorrerError::InvalidState`] for an illegal transition;
    /// terminal states are immutable.
    pub fn advance(&mut self, next: ScenarioState) -> RecorrerResult<()> {
        if self.state.can_transition(next) {
            self.state = next;
            Ok(())
        } else {
            Err(RecorrerError::InvalidState {
                message: format!("illegal transition {:?} -> {next:?}", self.state),
            })
        }
    }
}
