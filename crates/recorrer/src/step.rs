//! Declarative step tree.
//!
//! A step is a named unit of work: either a leaf [`Action`] or a composite
//! group of sub-steps. The tree is plain data — serializable, so scenario
//! files can be written in YAML or JSON and diffed like any other source —
//! and execution is someone else's job ([`crate::executor`]).

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::assertion::AssertionResult;
use crate::locator::Locator;
use crate::wait::ElementState;

/// Atomic action a leaf step performs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    /// Navigate to a URL
    Navigate {
        /// Destination URL
        url: String,
    },
    /// Click the first match of a locator
    Click {
        /// Target element
        locator: Locator,
    },
    /// Fill the first match of a locator with text
    Fill {
        /// Target element
        locator: Locator,
        /// Text to enter
        text: String,
    },
    /// Wait for a locator to reach a state
    WaitFor {
        /// Target element
        locator: Locator,
        /// State to wait for (appear and disappear both supported)
        state: ElementState,
        /// Override of the scenario's default wait timeout
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout_ms: Option<u64>,
    },
    /// Fixed delay. A flagged anti-pattern kept only as a fallback when no
    /// deterministic signal exists; the executor logs a warning and marks
    /// the step result.
    Delay {
        /// Delay in milliseconds
        ms: u64,
    },
    /// Capture the text of the first match as a named diagnostic payload
    Capture {
        /// Target element
        locator: Locator,
        /// Name the captured value is stored under
        key: String,
    },
    /// Assert the first match's text equals `expected`
    AssertText {
        /// Target element
        locator: Locator,
        /// Expected text
        expected: String,
    },
    /// Assert the number of matches
    AssertCount {
        /// Target elements
        locator: Locator,
        /// Expected match count
        expected: usize,
    },
    /// Assert at least one match is visible
    AssertVisible {
        /// Target element
        locator: Locator,
    },
    /// Assert no match is visible
    AssertHidden {
        /// Target element
        locator: Locator,
    },
    /// Assert a driver-evaluated expression yields `expected`
    AssertEvaluate {
        /// Driver-defined expression
        expression: String,
        /// Expected JSON value
        expected: Value,
    },
    /// Dismiss transient notifications via the injected controller
    DismissNotifications,
}

impl Action {
    /// Short label used in logs and step paths
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Navigate { .. } => "navigate",
            Self::Click { .. } => "click",
            Self::Fill { .. } => "fill",
            Self::WaitFor { .. } => "wait_for",
            Self::Delay { .. } => "delay",
            Self::Capture { .. } => "capture",
            Self::AssertText { .. } => "assert_text",
            Self::AssertCount { .. } => "assert_count",
            Self::AssertVisible { .. } => "assert_visible",
            Self::AssertHidden { .. } => "assert_hidden",
            Self::AssertEvaluate { .. } => "assert_evaluate",
            Self::DismissNotifications => "dismiss_notifications",
        }
    }
}

/// Leaf or composite payload of a step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StepKind {
    /// A single atomic action
    Leaf {
        /// The action to perform
        action: Action,
    },
    /// An ordered group of sub-steps
    Composite {
        /// Children, executed in declared order
        steps: Vec<Step>,
    },
}

/// One named unit of work inside a scenario
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// Step name, used in reports and step paths
    pub name: String,
    /// Leaf action or composite children
    #[serde(flatten)]
    pub kind: StepKind,
    /// When a critical step fails, its remaining siblings are skipped
    /// (recorded as such, never dropped)
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub critical: bool,
    /// Marks a step whose assertion is knowingly missing; reported as
    /// `Pending`, never as silent success
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_assertion: Option<String>,
}

impl Step {
    /// Create a leaf step
    #[must_use]
    pub fn leaf(name: impl Into<String>, action: Action) -> Self {
        Self {
            name: name.into(),
            kind: StepKind::Leaf { action },
            critical: false,
            pending_assertion: None,
        }
    }

    /// Create a composite step
    #[must_use]
    pub fn group(name: impl Into<String>, steps: Vec<Step>) -> Self {
        Self {
            name: name.into(),
            kind: StepKind::Composite { steps },
            critical: false,
            pending_assertion: None,
        }
    }

    /// Mark the step critical: if it fails, remaining siblings are skipped
    #[must_use]
    pub const fn critical(mut self) -> Self {
        self.critical = true;
        self
    }

    /// Mark the step's assertion as knowingly missing
    #[must_use]
    pub fn pending_assertion(mut self, reason: impl Into<String>) -> Self {
        self.pending_assertion = Some(reason.into());
        self
    }

    // Convenience constructors for the common leaf actions. Scenario code
    // reads like the flow it drives.

    /// Navigate step
    #[must_use]
    pub fn navigate(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self::leaf(name, Action::Navigate { url: url.into() })
    }

    /// Click step
    #[must_use]
    pub fn click(name: impl Into<String>, locator: Locator) -> Self {
        Self::leaf(name, Action::Click { locator })
    }

    /// Fill step
    #[must_use]
    pub fn fill(name: impl Into<String>, locator: Locator, text: impl Into<String>) -> Self {
        Self::leaf(
            name,
            Action::Fill {
                locator,
                text: text.into(),
            },
        )
    }

    /// Wait step
    #[must_use]
    pub fn wait_for(name: impl Into<String>, locator: Locator, state: ElementState) -> Self {
        Self::leaf(
            name,
            Action::WaitFor {
                locator,
                state,
                timeout_ms: None,
            },
        )
    }

    /// Capture step
    #[must_use]
    pub fn capture(name: impl Into<String>, locator: Locator, key: impl Into<String>) -> Self {
        Self::leaf(
            name,
            Action::Capture {
                locator,
                key: key.into(),
            },
        )
    }

    /// Text assertion step
    #[must_use]
    pub fn assert_text(
        name: impl Into<String>,
        locator: Locator,
        expected: impl Into<String>,
    ) -> Self {
        Self::leaf(
            name,
            Action::AssertText {
                locator,
                expected: expected.into(),
            },
        )
    }

    /// Count assertion step
    #[must_use]
    pub fn assert_count(name: impl Into<String>, locator: Locator, expected: usize) -> Self {
        Self::leaf(name, Action::AssertCount { locator, expected })
    }

    /// Number of steps in this subtree, this step included
    #[must_use]
    pub fn declared_count(&self) -> usize {
        match &self.kind {
            StepKind::Leaf { .. } => 1,
            StepKind::Composite { steps } => {
                1 + steps.iter().map(Step::declared_count).sum::<usize>()
            }
        }
    }
}

/// Outcome kind of one executed (or skipped) step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// The step ran and its checks held
    Passed,
    /// An assertion mismatch or wait timeout
    Failed,
    /// A resolution, stale-handle, or environment failure
    Errored,
    /// Not executed because a critical sibling failed earlier
    Skipped,
    /// Executed, but its assertion is knowingly missing
    Pending,
}

impl StepStatus {
    /// Whether the step counts against the scenario
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::Failed | Self::Errored)
    }
}

/// A diagnostic payload captured during a step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapturedValue {
    /// Name the value was captured under
    pub key: String,
    /// The captured value
    pub value: Value,
}

/// Result of executing one step. Owned by the enclosing scenario result;
/// ordering matches declaration order exactly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    /// Step name
    pub name: String,
    /// Outcome
    pub status: StepStatus,
    /// Wall-clock duration in milliseconds
    pub duration_ms: u64,
    /// Assertion outcome, when the step carried one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assertion: Option<AssertionResult>,
    /// Error message for failed/errored steps
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Captured diagnostic payload, if the step produced one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub captured: Option<CapturedValue>,
    /// Set when the step relied on a fixed delay (technical-debt marker)
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub flagged_delay: bool,
    /// Reason the step's assertion is knowingly missing (Pending status)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_reason: Option<String>,
    /// Results of composite children, in declared order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<StepResult>,
}

impl StepResult {
    /// A skipped placeholder for a step that never ran
    #[must_use]
    pub fn skipped(step: &Step) -> Self {
        let children = match &step.kind {
            StepKind::Leaf { .. } => Vec::new(),
            StepKind::Composite { steps } => steps.iter().map(Self::skipped).collect(),
        };
        Self {
            name: step.name.clone(),
            status: StepStatus::Skipped,
            duration_ms: 0,
            assertion: None,
            error: None,
            captured: None,
            flagged_delay: false,
            pending_reason: None,
            children,
        }
    }

    /// Number of results in this subtree, this one included
    #[must_use]
    pub fn result_count(&self) -> usize {
        1 + self
            .children
            .iter()
            .map(StepResult::result_count)
            .sum::<usize>()
    }

    /// Whether this subtree contains any failure
    #[must_use]
    pub fn has_failure(&self) -> bool {
        self.status.is_failure() || self.children.iter().any(StepResult::has_failure)
    }
}
