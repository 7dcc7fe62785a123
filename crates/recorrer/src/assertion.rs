//! Assertion engine.
//!
//! Compares expected vs. actual UI-derived values and produces immutable
//! [`AssertionResult`]s. A mismatch converts to a
//! [`RecorrerError::AssertionFailed`] embedding description, expected, and
//! actual — the mechanism by which a failing scenario is detected.
//!
//! Equality semantics: value equality for primitives, structural equality
//! for row-data records ([`assert_record_equal`]), plain cardinality for
//! counts (match order never matters).

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::result::{RecorrerError, RecorrerResult};

/// Outcome of a single assertion. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssertionResult {
    /// What was being checked
    pub description: String,
    /// Expected value, rendered
    pub expected: String,
    /// Actual value, rendered
    pub actual: String,
    /// Whether the assertion held
    pub passed: bool,
}

impl AssertionResult {
    /// Build a result from rendered values
    #[must_use]
    pub fn new(
        description: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
        passed: bool,
    ) -> Self {
        Self {
            description: description.into(),
            expected: expected.into(),
            actual: actual.into(),
            passed,
        }
    }

    /// Convert into a `Result`, raising on mismatch.
    ///
    /// # Errors
    ///
    /// [`RecorrerError::AssertionFailed`] when the assertion did not hold.
    pub fn into_result(self) -> RecorrerResult<Self> {
        if self.passed {
            Ok(self)
        } else {
            Err(RecorrerError::AssertionFailed {
                description: self.description,
                expected: self.expected,
                actual: self.actual,
            })
        }
    }
}

/// Value equality for primitives and anything `PartialEq + Display`
pub fn assert_equal<T: PartialEq + std::fmt::Display>(
    actual: &T,
    expected: &T,
    description: impl Into<String>,
) -> AssertionResult {
    AssertionResult::new(
        description,
        expected.to_string(),
        actual.to_string(),
        actual == expected,
    )
}

/// Structural equality for row-data records.
///
/// Records are compared as JSON values, so field order and representation
/// details do not matter — only structure and content.
pub fn assert_record_equal(
    actual: &Value,
    expected: &Value,
    description: impl Into<String>,
) -> AssertionResult {
    AssertionResult::new(
        description,
        expected.to_string(),
        actual.to_string(),
        actual == expected,
    )
}

/// Cardinality check; the order matches were returned in is irrelevant
pub fn assert_count(
    actual: usize,
    expected: usize,
    description: impl Into<String>,
) -> AssertionResult {
    AssertionResult::new(
        description,
        format!("{expected} match(es)"),
        format!("{actual} match(es)"),
        actual == expected,
    )
}

/// Visibility check over an already-sampled boolean
pub fn assert_visible(visible: bool, description: impl Into<String>) -> AssertionResult {
    AssertionResult::new(description, "visible", if visible { "visible" } else { "hidden" }, visible)
}

/// Substring check for message-bearing elements (snackbars, alerts)
pub fn assert_contains(
    actual: &str,
    expected_fragment: &str,
    description: impl Into<String>,
) -> AssertionResult {
    AssertionResult::new(
        description,
        format!("contains \"{expected_fragment}\""),
        format!("\"{actual}\""),
        actual.contains(expected_fragment),
    )
}
