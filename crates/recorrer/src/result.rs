//! Result and error types for Recorrer.

use thiserror::Error;

/// Result type for Recorrer operations
pub type RecorrerResult<T> = Result<T, RecorrerError>;

/// Errors that can occur while driving a scenario
#[derive(Debug, Error)]
pub enum RecorrerError {
    /// Expected/actual mismatch raised by the assertion engine.
    ///
    /// Recorded against the step; remaining non-critical siblings continue.
    #[error("Assertion failed: {description} (expected {expected}, got {actual})")]
    AssertionFailed {
        /// What was being checked
        description: String,
        /// Expected value, rendered for diagnostics
        expected: String,
        /// Actual value, rendered for diagnostics
        actual: String,
    },

    /// A wait predicate never became true
    #[error("Timed out after {ms}ms waiting for {waited_for} (last observed: {last_observed})")]
    Timeout {
        /// Timeout in milliseconds
        ms: u64,
        /// Description of the awaited condition
        waited_for: String,
        /// Last value the probe observed before giving up
        last_observed: String,
    },

    /// A required locator matched zero elements
    #[error("No element matched required locator: {locator}")]
    Resolution {
        /// Human description of the locator
        locator: String,
    },

    /// An element handle was used across a navigation boundary
    #[error("Stale element handle: {description} (resolved before a navigation)")]
    StaleHandle {
        /// Description of the stale handle
        description: String,
    },

    /// Session/browser-level failure unrelated to application logic.
    ///
    /// Always fatal to the owning scenario, never retried.
    #[error("Environment error: {message}")]
    Environment {
        /// Error message
        message: String,
    },

    /// Navigation failed
    #[error("Navigation to {url} failed: {message}")]
    Navigation {
        /// URL that failed
        url: String,
        /// Error message
        message: String,
    },

    /// Fixture construction or teardown failed
    #[error("Fixture error: {message}")]
    Fixture {
        /// Error message
        message: String,
    },

    /// Scenario state machine violation (operation called in wrong state)
    #[error("Invalid state: {message}")]
    InvalidState {
        /// Error message
        message: String,
    },

    /// Scenario definition could not be parsed
    #[error("Scenario parse error: {message}")]
    ScenarioParse {
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl RecorrerError {
    /// Whether this error is fatal to the scenario (escalates past the
    /// failing step instead of being recorded and continued from).
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Environment { .. }
                | Self::Fixture { .. }
                | Self::InvalidState { .. }
                | Self::Io(_)
        )
    }

    /// Whether this error marks the step `errored` rather than `failed`
    #[must_use]
    pub const fn is_step_error(&self) -> bool {
        matches!(
            self,
            Self::Resolution { .. } | Self::StaleHandle { .. } | Self::Navigation { .. }
        ) || self.is_fatal()
    }
}
