//! Session seam between the runner core and a live browser page.
//!
//! The core never talks to a real browser directly: every scenario drives a
//! [`Session`] implementation injected through the fixture provider. The
//! trait is deliberately small — navigation, locator resolution, and the
//! handful of element operations the step executor needs.

use async_trait::async_trait;
use serde_json::Value;

use crate::locator::Locator;
use crate::result::{RecorrerError, RecorrerResult};

/// Ephemeral handle to a resolved element.
///
/// Handles are owned by the step that resolved them and are stamped with
/// the session's navigation epoch: using a handle after a navigation is a
/// [`RecorrerError::StaleHandle`], not undefined behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementHandle {
    /// Driver-assigned element id, meaningless across navigations
    id: u64,
    /// Navigation epoch the handle was resolved in
    epoch: u64,
    /// Locator description the handle came from, for diagnostics
    description: String,
}

impl ElementHandle {
    /// Create a handle. Called by session drivers, not by test code.
    #[must_use]
    pub fn new(id: u64, epoch: u64, description: impl Into<String>) -> Self {
        Self {
            id,
            epoch,
            description: description.into(),
        }
    }

    /// Driver-assigned element id
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Navigation epoch the handle belongs to
    #[must_use]
    pub const fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Locator description for diagnostics
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Check the handle against the session's current navigation epoch.
    ///
    /// # Errors
    ///
    /// Returns [`RecorrerError::StaleHandle`] if a navigation happened
    /// since the handle was resolved.
    pub fn ensure_fresh(&self, current_epoch: u64) -> RecorrerResult<()> {
        if self.epoch == current_epoch {
            Ok(())
        } else {
            Err(RecorrerError::StaleHandle {
                description: self.description.clone(),
            })
        }
    }
}

/// One isolated browser-tab-like session.
///
/// Implementations wrap whatever actually renders the application under
/// test — a CDP driver, a server-side DOM, or the in-memory
/// [`crate::mock::MockSession`] used in this crate's own tests.
#[async_trait]
pub trait Session: Send {
    /// Navigate to a URL and wait for document readiness.
    ///
    /// Navigation invalidates all outstanding element handles (the
    /// session's epoch advances).
    async fn navigate(&mut self, url: &str) -> RecorrerResult<()>;

    /// Current document URL
    fn url(&self) -> String;

    /// Current navigation epoch
    fn epoch(&self) -> u64;

    /// Resolve a locator against the live document.
    ///
    /// Always re-queries; never memoizes. Zero matches is a normal outcome
    /// and returns an empty vec — callers decide whether that is an error.
    async fn resolve(&mut self, locator: &Locator) -> RecorrerResult<Vec<ElementHandle>>;

    /// Click an element
    async fn click(&mut self, handle: &ElementHandle) -> RecorrerResult<()>;

    /// Replace an input element's value
    async fn fill(&mut self, handle: &ElementHandle, text: &str) -> RecorrerResult<()>;

    /// Text content of an element
    async fn text(&mut self, handle: &ElementHandle) -> RecorrerResult<String>;

    /// Whether an element is visible (attached and not hidden)
    async fn is_visible(&mut self, handle: &ElementHandle) -> RecorrerResult<bool>;

    /// Evaluate an expression in the document and return its JSON value.
    ///
    /// The expression language is driver-defined; the core only compares
    /// the returned value.
    async fn evaluate(&mut self, expression: &str) -> RecorrerResult<Value>;

    /// Resolve a locator that must match at least one element.
    ///
    /// # Errors
    ///
    /// Returns [`RecorrerError::Resolution`] on zero matches.
    async fn resolve_one(&mut self, locator: &Locator) -> RecorrerResult<ElementHandle> {
        let mut handles = self.resolve(locator).await?;
        if handles.is_empty() {
            return Err(RecorrerError::Resolution {
                locator: locator.description(),
            });
        }
        Ok(handles.swap_remove(0))
    }
}
