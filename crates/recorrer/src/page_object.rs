//! Page models.
//!
//! A [`PageModel`] names the locators of one application view so scenarios
//! reference elements by role in the flow ("create button", "name input")
//! instead of repeating raw selectors. Models are plain data and register
//! as scenario fixtures, so a suite shares one definition per view.
//!
//! [`ConfirmModal`] captures the confirm-dialog shape that admin UIs
//! repeat everywhere: a root container, a confirm button, a cancel button,
//! and the expectation that the dialog goes away after either.

use std::any::Any;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::fixture::ScenarioFixture;
use crate::locator::Locator;
use crate::result::{RecorrerError, RecorrerResult};
use crate::step::Step;
use crate::wait::ElementState;

/// How a page recognizes its URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UrlMatcher {
    /// URL must equal the value
    Exact(String),
    /// URL must start with the value
    Prefix(String),
    /// URL must contain the value
    Contains(String),
}

impl UrlMatcher {
    /// Whether `url` belongs to this page
    #[must_use]
    pub fn matches(&self, url: &str) -> bool {
        match self {
            Self::Exact(expected) => url == expected,
            Self::Prefix(prefix) => url.starts_with(prefix.as_str()),
            Self::Contains(fragment) => url.contains(fragment.as_str()),
        }
    }
}

/// Named locators for one application view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageModel {
    /// Page name, used in fixture registration and errors
    pub name: String,
    /// URL recognition for this page
    pub url: UrlMatcher,
    locators: HashMap<String, Locator>,
}

impl PageModel {
    /// Create a model
    #[must_use]
    pub fn new(name: impl Into<String>, url: UrlMatcher) -> Self {
        Self {
            name: name.into(),
            url,
            locators: HashMap::new(),
        }
    }

    /// Register a locator under a role name; replaces any previous entry
    #[must_use]
    pub fn with_locator(mut self, role: impl Into<String>, locator: Locator) -> Self {
        let _ = self.locators.insert(role.into(), locator);
        self
    }

    /// Look up a locator by role name
    #[must_use]
    pub fn locator(&self, role: &str) -> Option<&Locator> {
        self.locators.get(role)
    }

    /// Look up a locator that must exist
    ///
    /// # Errors
    ///
    /// Returns [`RecorrerError::Resolution`] for an unknown role name.
    pub fn require(&self, role: &str) -> RecorrerResult<Locator> {
        self.locator(role)
            .cloned()
            .ok_or_else(|| RecorrerError::Resolution {
                locator: format!("page '{}' defines no locator '{role}'", self.name),
            })
    }

    /// Registered role names
    #[must_use]
    pub fn roles(&self) -> Vec<&str> {
        self.locators.keys().map(String::as_str).collect()
    }
}

impl ScenarioFixture for PageModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// The recurring confirm-dialog shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfirmModal {
    /// Dialog container
    pub root: Locator,
    /// Confirm button, resolved within the container
    pub confirm: Locator,
    /// Cancel button, resolved within the container
    pub cancel: Locator,
}

impl ConfirmModal {
    /// Describe a modal by its container and button locators.
    ///
    /// Buttons are scoped under the container, so a page with several
    /// dialogs resolves the right one.
    #[must_use]
    pub fn new(root: Locator, confirm: Locator, cancel: Locator) -> Self {
        Self {
            confirm: confirm.within(root.clone()),
            cancel: cancel.within(root.clone()),
            root,
        }
    }

    /// Steps that confirm the dialog and wait for it to go away
    #[must_use]
    pub fn confirm_steps(&self, name: impl Into<String>) -> Step {
        Step::group(
            name,
            vec![
                Step::wait_for("modal attached", self.root.clone(), ElementState::Attached),
                Step::click("confirm", self.confirm.clone()),
                Step::wait_for("modal detached", self.root.clone(), ElementState::Detached),
            ],
        )
    }

    /// Steps that cancel the dialog and wait for it to go away
    #[must_use]
    pub fn cancel_steps(&self, name: impl Into<String>) -> Step {
        Step::group(
            name,
            vec![
                Step::wait_for("modal attached", self.root.clone(), ElementState::Attached),
                Step::click("cancel", self.cancel.clone()),
                Step::wait_for("modal detached", self.root.clone(), ElementState::Detached),
            ],
        )
    }
}
