//! Locator abstraction for element selection.
//!
//! A [`Locator`] is a stateless descriptor, not a live handle: it is
//! re-resolved against the document every time it is used, so it can never
//! go stale across a navigation. Resolution itself lives on the session
//! seam ([`crate::session::Session::resolve`]) and returns zero-or-more
//! handles without failing — callers decide whether zero is acceptable.

use serde::{Deserialize, Serialize};

/// Selector kind for locating elements
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Selector {
    /// Test ID selector (data-testid attribute)
    TestId(String),
    /// ARIA role selector, optionally narrowed by accessible name
    Role {
        /// Role name (e.g. "button", "row", "option")
        role: String,
        /// Accessible name to match, if any
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    /// Form label selector
    Label(String),
    /// Visible text content selector
    Text(String),
    /// CSS-like selector, passed through to the session driver
    Css(String),
}

impl Selector {
    /// Create a test ID selector
    #[must_use]
    pub fn test_id(id: impl Into<String>) -> Self {
        Self::TestId(id.into())
    }

    /// Create a role selector
    #[must_use]
    pub fn role(role: impl Into<String>) -> Self {
        Self::Role {
            role: role.into(),
            name: None,
        }
    }

    /// Create a role selector narrowed by accessible name
    #[must_use]
    pub fn role_named(role: impl Into<String>, name: impl Into<String>) -> Self {
        Self::Role {
            role: role.into(),
            name: Some(name.into()),
        }
    }

    /// Create a label selector
    #[must_use]
    pub fn label(label: impl Into<String>) -> Self {
        Self::Label(label.into())
    }

    /// Create a text selector
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// Create a CSS selector
    #[must_use]
    pub fn css(selector: impl Into<String>) -> Self {
        Self::Css(selector.into())
    }
}

impl std::fmt::Display for Selector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TestId(id) => write!(f, "test-id={id}"),
            Self::Role { role, name: None } => write!(f, "role={role}"),
            Self::Role {
                role,
                name: Some(name),
            } => write!(f, "role={role}[name={name}]"),
            Self::Label(label) => write!(f, "label={label}"),
            Self::Text(text) => write!(f, "text={text}"),
            Self::Css(css) => write!(f, "css={css}"),
        }
    }
}

/// A re-resolvable descriptor for finding document elements.
///
/// Locators are composable: [`Locator::within`] scopes a locator under
/// another one ("the delete button inside this row"), and
/// [`Locator::with_text`] narrows matches by visible text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Locator {
    /// The selector for finding elements
    selector: Selector,
    /// Text filter applied to candidate matches
    #[serde(default, skip_serializing_if = "Option::is_none")]
    has_text: Option<String>,
    /// Parent locator this one is scoped under, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    scope: Option<Box<Locator>>,
}

impl Locator {
    /// Create a locator from a selector
    #[must_use]
    pub fn new(selector: Selector) -> Self {
        Self {
            selector,
            has_text: None,
            scope: None,
        }
    }

    /// Locate by test ID
    #[must_use]
    pub fn test_id(id: impl Into<String>) -> Self {
        Self::new(Selector::test_id(id))
    }

    /// Locate by ARIA role
    #[must_use]
    pub fn role(role: impl Into<String>) -> Self {
        Self::new(Selector::role(role))
    }

    /// Locate by ARIA role and accessible name
    #[must_use]
    pub fn role_named(role: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(Selector::role_named(role, name))
    }

    /// Locate by form label
    #[must_use]
    pub fn label(label: impl Into<String>) -> Self {
        Self::new(Selector::label(label))
    }

    /// Locate by visible text
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::new(Selector::text(text))
    }

    /// Locate by CSS selector
    #[must_use]
    pub fn css(selector: impl Into<String>) -> Self {
        Self::new(Selector::css(selector))
    }

    /// Narrow matches to elements containing the given text
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.has_text = Some(text.into());
        self
    }

    /// Scope this locator under a parent locator.
    ///
    /// The parent is resolved first; this locator only matches within the
    /// parent's first match. Scopes chain.
    #[must_use]
    pub fn within(mut self, parent: Locator) -> Self {
        self.scope = Some(Box::new(parent));
        self
    }

    /// Get the selector
    #[must_use]
    pub const fn selector(&self) -> &Selector {
        &self.selector
    }

    /// Get the text filter, if any
    #[must_use]
    pub fn has_text(&self) -> Option<&str> {
        self.has_text.as_deref()
    }

    /// Get the parent scope, if any
    #[must_use]
    pub fn scope(&self) -> Option<&Locator> {
        self.scope.as_deref()
    }

    /// Human-readable description used in step results and failures
    #[must_use]
    pub fn description(&self) -> String {
        let mut desc = self.selector.to_string();
        if let Some(text) = &self.has_text {
            desc.push_str(&format!(" ~ \"{text}\""));
        }
        if let Some(scope) = &self.scope {
            desc = format!("{} >> {desc}", scope.description());
        }
        desc
    }
}

impl std::fmt::Display for Locator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.description())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod selector_tests {
        use super::*;

        #[test]
        fn test_test_id_display() {
            assert_eq!(Selector::test_id("create-role").to_string(), "test-id=create-role");
        }

        #[test]
        fn test_role_named_display() {
            let sel = Selector::role_named("option", "Admin");
            assert_eq!(sel.to_string(), "role=option[name=Admin]");
        }

        #[test]
        fn test_label_display() {
            assert_eq!(Selector::label("Full name *").to_string(), "label=Full name *");
        }
    }

    mod locator_tests {
        use super::*;

        #[test]
        fn test_locator_is_a_plain_descriptor() {
            let a = Locator::test_id("snackbar");
            let b = Locator::test_id("snackbar");
            assert_eq!(a, b);
        }

        #[test]
        fn test_with_text_filter() {
            let locator = Locator::role("row").with_text("Create Edit Test");
            assert_eq!(locator.has_text(), Some("Create Edit Test"));
        }

        #[test]
        fn test_scoped_description_reads_outside_in() {
            let row = Locator::role("row").with_text("R1");
            let delete = Locator::role_named("button", "Delete").within(row);
            let desc = delete.description();
            assert!(desc.starts_with("role=row"));
            assert!(desc.ends_with("role=button[name=Delete]"));
            assert!(desc.contains(">>"));
        }

        #[test]
        fn test_scope_chains() {
            let outer = Locator::css("#root");
            let middle = Locator::role("table").within(outer);
            let inner = Locator::role("row").within(middle);
            assert!(inner.scope().is_some());
            assert!(inner.scope().unwrap().scope().is_some());
        }
    }

    mod serde_tests {
        use super::*;

        #[test]
        fn test_locator_round_trips_through_json() {
            let locator = Locator::role_named("button", "Delete")
                .within(Locator::role("row").with_text("R1"));
            let json = serde_json::to_string(&locator).unwrap();
            let back: Locator = serde_json::from_str(&json).unwrap();
            assert_eq!(locator, back);
        }

        #[test]
        fn test_yaml_scenario_style_locator() {
            let yaml = r"
selector:
  test_id: snackbar
";
            let locator: Locator = serde_yaml_ng::from_str(yaml).unwrap();
            assert_eq!(locator.selector(), &Selector::test_id("snackbar"));
            assert!(locator.has_text().is_none());
        }
    }
}
