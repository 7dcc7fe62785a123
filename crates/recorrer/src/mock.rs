//! In-memory session driver for tests.
//!
//! [`MockSession`] renders nothing: it holds a flat element store with
//! parent links and answers the [`Session`] trait from it. Tests script
//! behavior through click handlers, navigation routes, evaluation tables,
//! and poll-scheduled mutations, which is enough to exercise every step
//! the executor can run without a browser anywhere in sight.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;

use crate::locator::{Locator, Selector};
use crate::result::{RecorrerError, RecorrerResult};
use crate::session::{ElementHandle, Session};

/// One element in the mock document
#[derive(Debug, Clone)]
pub struct MockElement {
    id: u64,
    test_id: Option<String>,
    role: Option<String>,
    accessible_name: Option<String>,
    label: Option<String>,
    css: Vec<String>,
    text: String,
    value: String,
    visible: bool,
    parent: Option<u64>,
}

impl MockElement {
    fn new(id: u64) -> Self {
        Self {
            id,
            test_id: None,
            role: None,
            accessible_name: None,
            label: None,
            css: Vec::new(),
            text: String::new(),
            value: String::new(),
            visible: true,
            parent: None,
        }
    }

    /// Set the element's test id
    #[must_use]
    pub fn test_id(mut self, id: impl Into<String>) -> Self {
        self.test_id = Some(id.into());
        self
    }

    /// Set the element's ARIA role
    #[must_use]
    pub fn role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    /// Set the element's accessible name
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.accessible_name = Some(name.into());
        self
    }

    /// Set the element's form label
    #[must_use]
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Add a CSS selector this element answers to
    #[must_use]
    pub fn css(mut self, selector: impl Into<String>) -> Self {
        self.css.push(selector.into());
        self
    }

    /// Set the element's text content
    #[must_use]
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Mark the element attached but not visible
    #[must_use]
    pub const fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    /// Nest this element under a parent
    #[must_use]
    pub const fn child_of(mut self, parent: u64) -> Self {
        self.parent = Some(parent);
        self
    }

    fn matches_selector(&self, selector: &Selector) -> bool {
        match selector {
            Selector::TestId(id) => self.test_id.as_deref() == Some(id),
            Selector::Role { role, name } => {
                self.role.as_deref() == Some(role)
                    && name.as_deref().map_or(true, |n| {
                        self.accessible_name.as_deref() == Some(n) || self.text == n
                    })
            }
            Selector::Label(label) => self.label.as_deref() == Some(label),
            Selector::Text(text) => self.text.contains(text.as_str()),
            Selector::Css(css) => self.css.iter().any(|c| c == css),
        }
    }
}

type DomMutation = Box<dyn FnMut(&mut MockDom) + Send>;

/// The mock document: a flat element store plus scripted behavior
#[derive(Default)]
pub struct MockDom {
    elements: Vec<MockElement>,
    next_id: u64,
    click_handlers: HashMap<u64, DomMutation>,
}

impl std::fmt::Debug for MockDom {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockDom")
            .field("elements", &self.elements.len())
            .field("click_handlers", &self.click_handlers.len())
            .finish()
    }
}

impl MockDom {
    /// Add an element built through the closure; returns its id
    pub fn add_element<F>(&mut self, build: F) -> u64
    where
        F: FnOnce(MockElement) -> MockElement,
    {
        let id = self.next_id;
        self.next_id += 1;
        self.elements.push(build(MockElement::new(id)));
        id
    }

    /// Script what happens when an element is clicked
    pub fn on_click<F>(&mut self, id: u64, handler: F)
    where
        F: FnMut(&mut MockDom) + Send + 'static,
    {
        let _ = self.click_handlers.insert(id, Box::new(handler));
    }

    /// Remove an element and its whole subtree
    pub fn remove(&mut self, id: u64) {
        let doomed: Vec<u64> = self
            .elements
            .iter()
            .filter(|e| e.id == id || self.is_descendant(e.id, id))
            .map(|e| e.id)
            .collect();
        self.elements.retain(|e| !doomed.contains(&e.id));
        for gone in doomed {
            let _ = self.click_handlers.remove(&gone);
        }
    }

    /// Remove the first element carrying `test_id`, subtree included
    pub fn remove_by_test_id(&mut self, test_id: &str) {
        if let Some(id) = self.find_by_test_id(test_id) {
            self.remove(id);
        }
    }

    /// Replace an element's text content
    pub fn set_text(&mut self, id: u64, text: impl Into<String>) {
        if let Some(element) = self.elements.iter_mut().find(|e| e.id == id) {
            element.text = text.into();
        }
    }

    /// Toggle an element's visibility
    pub fn set_visible(&mut self, id: u64, visible: bool) {
        if let Some(element) = self.elements.iter_mut().find(|e| e.id == id) {
            element.visible = visible;
        }
    }

    /// Id of the first element carrying `test_id`
    #[must_use]
    pub fn find_by_test_id(&self, test_id: &str) -> Option<u64> {
        self.elements
            .iter()
            .find(|e| e.test_id.as_deref() == Some(test_id))
            .map(|e| e.id)
    }

    /// Current value of a fillable element
    #[must_use]
    pub fn value_of(&self, id: u64) -> Option<&str> {
        self.element(id).map(|e| e.value.as_str())
    }

    /// Number of elements in the document
    #[must_use]
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Whether the document is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    fn element(&self, id: u64) -> Option<&MockElement> {
        self.elements.iter().find(|e| e.id == id)
    }

    fn element_mut(&mut self, id: u64) -> Option<&mut MockElement> {
        self.elements.iter_mut().find(|e| e.id == id)
    }

    fn is_descendant(&self, child: u64, ancestor: u64) -> bool {
        let mut current = self.element(child).and_then(|e| e.parent);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.element(id).and_then(|e| e.parent);
        }
        false
    }

    /// Own text plus all descendant text, used by `has_text` filters
    fn subtree_text(&self, id: u64) -> String {
        let mut text = self.element(id).map(|e| e.text.clone()).unwrap_or_default();
        for element in &self.elements {
            if self.is_descendant(element.id, id) && !element.text.is_empty() {
                text.push(' ');
                text.push_str(&element.text);
            }
        }
        text
    }

    /// Resolve a locator to element ids, in document order
    fn resolve_ids(&self, locator: &Locator) -> Vec<u64> {
        let scope_root = locator
            .scope()
            .map(|parent| self.resolve_ids(parent).first().copied());
        let scope_root = match scope_root {
            // Scope matched nothing: nothing inside it can match either
            Some(None) => return Vec::new(),
            Some(Some(id)) => Some(id),
            None => None,
        };

        self.elements
            .iter()
            .filter(|e| e.matches_selector(locator.selector()))
            .filter(|e| scope_root.map_or(true, |root| self.is_descendant(e.id, root)))
            .filter(|e| {
                locator
                    .has_text()
                    .map_or(true, |text| self.subtree_text(e.id).contains(text))
            })
            .map(|e| e.id)
            .collect()
    }

    fn clear(&mut self) {
        self.elements.clear();
        self.click_handlers.clear();
        self.next_id = 0;
    }
}

type RouteSetup = Box<dyn FnMut(&mut MockDom) + Send>;
type ScheduledMutation = (u64, Option<DomMutation>);
type ComputedEvaluation = Box<dyn FnMut(&MockDom) -> Value + Send>;

/// Scriptable in-memory [`Session`] implementation
#[derive(Default)]
pub struct MockSession {
    dom: MockDom,
    url: String,
    epoch: u64,
    routes: Vec<(String, RouteSetup)>,
    failing_routes: HashMap<String, String>,
    evaluations: HashMap<String, Value>,
    computed_evaluations: HashMap<String, ComputedEvaluation>,
    scheduled: Vec<ScheduledMutation>,
}

impl std::fmt::Debug for MockSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockSession")
            .field("url", &self.url)
            .field("epoch", &self.epoch)
            .field("dom", &self.dom)
            .finish_non_exhaustive()
    }
}

impl MockSession {
    /// Create an empty session
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an element to the current document; returns its id
    pub fn add_element<F>(&mut self, build: F) -> u64
    where
        F: FnOnce(MockElement) -> MockElement,
    {
        self.dom.add_element(build)
    }

    /// Script what happens when an element is clicked
    pub fn on_click<F>(&mut self, id: u64, handler: F)
    where
        F: FnMut(&mut MockDom) + Send + 'static,
    {
        self.dom.on_click(id, handler);
    }

    /// Script a document for a URL; applied on `navigate`
    pub fn route<F>(&mut self, url: impl Into<String>, setup: F)
    where
        F: FnMut(&mut MockDom) + Send + 'static,
    {
        self.routes.push((url.into(), Box::new(setup)));
    }

    /// Make navigation to a URL fail
    pub fn fail_navigation(&mut self, url: impl Into<String>, message: impl Into<String>) {
        let _ = self.failing_routes.insert(url.into(), message.into());
    }

    /// Script the value of an evaluated expression
    pub fn on_evaluate(&mut self, expression: impl Into<String>, value: Value) {
        let _ = self.evaluations.insert(expression.into(), value);
    }

    /// Script an expression computed from the live document on every
    /// evaluation, so the result tracks fills and other mutations
    pub fn on_evaluate_with<F>(&mut self, expression: impl Into<String>, compute: F)
    where
        F: FnMut(&MockDom) -> Value + Send + 'static,
    {
        let _ = self
            .computed_evaluations
            .insert(expression.into(), Box::new(compute));
    }

    /// Run a mutation after the document has been queried `polls` more
    /// times. Models UI work that lands while a wait is polling.
    pub fn schedule_after_polls<F>(&mut self, polls: u64, mutation: F)
    where
        F: FnMut(&mut MockDom) + Send + 'static,
    {
        self.scheduled.push((polls, Some(Box::new(mutation))));
    }

    /// Direct access to the document
    #[must_use]
    pub fn dom(&self) -> &MockDom {
        &self.dom
    }

    /// Direct mutable access to the document
    pub fn dom_mut(&mut self) -> &mut MockDom {
        &mut self.dom
    }

    fn tick_scheduled(&mut self) {
        for (remaining, mutation) in &mut self.scheduled {
            if *remaining > 0 {
                *remaining -= 1;
            }
            if *remaining == 0 {
                if let Some(mut run) = mutation.take() {
                    run(&mut self.dom);
                }
            }
        }
        self.scheduled.retain(|(_, m)| m.is_some());
    }

    fn live_element(&self, handle: &ElementHandle) -> RecorrerResult<&MockElement> {
        handle.ensure_fresh(self.epoch)?;
        self.dom
            .element(handle.id())
            .ok_or_else(|| RecorrerError::Environment {
                message: format!("element {} no longer in document", handle.description()),
            })
    }
}

#[async_trait]
impl Session for MockSession {
    async fn navigate(&mut self, url: &str) -> RecorrerResult<()> {
        if let Some(message) = self.failing_routes.get(url) {
            return Err(RecorrerError::Navigation {
                url: url.to_string(),
                message: message.clone(),
            });
        }

        self.epoch += 1;
        self.url = url.to_string();
        self.dom.clear();
        self.scheduled.clear();

        if let Some((_, setup)) = self.routes.iter_mut().find(|(u, _)| u == url) {
            setup(&mut self.dom);
        }
        Ok(())
    }

    fn url(&self) -> String {
        self.url.clone()
    }

    fn epoch(&self) -> u64 {
        self.epoch
    }

    async fn resolve(&mut self, locator: &Locator) -> RecorrerResult<Vec<ElementHandle>> {
        self.tick_scheduled();
        let description = locator.description();
        Ok(self
            .dom
            .resolve_ids(locator)
            .into_iter()
            .map(|id| ElementHandle::new(id, self.epoch, description.clone()))
            .collect())
    }

    async fn click(&mut self, handle: &ElementHandle) -> RecorrerResult<()> {
        let _ = self.live_element(handle)?;
        if let Some(mut handler) = self.dom.click_handlers.remove(&handle.id()) {
            handler(&mut self.dom);
            // Keep the handler unless the click replaced it or removed
            // the element.
            if self.dom.element(handle.id()).is_some()
                && !self.dom.click_handlers.contains_key(&handle.id())
            {
                let _ = self.dom.click_handlers.insert(handle.id(), handler);
            }
        }
        Ok(())
    }

    async fn fill(&mut self, handle: &ElementHandle, text: &str) -> RecorrerResult<()> {
        handle.ensure_fresh(self.epoch)?;
        let element =
            self.dom
                .element_mut(handle.id())
                .ok_or_else(|| RecorrerError::Environment {
                    message: format!("element {} no longer in document", handle.description()),
                })?;
        element.value = text.to_string();
        Ok(())
    }

    async fn text(&mut self, handle: &ElementHandle) -> RecorrerResult<String> {
        Ok(self.live_element(handle)?.text.clone())
    }

    async fn is_visible(&mut self, handle: &ElementHandle) -> RecorrerResult<bool> {
        handle.ensure_fresh(self.epoch)?;
        Ok(self
            .dom
            .element(handle.id())
            .is_some_and(|e| e.visible))
    }

    async fn evaluate(&mut self, expression: &str) -> RecorrerResult<Value> {
        if let Some(compute) = self.computed_evaluations.get_mut(expression) {
            return Ok(compute(&self.dom));
        }
        self.evaluations
            .get(expression)
            .cloned()
            .ok_or_else(|| RecorrerError::Environment {
                message: format!("no evaluation scripted for '{expression}'"),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_resolve_by_test_id() {
        let mut session = MockSession::new();
        session.add_element(|e| e.test_id("snackbar").text("Saved"));
        session.add_element(|e| e.test_id("other"));

        let handles = session.resolve(&Locator::test_id("snackbar")).await.unwrap();
        assert_eq!(handles.len(), 1);
        assert_eq!(session.text(&handles[0]).await.unwrap(), "Saved");
    }

    #[tokio::test]
    async fn test_resolve_zero_matches_is_empty_for_every_selector_kind() {
        let mut session = MockSession::new();
        // A decoy that matches none of the locators below
        session.add_element(|e| {
            e.test_id("present")
                .role("row")
                .label("Here")
                .text("here")
                .css(".here")
        });

        let locators = [
            Locator::test_id("missing"),
            Locator::role("dialog"),
            Locator::role_named("row", "Missing"),
            Locator::label("Missing"),
            Locator::text("missing"),
            Locator::css(".missing"),
        ];
        for locator in locators {
            let handles = session.resolve(&locator).await.unwrap();
            assert!(
                handles.is_empty(),
                "{} should match nothing",
                locator.description()
            );
        }
    }

    #[tokio::test]
    async fn test_role_selector_narrowed_by_name() {
        let mut session = MockSession::new();
        session.add_element(|e| e.role("button").name("Create"));
        session.add_element(|e| e.role("button").name("Cancel"));

        let all = session.resolve(&Locator::role("button")).await.unwrap();
        assert_eq!(all.len(), 2);

        let create = session
            .resolve(&Locator::role_named("button", "Create"))
            .await
            .unwrap();
        assert_eq!(create.len(), 1);
    }

    #[tokio::test]
    async fn test_scoped_resolution_stays_inside_the_parent() {
        let mut session = MockSession::new();
        let row_a = session.add_element(|e| e.role("row").text("R1"));
        let row_b = session.add_element(|e| e.role("row").text("R2"));
        session.add_element(move |e| e.role("button").name("Delete").child_of(row_a));
        session.add_element(move |e| e.role("button").name("Delete").child_of(row_b));

        let locator =
            Locator::role_named("button", "Delete").within(Locator::role("row").with_text("R2"));
        let handles = session.resolve(&locator).await.unwrap();
        assert_eq!(handles.len(), 1);
    }

    #[tokio::test]
    async fn test_has_text_sees_descendant_text() {
        let mut session = MockSession::new();
        let row = session.add_element(|e| e.role("row"));
        session.add_element(move |e| e.role("cell").text("Create Edit Test").child_of(row));

        let handles = session
            .resolve(&Locator::role("row").with_text("Create Edit Test"))
            .await
            .unwrap();
        assert_eq!(handles.len(), 1);
    }

    #[tokio::test]
    async fn test_click_handler_mutates_the_document() {
        let mut session = MockSession::new();
        let button = session.add_element(|e| e.test_id("create-role"));
        session.on_click(button, |dom| {
            let _ = dom.add_element(|e| e.test_id("create-role-modal"));
        });

        let handle = session
            .resolve_one(&Locator::test_id("create-role"))
            .await
            .unwrap();
        session.click(&handle).await.unwrap();

        assert!(session.dom().find_by_test_id("create-role-modal").is_some());
    }

    #[tokio::test]
    async fn test_navigation_bumps_epoch_and_invalidates_handles() {
        let mut session = MockSession::new();
        session.add_element(|e| e.test_id("stale"));
        let handle = session
            .resolve_one(&Locator::test_id("stale"))
            .await
            .unwrap();

        session.route("/users", |dom| {
            let _ = dom.add_element(|e| e.test_id("users-table"));
        });
        session.navigate("/users").await.unwrap();

        assert_eq!(session.epoch(), 1);
        let err = session.click(&handle).await.unwrap_err();
        assert!(matches!(err, RecorrerError::StaleHandle { .. }));
        assert!(session.dom().find_by_test_id("users-table").is_some());
    }

    #[tokio::test]
    async fn test_failing_route() {
        let mut session = MockSession::new();
        session.fail_navigation("/broken", "connection refused");
        let err = session.navigate("/broken").await.unwrap_err();
        assert!(matches!(err, RecorrerError::Navigation { .. }));
    }

    #[tokio::test]
    async fn test_scheduled_mutation_fires_after_n_queries() {
        let mut session = MockSession::new();
        session.schedule_after_polls(2, |dom| {
            let _ = dom.add_element(|e| e.test_id("late"));
        });

        let locator = Locator::test_id("late");
        assert!(session.resolve(&locator).await.unwrap().is_empty());
        assert_eq!(session.resolve(&locator).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_fill_records_the_value() {
        let mut session = MockSession::new();
        let input = session.add_element(|e| e.label("Role name *"));
        let handle = session
            .resolve_one(&Locator::label("Role name *"))
            .await
            .unwrap();
        session.fill(&handle, "R1").await.unwrap();
        assert_eq!(session.dom().value_of(input), Some("R1"));
    }

    #[tokio::test]
    async fn test_computed_evaluation_tracks_a_filled_value() {
        // `text` stays untouched by fill; the computed expression is the
        // way for assertions to observe what was typed.
        let mut session = MockSession::new();
        let input = session.add_element(|e| e.label("Name"));
        session.on_evaluate_with("nameValue", move |dom| {
            Value::String(dom.value_of(input).unwrap_or_default().to_string())
        });

        let handle = session.resolve_one(&Locator::label("Name")).await.unwrap();
        assert_eq!(session.evaluate("nameValue").await.unwrap(), Value::String(String::new()));

        session.fill(&handle, "alpha").await.unwrap();
        assert_eq!(session.text(&handle).await.unwrap(), "");
        assert_eq!(
            session.evaluate("nameValue").await.unwrap(),
            Value::String("alpha".to_string())
        );
    }

    #[tokio::test]
    async fn test_remove_takes_the_subtree_along() {
        let mut session = MockSession::new();
        let modal = session.add_element(|e| e.test_id("delete-role-modal"));
        session.add_element(move |e| e.role("button").name("Delete").child_of(modal));

        session.dom_mut().remove_by_test_id("delete-role-modal");
        assert!(session.dom().is_empty());
    }
}
