//! Fixture provision and capability injection.
//!
//! Two seams live here. [`SessionProvider`] hands each scenario its own
//! isolated session and takes it back afterwards — the runner guarantees
//! release on every path. [`Fixtures`] is the per-scenario registry of
//! named collaborators (page objects, login helpers): constructed lazily
//! on first `provide`, shared within the scenario, torn down in reverse
//! creation order at scenario end.
//!
//! Notification dismissal is an explicit injected capability
//! ([`NotificationController`]) rather than a process-wide escape hatch,
//! so scenarios running in parallel cannot interfere through shared
//! globals.

use async_trait::async_trait;
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use crate::locator::Locator;
use crate::result::{RecorrerError, RecorrerResult};
use crate::scenario::Scenario;
use crate::session::Session;

/// A named collaborator owned by one scenario.
///
/// Teardown runs at scenario end, failure or not.
pub trait ScenarioFixture: Any + Send {
    /// Fixture name for logging
    fn name(&self) -> &str
    where
        Self: Sized,
    {
        std::any::type_name::<Self>()
    }

    /// Release whatever the fixture holds
    ///
    /// # Errors
    ///
    /// Returns an error if cleanup fails; remaining fixtures are still
    /// torn down.
    fn teardown(&mut self) -> RecorrerResult<()> {
        Ok(())
    }

    /// Upcast for downcasting to the concrete type
    fn as_any(&self) -> &dyn Any;

    /// Mutable upcast for downcasting to the concrete type
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Builds a fixture on first use within a scenario
pub trait FixtureFactory: Send + Sync {
    /// Construct the fixture
    ///
    /// # Errors
    ///
    /// Returns [`RecorrerError::Fixture`] if construction fails.
    fn build(&self) -> RecorrerResult<Box<dyn ScenarioFixture>>;
}

impl<F> FixtureFactory for F
where
    F: Fn() -> RecorrerResult<Box<dyn ScenarioFixture>> + Send + Sync,
{
    fn build(&self) -> RecorrerResult<Box<dyn ScenarioFixture>> {
        self()
    }
}

/// Factories shared across scenarios; cheap to clone
#[derive(Clone, Default)]
pub struct FixtureRegistry {
    factories: HashMap<String, Arc<dyn FixtureFactory>>,
}

impl std::fmt::Debug for FixtureRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FixtureRegistry")
            .field("factories", &self.factories.len())
            .finish()
    }
}

impl FixtureRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory under a name; replaces any previous entry
    pub fn register(&mut self, name: impl Into<String>, factory: impl FixtureFactory + 'static) {
        let _ = self.factories.insert(name.into(), Arc::new(factory));
    }

    /// Whether a factory is registered under `name`
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered names
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    fn factory(&self, name: &str) -> Option<Arc<dyn FixtureFactory>> {
        self.factories.get(name).cloned()
    }
}

/// Per-scenario fixture store: lazy construction, reverse-order teardown
pub struct Fixtures {
    registry: FixtureRegistry,
    built: Vec<(String, Box<dyn ScenarioFixture>)>,
}

impl std::fmt::Debug for Fixtures {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fixtures")
            .field("registry", &self.registry)
            .field("built", &self.built.len())
            .finish()
    }
}

impl Fixtures {
    /// Create a per-scenario store over shared factories
    #[must_use]
    pub fn new(registry: FixtureRegistry) -> Self {
        Self {
            registry,
            built: Vec::new(),
        }
    }

    /// Get the fixture registered under `name`, constructing it on first
    /// use. Subsequent calls within the same scenario share the instance.
    ///
    /// # Errors
    ///
    /// Returns [`RecorrerError::Fixture`] for an unknown name or a failed
    /// construction.
    pub fn provide(&mut self, name: &str) -> RecorrerResult<&mut dyn ScenarioFixture> {
        if let Some(pos) = self.built.iter().position(|(n, _)| n == name) {
            return Ok(self.built[pos].1.as_mut());
        }

        let factory = self
            .registry
            .factory(name)
            .ok_or_else(|| RecorrerError::Fixture {
                message: format!("no fixture registered under '{name}'"),
            })?;
        let fixture = factory.build().map_err(|e| RecorrerError::Fixture {
            message: format!("fixture '{name}' construction failed: {e}"),
        })?;
        tracing::debug!(fixture = name, "constructed");
        self.built.push((name.to_string(), fixture));
        Ok(self.built.last_mut().map(|(_, f)| f.as_mut()).unwrap())
    }

    /// Typed access to a fixture constructed via [`Fixtures::provide`]
    ///
    /// # Errors
    ///
    /// Propagates `provide` errors; additionally fails if the fixture is
    /// not of type `T`.
    pub fn provide_as<T: ScenarioFixture>(&mut self, name: &str) -> RecorrerResult<&mut T> {
        let fixture = self.provide(name)?;
        fixture
            .as_any_mut()
            .downcast_mut::<T>()
            .ok_or_else(|| RecorrerError::Fixture {
                message: format!(
                    "fixture '{name}' is not a {}",
                    std::any::type_name::<T>()
                ),
            })
    }

    /// Number of fixtures constructed so far
    #[must_use]
    pub fn built_count(&self) -> usize {
        self.built.len()
    }

    /// Tear down every constructed fixture, newest first.
    ///
    /// All fixtures are torn down even if one fails; the first error wins.
    pub fn teardown_all(&mut self) -> RecorrerResult<()> {
        let mut first_error: Option<RecorrerError> = None;

        for (name, fixture) in self.built.iter_mut().rev() {
            if let Err(e) = fixture.teardown() {
                tracing::warn!(fixture = name.as_str(), error = %e, "teardown failed");
                if first_error.is_none() {
                    first_error = Some(RecorrerError::Fixture {
                        message: format!("fixture '{name}' teardown failed: {e}"),
                    });
                }
            }
        }
        self.built.clear();

        first_error.map_or(Ok(()), Err)
    }
}

/// Injected capability for closing transient notifications.
///
/// Replaces reaching into the page's globals: the controller is owned by
/// the scenario that received it, so dismissing one scenario's snackbars
/// can never touch another session.
#[async_trait]
pub trait NotificationController: Send {
    /// Dismiss every currently displayed notification
    async fn dismiss_all(&mut self, session: &mut dyn Session) -> RecorrerResult<()>;
}

/// Controller that clicks per-notification close buttons
#[derive(Debug, Clone)]
pub struct ClickToDismiss {
    close_button: Locator,
    max_rounds: usize,
}

/// Dismissal rounds before giving up on notifications that survive
/// their close button
pub const DEFAULT_DISMISS_ROUNDS: usize = 32;

impl ClickToDismiss {
    /// Dismiss by clicking every match of `close_button`
    #[must_use]
    pub fn new(close_button: Locator) -> Self {
        Self {
            close_button,
            max_rounds: DEFAULT_DISMISS_ROUNDS,
        }
    }

    /// Cap the number of resolve-and-click rounds
    #[must_use]
    pub const fn with_max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = max_rounds;
        self
    }
}

#[async_trait]
impl NotificationController for ClickToDismiss {
    async fn dismiss_all(&mut self, session: &mut dyn Session) -> RecorrerResult<()> {
        // Re-resolve after each click: dismissing one notification can
        // re-layout the rest. Rounds are bounded so a notification whose
        // close button never detaches it cannot spin the scenario forever.
        for _ in 0..self.max_rounds {
            let handles = session.resolve(&self.close_button).await?;
            let Some(handle) = handles.first() else {
                return Ok(());
            };
            session.click(handle).await?;
            tokio::task::yield_now().await;
        }
        Err(RecorrerError::Fixture {
            message: format!(
                "notifications still present after {} dismissal rounds via {}",
                self.max_rounds,
                self.close_button.description()
            ),
        })
    }
}

/// Provides one isolated session per scenario.
///
/// This is the seam where applications inject everything scenario code
/// needs: the session driver, named fixtures (page objects, login
/// helpers), and optional capabilities like notification control.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Open a fresh session for `scenario`
    async fn acquire(&self, scenario: &Scenario) -> RecorrerResult<Box<dyn Session>>;

    /// Close a session. Called exactly once per acquired session, on
    /// every path through the runner.
    async fn release(&self, session: Box<dyn Session>) -> RecorrerResult<()> {
        drop(session);
        Ok(())
    }

    /// Factories for named per-scenario collaborators
    fn fixtures(&self) -> FixtureRegistry {
        FixtureRegistry::new()
    }

    /// Capability for `Action::DismissNotifications`, if the application
    /// under test shows transient notifications
    fn notifications(&self) -> Option<Box<dyn NotificationController>> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockSession;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingFixture {
        label: String,
        teardown_log: Arc<std::sync::Mutex<Vec<String>>>,
    }

    impl ScenarioFixture for CountingFixture {
        fn teardown(&mut self) -> RecorrerResult<()> {
            self.teardown_log.lock().unwrap().push(self.label.clone());
            Ok(())
        }

        fn as_any(&self) -> &dyn Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    fn registry_with(
        names: &[&str],
        built: &Arc<AtomicUsize>,
        log: &Arc<std::sync::Mutex<Vec<String>>>,
    ) -> FixtureRegistry {
        let mut registry = FixtureRegistry::new();
        for name in names {
            let name = (*name).to_string();
            let built = Arc::clone(built);
            let log = Arc::clone(log);
            registry.register(name.clone(), move || {
                built.fetch_add(1, Ordering::SeqCst);
                Ok(Box::new(CountingFixture {
                    label: name.clone(),
                    teardown_log: Arc::clone(&log),
                }) as Box<dyn ScenarioFixture>)
            });
        }
        registry
    }

    #[test]
    fn test_provide_is_lazy_and_shared() {
        let built = Arc::new(AtomicUsize::new(0));
        let log = Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut fixtures = Fixtures::new(registry_with(&["roles-page"], &built, &log));

        assert_eq!(built.load(Ordering::SeqCst), 0);
        fixtures.provide("roles-page").unwrap();
        fixtures.provide("roles-page").unwrap();
        assert_eq!(built.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unknown_fixture_name_errors() {
        let mut fixtures = Fixtures::new(FixtureRegistry::new());
        let err = fixtures.provide("nope").err().unwrap();
        assert!(matches!(err, RecorrerError::Fixture { .. }));
    }

    #[test]
    fn test_teardown_runs_in_reverse_creation_order() {
        let built = Arc::new(AtomicUsize::new(0));
        let log = Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut fixtures = Fixtures::new(registry_with(&["a", "b", "c"], &built, &log));

        fixtures.provide("a").unwrap();
        fixtures.provide("b").unwrap();
        fixtures.provide("c").unwrap();
        fixtures.teardown_all().unwrap();

        assert_eq!(*log.lock().unwrap(), vec!["c", "b", "a"]);
        assert_eq!(fixtures.built_count(), 0);
    }

    #[test]
    fn test_provide_as_downcasts() {
        let built = Arc::new(AtomicUsize::new(0));
        let log = Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut fixtures = Fixtures::new(registry_with(&["a"], &built, &log));

        let fixture: &mut CountingFixture = fixtures.provide_as("a").unwrap();
        assert_eq!(fixture.label, "a");
    }

    #[test]
    fn test_teardown_failure_does_not_stop_the_rest() {
        struct Failing;
        impl ScenarioFixture for Failing {
            fn teardown(&mut self) -> RecorrerResult<()> {
                Err(RecorrerError::Fixture {
                    message: "boom".to_string(),
                })
            }
            fn as_any(&self) -> &dyn Any {
                self
            }
            fn as_any_mut(&mut self) -> &mut dyn Any {
                self
            }
        }

        let built = Arc::new(AtomicUsize::new(0));
        let log = Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut registry = registry_with(&["ok"], &built, &log);
        registry.register("failing", || Ok(Box::new(Failing) as Box<dyn ScenarioFixture>));

        let mut fixtures = Fixtures::new(registry);
        fixtures.provide("ok").unwrap();
        fixtures.provide("failing").unwrap();

        let err = fixtures.teardown_all().unwrap_err();
        assert!(err.to_string().contains("failing"));
        // "ok" was still torn down despite the earlier failure
        assert_eq!(*log.lock().unwrap(), vec!["ok"]);
    }

    #[tokio::test]
    async fn test_dismiss_all_clears_every_notification() {
        let mut session = MockSession::new();
        for _ in 0..3 {
            let snackbar = session.add_element(|e| e.css(".snackbar"));
            let close = session.add_element(move |e| e.css(".snackbar-close").child_of(snackbar));
            session.on_click(close, move |dom| dom.remove(snackbar));
        }

        let mut controller = ClickToDismiss::new(Locator::css(".snackbar-close"));
        controller.dismiss_all(&mut session).await.unwrap();
        assert!(session.dom().is_empty());
    }

    #[tokio::test]
    async fn test_dismiss_all_gives_up_on_a_sticky_notification() {
        // A close button whose click detaches nothing: the controller
        // must return an error instead of resolving and clicking forever.
        let mut session = MockSession::new();
        let _ = session.add_element(|e| e.css(".snackbar-close"));

        let mut controller =
            ClickToDismiss::new(Locator::css(".snackbar-close")).with_max_rounds(5);
        let result = tokio::time::timeout(
            std::time::Duration::from_millis(500),
            controller.dismiss_all(&mut session),
        )
        .await
        .expect("bounded dismissal returns before the outer timeout");

        let err = result.unwrap_err();
        assert!(matches!(err, RecorrerError::Fixture { .. }));
        assert!(err.to_string().contains("5 dismissal rounds"));
    }
}
