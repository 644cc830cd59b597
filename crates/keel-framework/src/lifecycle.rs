//! Plugin lifecycle engine.
//!
//! [`Lifecycle`] owns one application's live plugin instances and drives them
//! through `registered → initialized → started → stopped`:
//!
//! - `initialize` resolves descriptors from the process-wide registry,
//!   establishes dependency instances recursively (rejecting cycles), and
//!   records the **activation order**: the sequence in which plugins reach
//!   the initialized state.
//! - `startup_all` walks the activation order, starting dependencies before
//!   their dependents.
//! - `shutdown_all` walks the activation order in reverse. A stop hook error
//!   never truncates the walk: every remaining plugin is still stopped, the
//!   first captured error is returned, later ones are logged.
//!
//! States are strictly monotonic and each transition happens at most once,
//! so a plugin is stopped exactly once no matter which path (normal quit,
//! failing task, failing hook, facade drop) triggered the teardown.

use std::collections::HashMap;

use tracing::{debug, error, info};

use crate::error::{HookPhase, LifecycleError, LifecycleResult};
use crate::handle::AppHandle;
use crate::options::OptionMap;
use crate::plugin::{PluginHandle, PluginState, registry};

/// Per-application plugin instance table and state machine driver.
#[derive(Default)]
pub struct Lifecycle {
    plugins: HashMap<&'static str, PluginHandle>,
    /// Plugins in the order they reached `Initialized`; reversed for
    /// shutdown.
    activation: Vec<PluginHandle>,
}

impl Lifecycle {
    /// Creates an engine with no live instances.
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle of a live plugin, if one was established.
    pub fn get(&self, name: &str) -> Option<&PluginHandle> {
        self.plugins.get(name)
    }

    /// The activation order so far.
    pub fn activation(&self) -> &[PluginHandle] {
        &self.activation
    }

    /// Establishes (instantiates, without initializing) the named plugin and,
    /// recursively, every plugin it depends on. Returns the existing handle
    /// when the plugin is already attached to this application.
    pub fn establish(&mut self, name: &str) -> LifecycleResult<PluginHandle> {
        let mut resolving = Vec::new();
        self.establish_inner(name, &mut resolving)
    }

    fn establish_inner(
        &mut self,
        name: &str,
        resolving: &mut Vec<&'static str>,
    ) -> LifecycleResult<PluginHandle> {
        if let Some(handle) = self.plugins.get(name) {
            return Ok(handle.clone());
        }
        let descriptor = registry::global()
            .find(name)
            .ok_or_else(|| LifecycleError::UnknownPlugin(name.to_string()))?;
        if resolving.contains(&descriptor.name) {
            let mut chain: Vec<&str> = resolving.clone();
            chain.push(descriptor.name);
            return Err(LifecycleError::DependencyCycle {
                chain: chain.join(" -> "),
            });
        }
        resolving.push(descriptor.name);
        for dependency in (descriptor.dependencies)() {
            self.establish_inner(dependency.name, resolving)?;
        }
        resolving.pop();

        let handle = PluginHandle::new(descriptor);
        self.plugins.insert(descriptor.name, handle.clone());
        debug!(plugin = %descriptor.name, "plugin instance established");
        Ok(handle)
    }

    /// Initializes the named plugin, dependencies first.
    ///
    /// A no-op for plugins at or past `Initialized`. The instance joins the
    /// activation list before its initializer runs, so a failing initializer
    /// is still covered by [`shutdown_all`](Self::shutdown_all). An instance
    /// whose initializer already failed is not re-run; re-attempting it is
    /// [`LifecycleError::InitializeFailed`].
    pub fn initialize(
        &mut self,
        name: &str,
        app: &AppHandle,
        options: &OptionMap,
    ) -> LifecycleResult<()> {
        let handle = self.establish(name)?;
        self.initialize_handle(&handle, app, options)
    }

    fn initialize_handle(
        &mut self,
        handle: &PluginHandle,
        app: &AppHandle,
        options: &OptionMap,
    ) -> LifecycleResult<()> {
        if handle.state() >= PluginState::Initialized {
            return Ok(());
        }
        // Below Initialized but already on the activation list means the
        // initializer failed earlier; the instance must not be re-run or
        // pushed a second time.
        if self
            .activation
            .iter()
            .any(|entry| entry.name() == handle.name())
        {
            return Err(LifecycleError::InitializeFailed(handle.name()));
        }
        for dependency in (handle.descriptor().dependencies)() {
            let dependency = self.establish(dependency.name)?;
            self.initialize_handle(&dependency, app, options)?;
        }
        self.activation.push(handle.clone());
        let result = handle.instance().lock().plugin_initialize(app, options);
        result.map_err(|source| LifecycleError::Hook {
            plugin: handle.name(),
            phase: HookPhase::Initialize,
            source,
        })?;
        handle.set_state(PluginState::Initialized);
        info!(plugin = %handle.name(), "plugin initialized");
        Ok(())
    }

    /// Starts every initialized plugin in activation order.
    pub fn startup_all(&mut self) -> LifecycleResult<()> {
        for handle in self.activation.clone() {
            self.startup_handle(&handle)?;
        }
        Ok(())
    }

    fn startup_handle(&mut self, handle: &PluginHandle) -> LifecycleResult<()> {
        match handle.state() {
            PluginState::Started => return Ok(()),
            PluginState::Initialized => {}
            state => {
                return Err(LifecycleError::NotInitialized {
                    plugin: handle.name(),
                    state,
                });
            }
        }
        for dependency in (handle.descriptor().dependencies)() {
            let dependency = self.establish(dependency.name)?;
            self.startup_handle(&dependency)?;
        }
        let result = handle.instance().lock().plugin_startup();
        result.map_err(|source| LifecycleError::Hook {
            plugin: handle.name(),
            phase: HookPhase::Startup,
            source,
        })?;
        handle.set_state(PluginState::Started);
        info!(plugin = %handle.name(), "plugin started");
        Ok(())
    }

    /// Stops every activated plugin in reverse activation order.
    ///
    /// The stop hook runs only for plugins that actually started; a plugin
    /// that was initialized but never started is marked stopped without a
    /// hook call. Errors are captured per plugin, the walk always completes,
    /// and the first captured error is returned.
    ///
    /// Consumes the activation list, so calling this again is a no-op.
    pub fn shutdown_all(&mut self) -> LifecycleResult<()> {
        let activation = std::mem::take(&mut self.activation);
        let mut first_error: Option<LifecycleError> = None;
        for handle in activation.iter().rev() {
            match handle.state() {
                PluginState::Started => {
                    let result = handle.instance().lock().plugin_shutdown();
                    handle.set_state(PluginState::Stopped);
                    info!(plugin = %handle.name(), "plugin stopped");
                    if let Err(source) = result {
                        let captured = LifecycleError::Hook {
                            plugin: handle.name(),
                            phase: HookPhase::Shutdown,
                            source,
                        };
                        if first_error.is_none() {
                            first_error = Some(captured);
                        } else {
                            error!(error = %captured, "additional shutdown error");
                        }
                    }
                }
                PluginState::Initialized => {
                    handle.set_state(PluginState::Stopped);
                    debug!(plugin = %handle.name(), "plugin was never started; marked stopped");
                }
                _ => {}
            }
        }
        match first_error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use keel_core::{BoxError, Reactor};

    use super::*;
    use crate::plugin::{Plugin, PluginDescriptor, PluginMeta};

    fn app_handle() -> AppHandle {
        AppHandle::new(Reactor::new())
    }

    fn initialize(lifecycle: &mut Lifecycle, name: &str) -> LifecycleResult<()> {
        lifecycle.initialize(name, &app_handle(), &OptionMap::default())
    }

    macro_rules! quiet_fixture {
        ($ty:ident, $name:literal, deps: [$($dep:ident),*]) => {
            #[derive(Default)]
            struct $ty;

            impl Plugin for $ty {}

            impl PluginMeta for $ty {
                const NAME: &'static str = $name;

                fn dependencies() -> Vec<PluginDescriptor> {
                    vec![$(PluginDescriptor::of::<$dep>()),*]
                }
            }
        };
    }

    quiet_fixture!(LeafFixture, "lc.leaf", deps: []);
    quiet_fixture!(MidFixture, "lc.mid", deps: [LeafFixture]);
    quiet_fixture!(TopFixture, "lc.top", deps: [MidFixture]);

    #[test]
    fn test_transitive_activation_orders_dependencies_first() {
        registry::register::<TopFixture>();
        let mut lifecycle = Lifecycle::new();
        initialize(&mut lifecycle, "lc.top").unwrap();

        let order: Vec<&str> = lifecycle
            .activation()
            .iter()
            .map(|handle| handle.name())
            .collect();
        assert_eq!(order, vec!["lc.leaf", "lc.mid", "lc.top"]);
        for name in ["lc.leaf", "lc.mid", "lc.top"] {
            assert_eq!(
                lifecycle.get(name).unwrap().state(),
                PluginState::Initialized
            );
        }
    }

    #[test]
    fn test_initialize_is_idempotent() {
        registry::register::<MidFixture>();
        let mut lifecycle = Lifecycle::new();
        initialize(&mut lifecycle, "lc.mid").unwrap();
        let activated = lifecycle.activation().len();
        initialize(&mut lifecycle, "lc.mid").unwrap();
        initialize(&mut lifecycle, "lc.leaf").unwrap();
        assert_eq!(lifecycle.activation().len(), activated);
    }

    // Ordering fixtures record hook invocations into their own log, touched
    // by no other test in this binary.
    static HOOK_ORDER: Mutex<Vec<&'static str>> = Mutex::new(Vec::new());

    macro_rules! ordered_fixture {
        ($ty:ident, $name:literal, deps: [$($dep:ident),*]) => {
            #[derive(Default)]
            struct $ty;

            impl Plugin for $ty {
                fn plugin_startup(&mut self) -> Result<(), BoxError> {
                    HOOK_ORDER.lock().unwrap().push(concat!($name, ".start"));
                    Ok(())
                }

                fn plugin_shutdown(&mut self) -> Result<(), BoxError> {
                    HOOK_ORDER.lock().unwrap().push(concat!($name, ".stop"));
                    Ok(())
                }
            }

            impl PluginMeta for $ty {
                const NAME: &'static str = $name;

                fn dependencies() -> Vec<PluginDescriptor> {
                    vec![$(PluginDescriptor::of::<$dep>()),*]
                }
            }
        };
    }

    ordered_fixture!(OrdLeafFixture, "lc.ord-leaf", deps: []);
    ordered_fixture!(OrdMidFixture, "lc.ord-mid", deps: [OrdLeafFixture]);
    ordered_fixture!(OrdTopFixture, "lc.ord-top", deps: [OrdMidFixture]);

    #[test]
    fn test_startup_and_shutdown_walk_opposite_directions() {
        registry::register::<OrdTopFixture>();
        let mut lifecycle = Lifecycle::new();
        initialize(&mut lifecycle, "lc.ord-top").unwrap();

        lifecycle.startup_all().unwrap();
        lifecycle.shutdown_all().unwrap();

        assert_eq!(
            *HOOK_ORDER.lock().unwrap(),
            vec![
                "lc.ord-leaf.start",
                "lc.ord-mid.start",
                "lc.ord-top.start",
                "lc.ord-top.stop",
                "lc.ord-mid.stop",
                "lc.ord-leaf.stop",
            ]
        );
        for name in ["lc.ord-leaf", "lc.ord-mid", "lc.ord-top"] {
            assert_eq!(lifecycle.get(name).unwrap().state(), PluginState::Stopped);
        }
    }

    static CONSUMED_STOPS: AtomicUsize = AtomicUsize::new(0);

    #[derive(Default)]
    struct CountedStopFixture;

    impl Plugin for CountedStopFixture {
        fn plugin_shutdown(&mut self) -> Result<(), BoxError> {
            CONSUMED_STOPS.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    impl PluginMeta for CountedStopFixture {
        const NAME: &'static str = "lc.counted-stop";
    }

    #[test]
    fn test_shutdown_all_stops_each_plugin_exactly_once() {
        registry::register::<CountedStopFixture>();
        let mut lifecycle = Lifecycle::new();
        initialize(&mut lifecycle, "lc.counted-stop").unwrap();
        lifecycle.startup_all().unwrap();
        lifecycle.shutdown_all().unwrap();
        lifecycle.shutdown_all().unwrap();
        assert_eq!(CONSUMED_STOPS.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unknown_plugin_is_rejected() {
        let mut lifecycle = Lifecycle::new();
        let error = initialize(&mut lifecycle, "lc.no-such").unwrap_err();
        assert!(matches!(error, LifecycleError::UnknownPlugin(_)));
        assert!(lifecycle.activation().is_empty());
    }

    // Cycle fixtures: each declares the other as a dependency.
    #[derive(Default)]
    struct CycleAFixture;

    impl Plugin for CycleAFixture {}

    impl PluginMeta for CycleAFixture {
        const NAME: &'static str = "lc.cycle-a";

        fn dependencies() -> Vec<PluginDescriptor> {
            vec![PluginDescriptor::of::<CycleBFixture>()]
        }
    }

    #[derive(Default)]
    struct CycleBFixture;

    impl Plugin for CycleBFixture {}

    impl PluginMeta for CycleBFixture {
        const NAME: &'static str = "lc.cycle-b";

        fn dependencies() -> Vec<PluginDescriptor> {
            vec![PluginDescriptor::of::<CycleAFixture>()]
        }
    }

    #[test]
    fn test_dependency_cycle_is_fatal_at_resolution() {
        registry::register::<CycleAFixture>();
        let mut lifecycle = Lifecycle::new();
        let error = initialize(&mut lifecycle, "lc.cycle-a").unwrap_err();
        match error {
            LifecycleError::DependencyCycle { chain } => {
                assert!(chain.contains("lc.cycle-a"), "chain was: {chain}");
                assert!(chain.contains("lc.cycle-b"), "chain was: {chain}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[derive(Default)]
    struct FailingInitFixture;

    impl Plugin for FailingInitFixture {
        fn plugin_initialize(
            &mut self,
            _app: &AppHandle,
            _options: &OptionMap,
        ) -> Result<(), BoxError> {
            Err("init refused".into())
        }
    }

    impl PluginMeta for FailingInitFixture {
        const NAME: &'static str = "lc.failing-init";

        fn dependencies() -> Vec<PluginDescriptor> {
            vec![PluginDescriptor::of::<InitDepFixture>()]
        }
    }

    quiet_fixture!(InitDepFixture, "lc.init-dep", deps: []);

    #[test]
    fn test_failed_initializer_is_covered_by_shutdown() {
        registry::register::<FailingInitFixture>();
        let mut lifecycle = Lifecycle::new();
        let error = initialize(&mut lifecycle, "lc.failing-init").unwrap_err();
        assert!(matches!(
            error,
            LifecycleError::Hook {
                phase: HookPhase::Initialize,
                ..
            }
        ));
        // The dependency initialized before the failure and the failing plugin
        // itself joined the activation list; teardown stops the dependency,
        // while the plugin that never initialized is left untouched.
        assert_eq!(lifecycle.activation().len(), 2);
        lifecycle.shutdown_all().unwrap();
        assert_eq!(
            lifecycle.get("lc.init-dep").unwrap().state(),
            PluginState::Stopped
        );
        assert_eq!(
            lifecycle.get("lc.failing-init").unwrap().state(),
            PluginState::Registered
        );
    }

    #[test]
    fn test_reinitializing_a_failed_plugin_is_rejected() {
        registry::register::<FailingInitFixture>();
        let mut lifecycle = Lifecycle::new();
        initialize(&mut lifecycle, "lc.failing-init").unwrap_err();
        assert_eq!(lifecycle.activation().len(), 2);

        // The failed initializer must not be re-run, and the instance must
        // not land on the activation list a second time.
        let error = initialize(&mut lifecycle, "lc.failing-init").unwrap_err();
        assert!(matches!(
            error,
            LifecycleError::InitializeFailed("lc.failing-init")
        ));
        assert_eq!(lifecycle.activation().len(), 2);
    }

    #[derive(Default)]
    struct FailingStopFixture;

    impl Plugin for FailingStopFixture {
        fn plugin_shutdown(&mut self) -> Result<(), BoxError> {
            Err("stop refused".into())
        }
    }

    impl PluginMeta for FailingStopFixture {
        const NAME: &'static str = "lc.failing-stop";

        fn dependencies() -> Vec<PluginDescriptor> {
            vec![PluginDescriptor::of::<QuietDepFixture>()]
        }
    }

    quiet_fixture!(QuietDepFixture, "lc.quiet-dep", deps: []);

    #[test]
    fn test_shutdown_error_does_not_truncate_the_walk() {
        registry::register::<FailingStopFixture>();
        let mut lifecycle = Lifecycle::new();
        initialize(&mut lifecycle, "lc.failing-stop").unwrap();
        lifecycle.startup_all().unwrap();

        // The failing plugin stops first (reverse activation order); the
        // remaining plugin must still be stopped and the error surfaced.
        let error = lifecycle.shutdown_all().unwrap_err();
        assert!(matches!(
            error,
            LifecycleError::Hook {
                plugin: "lc.failing-stop",
                phase: HookPhase::Shutdown,
                ..
            }
        ));
        assert_eq!(
            lifecycle.get("lc.quiet-dep").unwrap().state(),
            PluginState::Stopped
        );
    }
}
