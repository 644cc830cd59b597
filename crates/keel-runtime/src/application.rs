//! The application facade.
//!
//! [`Application`] wires the reactor, the lifecycle engine, and the options
//! aggregator into the surface an embedder holds:
//!
//! ```rust,ignore
//! use keel_runtime::Application;
//! use keel_framework::plugin::registry;
//!
//! registry::register::<StoragePlugin>();
//!
//! let mut app = Application::new("keeld", env!("CARGO_PKG_VERSION"))
//!     .default_plugins(["storage"]);
//! if app.initialize(std::env::args())? {
//!     app.startup()?;
//!     app.exec()?;
//! }
//! ```
//!
//! `exec` runs the reactor on the calling thread until [`Application::quit`]
//! is called (from any thread) or a posted task fails. Either way the queue
//! is drained and every started plugin is stopped exactly once, in reverse
//! activation order, before `exec` returns.

use std::ffi::OsString;

use keel_core::{BoxError, Priority, Reactor};
use keel_framework::options::{Parse, ParsedOptions};
use keel_framework::plugin::registry;
use keel_framework::{AppHandle, Lifecycle, OptionMap, OptionsAggregator, PluginMeta, PluginRef};
use tracing::{error, info};

use crate::config;
use crate::error::{AppError, AppResult};

/// Root object of a Keel service.
///
/// One application owns its reactor and its plugin instances; the descriptor
/// registry is process-wide and shared, so sequentially constructed
/// applications behave identically.
pub struct Application {
    // Field order is the teardown order: plugin instances drop before the
    // reactor, because stop hooks may still hold an AppHandle clone.
    lifecycle: Lifecycle,
    options: OptionMap,
    default_plugins: Vec<&'static str>,
    handle: AppHandle,
    reactor: Reactor,
    name: String,
    version: String,
}

impl Application {
    /// Creates an empty application. `name` and `version` feed the generated
    /// `--help` and `--version` output.
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        let reactor = Reactor::new();
        Self {
            lifecycle: Lifecycle::new(),
            options: OptionMap::default(),
            default_plugins: Vec::new(),
            handle: AppHandle::new(reactor.clone()),
            reactor,
            name: name.into(),
            version: version.into(),
        }
    }

    /// Declares the plugins this application always activates, in addition
    /// to any named with `--plugin`.
    pub fn default_plugins<I>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = &'static str>,
    {
        self.default_plugins.extend(names);
        self
    }

    /// Parses the command line and initializes the selected plugins.
    ///
    /// Returns `Ok(false)` when `--help` or `--version` short-circuited the
    /// run (output has been printed; the embedder should exit cleanly) and
    /// `Ok(true)` when the application is ready for [`startup`](Self::startup).
    ///
    /// Configuration errors (bad options, unknown plugin names, config-file
    /// failures) are returned before any plugin is touched. An initializer
    /// error triggers shutdown of everything already activated, then the
    /// original error is returned.
    pub fn initialize<I, S>(&mut self, argv: I) -> AppResult<bool>
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString> + Clone,
    {
        let aggregator = OptionsAggregator::from_registry(&self.name, &self.version)?;
        let ParsedOptions {
            mut values,
            plugins,
            config_file,
        } = match aggregator.parse(argv)? {
            Parse::Exit => return Ok(false),
            Parse::Ready(parsed) => parsed,
        };

        if let Some(path) = &config_file {
            let defaults = config::load_config_file(path)?;
            aggregator.apply_config_defaults(&mut values, defaults);
        }

        // Activation roots: the facade's defaults first, then --plugin names
        // in first-occurrence order. Validate every name up front so a typo
        // cannot leave a half-activated application behind.
        let mut roots: Vec<String> = self
            .default_plugins
            .iter()
            .map(|name| (*name).to_string())
            .collect();
        for name in plugins {
            if !roots.contains(&name) {
                roots.push(name);
            }
        }
        for name in &roots {
            if registry::global().find(name).is_none() {
                return Err(keel_framework::LifecycleError::UnknownPlugin(name.clone()).into());
            }
        }

        self.options = values;
        for name in &roots {
            if let Err(cause) = self.lifecycle.initialize(name, &self.handle, &self.options) {
                if let Err(shutdown_error) = self.lifecycle.shutdown_all() {
                    error!(error = %shutdown_error, "shutdown error while unwinding failed initialization");
                }
                return Err(cause.into());
            }
        }
        info!(app = %self.name, plugins = roots.len(), "application initialized");
        Ok(true)
    }

    /// Starts every initialized plugin in activation order. On failure,
    /// everything already advanced is shut down and the original error is
    /// returned.
    pub fn startup(&mut self) -> AppResult<()> {
        if let Err(cause) = self.lifecycle.startup_all() {
            if let Err(shutdown_error) = self.lifecycle.shutdown_all() {
                error!(error = %shutdown_error, "shutdown error while unwinding failed startup");
            }
            return Err(cause.into());
        }
        Ok(())
    }

    /// Runs the dispatcher on the calling thread until [`quit`](Self::quit)
    /// or a task failure.
    ///
    /// On return, in order: the reactor is drained (pending and future posts
    /// are discarded), every started plugin is stopped in reverse activation
    /// order, and the captured error, if any, is returned. A task error wins
    /// over a concurrent shutdown error; the latter is then logged.
    pub fn exec(&mut self) -> AppResult<()> {
        let hold = self.reactor.hold();
        let run_result = self.reactor.run();
        drop(hold);

        self.reactor.drain();
        let shutdown_result = self.lifecycle.shutdown_all();

        match run_result {
            Err(cause) => {
                if let Err(shutdown_error) = shutdown_result {
                    error!(error = %shutdown_error, "shutdown error after task failure");
                }
                Err(cause.into())
            }
            Ok(()) => shutdown_result.map_err(AppError::from),
        }
    }

    /// Posts a task onto the application's worker. Returns `false` when the
    /// application is quitting and the task was discarded.
    pub fn post<F>(&self, priority: Priority, task: F) -> bool
    where
        F: FnOnce() -> Result<(), BoxError> + Send + 'static,
    {
        self.reactor.post(priority, task)
    }

    /// Discards all queued work and makes [`exec`](Self::exec) return.
    /// Thread-safe; also reachable through [`AppHandle::quit`].
    pub fn quit(&self) {
        self.handle.quit();
    }

    /// A clonable, thread-safe handle to this application.
    pub fn handle(&self) -> AppHandle {
        self.handle.clone()
    }

    /// The merged option values produced by [`initialize`](Self::initialize).
    pub fn options(&self) -> &OptionMap {
        &self.options
    }

    /// Typed reference to the live instance of `P`.
    pub fn plugin<P: PluginMeta>(&self) -> AppResult<PluginRef<P>> {
        self.lifecycle
            .get(P::NAME)
            .and_then(|handle| handle.downcast::<P>())
            .ok_or(AppError::PluginNotActivated(P::NAME))
    }

    /// Names of the activated plugins, in activation order.
    pub fn activation_order(&self) -> Vec<&'static str> {
        self.lifecycle
            .activation()
            .iter()
            .map(|handle| handle.name())
            .collect()
    }
}

impl Drop for Application {
    /// An application abandoned without `exec` still stops every started
    /// plugin exactly once; `exec` cannot be running here because it borrows
    /// the application mutably.
    fn drop(&mut self) {
        self.reactor.drain();
        self.reactor.stop();
        if let Err(shutdown_error) = self.lifecycle.shutdown_all() {
            error!(error = %shutdown_error, "shutdown error during application teardown");
        }
    }
}
