//! # Keel
//!
//! A plugin-assembled application framework for long-running services.
//!
//! ## Overview
//!
//! Keel assembles a service from a fixed set of declaratively-declared
//! plugins and runs it on a single cooperative worker:
//!
//! - **Lifecycle**: every plugin moves through
//!   `registered → initialized → started → stopped`, with declared
//!   dependencies initialized and started first and shutdown walking the
//!   activation order in reverse.
//! - **Options**: each plugin contributes its own command-line options;
//!   `--plugin NAME` selects which optional plugins activate for the run,
//!   and `--config-file` supplies defaults for shared options.
//! - **Dispatch**: `post` enqueues prioritized tasks onto one worker thread;
//!   equal-priority tasks run in post order.
//! - **Shutdown**: `quit` (or a failing task) drains the queue and stops
//!   every started plugin exactly once, even when hooks fail.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌───────────┐     ┌───────────────┐
//! │ Application │────▶│  Reactor  │────▶│ TaskQueue     │
//! │  (facade)   │     │ (1 worker)│     │ (prio + FIFO) │
//! └──────┬──────┘     └───────────┘     └───────────────┘
//!        │
//!        ├──▶ OptionsAggregator ──▶ OptionMap ──▶ plugin_initialize
//!        └──▶ Lifecycle ──▶ registry (process-wide descriptors)
//! ```
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use keel::prelude::*;
//!
//! #[derive(Default)]
//! struct StoragePlugin {
//!     dbsize: i64,
//! }
//!
//! impl Plugin for StoragePlugin {
//!     fn plugin_initialize(&mut self, _app: &AppHandle, options: &OptionMap) -> Result<(), BoxError> {
//!         self.dbsize = options.integer("dbsize").unwrap_or(4096);
//!         Ok(())
//!     }
//! }
//!
//! impl PluginMeta for StoragePlugin {
//!     const NAME: &'static str = "storage";
//!     fn options() -> PluginOptions {
//!         PluginOptions::default()
//!             .shared(OptionSpec::integer("dbsize", "Maximum database size"))
//!     }
//! }
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     registry::register::<StoragePlugin>();
//!     let mut app = Application::new("keeld", env!("CARGO_PKG_VERSION"))
//!         .default_plugins(["storage"]);
//!     if app.initialize(std::env::args())? {
//!         app.startup()?;
//!         app.exec()?;
//!     }
//!     Ok(())
//! }
//! ```

pub use keel_core::{
    BoxError, Priority, Reactor, ReactorError, ReactorResult, Task, TaskQueue, WorkHold,
};
pub use keel_framework::{
    AppHandle, HookPhase, Lifecycle, LifecycleError, LifecycleResult, OptionKind, OptionMap,
    OptionSpec, OptionsAggregator, OptionsError, OptionsResult, Plugin, PluginDescriptor,
    PluginHandle, PluginMeta, PluginOptions, PluginRef, PluginState,
};
pub use keel_framework::plugin::registry;
pub use keel_runtime::{
    AppError, AppResult, Application, ConfigError, ConfigResult, LoggingBuilder,
    ScopedApplication, load_config_file, load_config_str,
};

/// Everything an embedder or plugin author usually needs.
pub mod prelude {
    pub use keel_core::{BoxError, Priority};
    pub use keel_framework::plugin::registry;
    pub use keel_framework::{
        AppHandle, OptionMap, OptionSpec, Plugin, PluginMeta, PluginOptions, PluginRef,
        PluginState,
    };
    pub use keel_runtime::{AppError, AppResult, Application, ScopedApplication};
}
