//! Keel framework: plugins, lifecycle, and option ingestion.
//!
//! This crate provides the middle layer of the Keel application framework:
//!
//! - The [`Plugin`] trait and [`PluginMeta`] identity, with the process-wide
//!   descriptor [`registry`](plugin::registry)
//! - The [`Lifecycle`] engine driving instances through
//!   `registered → initialized → started → stopped`
//! - The [`OptionsAggregator`] merging per-plugin option schemas into one
//!   command line and producing the [`OptionMap`] initializers receive
//! - The [`AppHandle`] plugins keep as their back-reference
//!
//! The application facade that wires these together with the reactor lives
//! in `keel-runtime`.

pub mod error;
pub mod handle;
pub mod lifecycle;
pub mod options;
pub mod plugin;

// Re-exports
pub use error::{HookPhase, LifecycleError, LifecycleResult, OptionsError, OptionsResult};
pub use handle::AppHandle;
pub use lifecycle::Lifecycle;
pub use options::{
    OptionKind, OptionMap, OptionSpec, OptionsAggregator, Parse, ParsedOptions, PluginOptions,
};
pub use plugin::{Plugin, PluginDescriptor, PluginHandle, PluginMeta, PluginRef, PluginState};
