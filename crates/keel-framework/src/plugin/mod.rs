//! Plugin system for the Keel framework.
//!
//! # Architecture
//!
//! A plugin is a named, dependency-declaring unit of functionality. Its
//! compile-time identity lives in a [`PluginMeta`] impl (name, dependencies,
//! option contributions); its runtime behaviour lives in the [`Plugin`]
//! lifecycle hooks. [`PluginDescriptor::of`] bridges the two: a `Copy`
//! handle carrying the factory and metadata, stored in the process-wide
//! [`registry`].
//!
//! Live instances belong to one application. The lifecycle engine drives each
//! instance through the state machine
//!
//! ```text
//! registered ──initialize──▶ initialized ──startup──▶ started ──shutdown──▶ stopped
//! ```
//!
//! and records the activation order so shutdown can walk it in reverse.
//!
//! # Quick start
//!
//! ```rust,ignore
//! use keel_framework::plugin::registry;
//! use keel_framework::{AppHandle, OptionMap, OptionSpec, Plugin, PluginMeta, PluginOptions};
//!
//! #[derive(Default)]
//! struct HeartbeatPlugin {
//!     interval_ms: u64,
//! }
//!
//! impl Plugin for HeartbeatPlugin {
//!     fn plugin_initialize(&mut self, _app: &AppHandle, options: &OptionMap) -> Result<(), BoxError> {
//!         self.interval_ms = options.integer("heartbeat-interval").unwrap_or(1000) as u64;
//!         Ok(())
//!     }
//! }
//!
//! impl PluginMeta for HeartbeatPlugin {
//!     const NAME: &'static str = "heartbeat";
//!     fn options() -> PluginOptions {
//!         PluginOptions::default()
//!             .shared(OptionSpec::integer("heartbeat-interval", "Beat interval in milliseconds"))
//!     }
//! }
//!
//! registry::register::<HeartbeatPlugin>();
//! ```

use std::any::{Any, TypeId};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use keel_core::BoxError;
use parking_lot::Mutex;

use crate::handle::AppHandle;
use crate::options::{OptionMap, PluginOptions};

pub mod descriptor;
pub mod registry;

pub use descriptor::PluginDescriptor;

// ─── Plugin state ─────────────────────────────────────────────────────────────

/// Lifecycle state of a live plugin instance. Strictly monotonic: an instance
/// only ever moves rightward through
/// `Registered → Initialized → Started → Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PluginState {
    /// Instantiated and attached to an application, hooks not yet run.
    Registered,
    /// `plugin_initialize` completed; the instance is on the activation list.
    Initialized,
    /// `plugin_startup` completed.
    Started,
    /// Torn down; the instance will not be driven again.
    Stopped,
}

impl fmt::Display for PluginState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self {
            PluginState::Registered => "registered",
            PluginState::Initialized => "initialized",
            PluginState::Started => "started",
            PluginState::Stopped => "stopped",
        };
        f.write_str(state)
    }
}

// ─── Plugin trait ─────────────────────────────────────────────────────────────

/// Runtime behaviour of a plugin.
///
/// All hooks run on the application's worker thread and default to no-ops.
/// Hooks return `Result`; an error unwinds the application through its
/// shutdown path (see the lifecycle engine for the exact guarantees).
pub trait Plugin: Any + Send {
    /// Called once, with the merged option values, after every declared
    /// dependency has been initialized. `app` is the plugin's non-owning
    /// back-reference; keep a clone to post work or request quit later.
    fn plugin_initialize(&mut self, app: &AppHandle, options: &OptionMap) -> Result<(), BoxError> {
        let _ = (app, options);
        Ok(())
    }

    /// Called once after every declared dependency has started.
    fn plugin_startup(&mut self) -> Result<(), BoxError> {
        Ok(())
    }

    /// Called once during shutdown, after every plugin that depends on this
    /// one has already been stopped. The reactor is drained by this point;
    /// posting from here is a no-op.
    fn plugin_shutdown(&mut self) -> Result<(), BoxError> {
        Ok(())
    }
}

/// Compile-time identity of a plugin type.
///
/// `Default` is the factory: the registry creates instances with
/// `P::default()`.
pub trait PluginMeta: Plugin + Default {
    /// Unique process-wide plugin name, also the `--plugin` selector.
    const NAME: &'static str;

    /// One-line description shown in `--help` style listings.
    const DESCRIPTION: &'static str = "";

    /// Descriptors of the plugins this one requires to be initialized and
    /// started before it.
    fn dependencies() -> Vec<PluginDescriptor> {
        Vec::new()
    }

    /// Option contributions, split into command-line-only and shared (also
    /// settable from the configuration file) groups.
    fn options() -> PluginOptions {
        PluginOptions::default()
    }
}

// ─── PluginHandle ─────────────────────────────────────────────────────────────

/// Shared handle to one live plugin instance.
///
/// The handle couples the instance with its engine-tracked state; clones stay
/// valid after the owning application tears down (the state then reads
/// `Stopped`).
#[derive(Clone)]
pub struct PluginHandle {
    descriptor: PluginDescriptor,
    state: Arc<Mutex<PluginState>>,
    instance: Arc<Mutex<Box<dyn Plugin>>>,
}

impl PluginHandle {
    pub(crate) fn new(descriptor: PluginDescriptor) -> Self {
        Self {
            descriptor,
            state: Arc::new(Mutex::new(PluginState::Registered)),
            instance: Arc::new(Mutex::new(descriptor.instantiate())),
        }
    }

    /// The plugin's declared name.
    pub fn name(&self) -> &'static str {
        self.descriptor.name
    }

    /// The static descriptor this instance was created from.
    pub fn descriptor(&self) -> PluginDescriptor {
        self.descriptor
    }

    /// Current lifecycle state.
    pub fn state(&self) -> PluginState {
        *self.state.lock()
    }

    pub(crate) fn set_state(&self, state: PluginState) {
        *self.state.lock() = state;
    }

    pub(crate) fn instance(&self) -> &Arc<Mutex<Box<dyn Plugin>>> {
        &self.instance
    }

    /// Whether this handle holds an instance of `P`.
    pub fn is<P: PluginMeta>(&self) -> bool {
        (self.descriptor.instance_type)() == TypeId::of::<P>()
    }

    /// Typed view of this handle, or `None` when the instance is not a `P`.
    pub fn downcast<P: PluginMeta>(&self) -> Option<PluginRef<P>> {
        self.is::<P>().then(|| PluginRef {
            handle: self.clone(),
            _marker: PhantomData,
        })
    }
}

impl fmt::Debug for PluginHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginHandle")
            .field("name", &self.descriptor.name)
            .field("state", &self.state())
            .finish()
    }
}

// ─── PluginRef ────────────────────────────────────────────────────────────────

/// Typed reference to a live plugin of type `P`.
///
/// Obtained from `Application::plugin::<P>()` (or
/// [`PluginHandle::downcast`]). Access goes through a closure so the instance
/// lock is never held across user code boundaries longer than necessary.
pub struct PluginRef<P: PluginMeta> {
    handle: PluginHandle,
    _marker: PhantomData<fn() -> P>,
}

impl<P: PluginMeta> PluginRef<P> {
    /// The plugin's declared name.
    pub fn name(&self) -> &'static str {
        self.handle.name()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> PluginState {
        self.handle.state()
    }

    /// Runs `f` with shared access to the plugin instance.
    pub fn with<R>(&self, f: impl FnOnce(&P) -> R) -> R {
        let guard = self.handle.instance.lock();
        let instance: &dyn Any = &**guard;
        f(instance
            .downcast_ref::<P>()
            .expect("instance type checked at downcast"))
    }

    /// Runs `f` with exclusive access to the plugin instance.
    pub fn with_mut<R>(&self, f: impl FnOnce(&mut P) -> R) -> R {
        let mut guard = self.handle.instance.lock();
        let instance: &mut dyn Any = &mut **guard;
        f(instance
            .downcast_mut::<P>()
            .expect("instance type checked at downcast"))
    }
}

impl<P: PluginMeta> Clone for PluginRef<P> {
    fn clone(&self) -> Self {
        Self {
            handle: self.handle.clone(),
            _marker: PhantomData,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct ProbePlugin {
        tag: u32,
    }

    impl Plugin for ProbePlugin {}

    impl PluginMeta for ProbePlugin {
        const NAME: &'static str = "mod.probe";
    }

    #[derive(Default)]
    struct OtherPlugin;

    impl Plugin for OtherPlugin {}

    impl PluginMeta for OtherPlugin {
        const NAME: &'static str = "mod.other";
    }

    #[test]
    fn test_state_order_matches_lifecycle() {
        assert!(PluginState::Registered < PluginState::Initialized);
        assert!(PluginState::Initialized < PluginState::Started);
        assert!(PluginState::Started < PluginState::Stopped);
    }

    #[test]
    fn test_downcast_is_type_checked() {
        let handle = PluginHandle::new(PluginDescriptor::of::<ProbePlugin>());
        assert!(handle.is::<ProbePlugin>());
        assert!(!handle.is::<OtherPlugin>());
        assert!(handle.downcast::<OtherPlugin>().is_none());

        let probe = handle.downcast::<ProbePlugin>().unwrap();
        probe.with_mut(|plugin| plugin.tag = 7);
        assert_eq!(probe.with(|plugin| plugin.tag), 7);
    }
}
