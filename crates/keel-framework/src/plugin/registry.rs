//! Process-wide plugin directory.
//!
//! The registry is a single static table of [`PluginDescriptor`]s shared by
//! every application in the process. Registration is idempotent (tests
//! re-register the same plugins before each case) and recursive: registering
//! a plugin records the transitive closure of its declared dependencies.
//!
//! Live instances are *not* stored here; they belong to one application's
//! lifecycle engine. Two sequentially constructed applications therefore see
//! identical registry state.
//!
//! # Link-time registration
//!
//! Plugin crates may contribute descriptors without any runtime call by
//! adding a thunk to the [`KEEL_PLUGINS`] distributed slice:
//!
//! ```rust,ignore
//! use keel_framework::plugin::registry::KEEL_PLUGINS;
//! use linkme::distributed_slice;
//!
//! #[distributed_slice(KEEL_PLUGINS)]
//! static TELEMETRY: fn() -> PluginDescriptor = || PluginDescriptor::of::<TelemetryPlugin>();
//! ```
//!
//! The slice is folded into the table the first time the registry is touched.

use std::collections::HashMap;
use std::sync::OnceLock;

use linkme::distributed_slice;
use parking_lot::RwLock;
use tracing::debug;

use super::{PluginDescriptor, PluginMeta};

/// Descriptor thunks contributed at link time.
#[distributed_slice]
pub static KEEL_PLUGINS: [fn() -> PluginDescriptor];

static REGISTRY: OnceLock<PluginRegistry> = OnceLock::new();

/// The process-wide descriptor table.
pub struct PluginRegistry {
    descriptors: RwLock<HashMap<&'static str, PluginDescriptor>>,
}

impl PluginRegistry {
    fn new() -> Self {
        Self {
            descriptors: RwLock::new(HashMap::new()),
        }
    }

    /// Idempotently records `P`'s descriptor plus the transitive closure of
    /// its dependencies.
    pub fn register<P: PluginMeta>(&self) {
        self.register_descriptor(PluginDescriptor::of::<P>());
    }

    /// Descriptor-level variant of [`register`](Self::register).
    pub fn register_descriptor(&self, descriptor: PluginDescriptor) {
        {
            let mut table = self.descriptors.write();
            if table.contains_key(descriptor.name) {
                return;
            }
            table.insert(descriptor.name, descriptor);
            debug!(plugin = %descriptor.name, "plugin registered");
        }
        // Outside the lock: dependency thunks recurse back into the table.
        for dependency in (descriptor.dependencies)() {
            self.register_descriptor(dependency);
        }
    }

    /// Looks a descriptor up by plugin name.
    pub fn find(&self, name: &str) -> Option<PluginDescriptor> {
        self.descriptors.read().get(name).copied()
    }

    /// Snapshot of every registered descriptor, sorted by name so that
    /// derived artifacts (option listings, help text) are deterministic.
    pub fn descriptors(&self) -> Vec<PluginDescriptor> {
        let mut all: Vec<PluginDescriptor> = self.descriptors.read().values().copied().collect();
        all.sort_by_key(|descriptor| descriptor.name);
        all
    }

    /// Number of registered descriptors.
    pub fn len(&self) -> usize {
        self.descriptors.read().len()
    }

    /// Whether no plugin has been registered.
    pub fn is_empty(&self) -> bool {
        self.descriptors.read().is_empty()
    }
}

/// Returns the process-wide registry, seeding it from [`KEEL_PLUGINS`] on
/// first use.
pub fn global() -> &'static PluginRegistry {
    REGISTRY.get_or_init(|| {
        let registry = PluginRegistry::new();
        for thunk in KEEL_PLUGINS.iter() {
            registry.register_descriptor(thunk());
        }
        registry
    })
}

/// Registers `P` (and its transitive dependencies) with the process-wide
/// registry. Call before constructing an application.
pub fn register<P: PluginMeta>() {
    global().register::<P>();
}
