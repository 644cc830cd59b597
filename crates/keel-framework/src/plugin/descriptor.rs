//! Plugin descriptor: the static, `Copy` handle to a plugin type.

use std::any::TypeId;
use std::fmt;

use super::{Plugin, PluginMeta};
use crate::options::PluginOptions;

/// A static descriptor that identifies and instantiates a plugin.
///
/// Descriptors are what the process-wide [`registry`](super::registry)
/// stores: pure metadata plus function pointers, cheap to copy and safe to
/// share before any application exists. Dependencies are carried as a thunk
/// returning the dependencies' own descriptors, so registering one plugin can
/// register its whole transitive closure.
#[derive(Clone, Copy)]
pub struct PluginDescriptor {
    /// Unique plugin name (the `--plugin` selector and the log key).
    pub name: &'static str,

    /// One-line description for listings.
    pub description: &'static str,

    /// Factory producing a fresh, unattached instance.
    pub create: fn() -> Box<dyn Plugin>,

    /// Descriptors of the plugins this one depends on.
    pub dependencies: fn() -> Vec<PluginDescriptor>,

    /// Option contributions of this plugin.
    pub options: fn() -> PluginOptions,

    /// `TypeId` of the concrete instance type, the key for typed downcasts.
    pub instance_type: fn() -> TypeId,
}

impl PluginDescriptor {
    /// Materializes the descriptor for plugin type `P`.
    pub fn of<P: PluginMeta>() -> Self {
        Self {
            name: P::NAME,
            description: P::DESCRIPTION,
            create: || Box::new(P::default()),
            dependencies: P::dependencies,
            options: P::options,
            instance_type: TypeId::of::<P>,
        }
    }

    /// Creates the live plugin from the factory function.
    #[inline]
    pub fn instantiate(&self) -> Box<dyn Plugin> {
        (self.create)()
    }
}

impl fmt::Debug for PluginDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginDescriptor")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish()
    }
}
