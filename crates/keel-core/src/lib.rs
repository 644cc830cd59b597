//! Keel core: the dispatch engine of the Keel application framework.
//!
//! This crate provides:
//! - A priority task queue with FIFO ordering inside each band (`TaskQueue`)
//! - A single-worker reactor loop with thread-safe `post`/`stop`/`drain`
//!   (`Reactor`)
//! - The `Priority` bands and the core error types
//!
//! Higher layers (`keel-framework`, `keel-runtime`) build the plugin system
//! and the application facade on top of this crate. Embedders normally use
//! the reactor through `Application::post` rather than directly.

pub mod error;
pub mod priority;
pub mod queue;
pub mod reactor;

// Re-exports
pub use error::{BoxError, ReactorError, ReactorResult};
pub use priority::Priority;
pub use queue::{Task, TaskQueue};
pub use reactor::{Reactor, WorkHold};
