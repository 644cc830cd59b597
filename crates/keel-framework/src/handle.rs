//! Non-owning application handle handed to plugins and background threads.

use keel_core::{BoxError, Priority, Reactor};
use tracing::debug;

/// Thread-safe handle to a running application.
///
/// Plugins receive an `AppHandle` in `plugin_initialize` and may keep a clone
/// as their back-reference; it exposes only the operations that are safe from
/// any thread. The handle never owns the application.
#[derive(Clone)]
pub struct AppHandle {
    reactor: Reactor,
}

impl AppHandle {
    /// Wraps the application's reactor. Called by the facade; embedders get
    /// handles from `Application::handle`.
    pub fn new(reactor: Reactor) -> Self {
        Self { reactor }
    }

    /// Posts a task onto the application's single worker.
    ///
    /// Returns `false` when the application is already quitting; the task is
    /// then discarded.
    pub fn post<F>(&self, priority: Priority, task: F) -> bool
    where
        F: FnOnce() -> Result<(), BoxError> + Send + 'static,
    {
        self.reactor.post(priority, task)
    }

    /// Discards all queued work and stops the dispatcher. Thread-safe and
    /// idempotent; tasks that already started still run to completion.
    pub fn quit(&self) {
        debug!("quit requested");
        self.reactor.drain();
        self.reactor.stop();
    }

    /// Whether `quit` (or a failed task) has already stopped the dispatcher.
    pub fn is_quitting(&self) -> bool {
        self.reactor.is_stopped()
    }
}
