//! Lexically scoped application lifetime.

use std::ops::{Deref, DerefMut};

use crate::application::Application;

/// Guard that pins an [`Application`] to a lexical region.
///
/// Dropping the guard requests quit first, then lets the application's own
/// teardown run: plugins are stopped in reverse activation order and the
/// reactor is released last. Because the process-wide registry holds only
/// descriptors, a second `ScopedApplication` constructed afterwards starts
/// from a clean slate.
pub struct ScopedApplication {
    app: Application,
}

impl ScopedApplication {
    /// Wraps an application for the enclosing scope.
    pub fn new(app: Application) -> Self {
        Self { app }
    }
}

impl Deref for ScopedApplication {
    type Target = Application;

    fn deref(&self) -> &Application {
        &self.app
    }
}

impl DerefMut for ScopedApplication {
    fn deref_mut(&mut self) -> &mut Application {
        &mut self.app
    }
}

impl Drop for ScopedApplication {
    fn drop(&mut self) {
        self.app.quit();
    }
}
