//! Logging setup for Keel applications.
//!
//! Thin builder over `tracing-subscriber` with environment-based filtering.
//! Initialization is always explicit; the framework never installs a
//! subscriber behind the embedder's back.
//!
//! ```rust,ignore
//! use keel_runtime::logging::LoggingBuilder;
//!
//! LoggingBuilder::new()
//!     .with_level(tracing::Level::DEBUG)
//!     .directive("keel_core=trace")
//!     .init();
//! ```

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize logging with the `info` default.
///
/// # Panics
///
/// Panics if a subscriber has already been set.
pub fn init() {
    LoggingBuilder::new().init();
}

/// Try to initialize logging with the `info` default, returning an error
/// instead of panicking when a subscriber is already installed.
pub fn try_init() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    LoggingBuilder::new().try_init()
}

/// Builder for the tracing subscriber used by Keel applications.
#[derive(Default)]
pub struct LoggingBuilder {
    level: Option<tracing::Level>,
    directives: Vec<String>,
    with_target: bool,
    with_thread_ids: bool,
}

impl LoggingBuilder {
    /// Creates a builder with the defaults: `info` level, `RUST_LOG`
    /// honored, no targets or thread ids.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the base log level.
    pub fn with_level(mut self, level: tracing::Level) -> Self {
        self.level = Some(level);
        self
    }

    /// Adds a filter directive such as `"keel_framework=debug"`.
    pub fn directive(mut self, directive: &str) -> Self {
        self.directives.push(directive.to_string());
        self
    }

    /// Include the target (module path) in log output.
    pub fn with_target(mut self, enabled: bool) -> Self {
        self.with_target = enabled;
        self
    }

    /// Include thread ids in log output. Useful when tracking which thread
    /// posted versus executed a task.
    pub fn with_thread_ids(mut self, enabled: bool) -> Self {
        self.with_thread_ids = enabled;
        self
    }

    fn build_filter(&self) -> EnvFilter {
        let base = match self.level {
            Some(tracing::Level::TRACE) => "trace",
            Some(tracing::Level::DEBUG) => "debug",
            Some(tracing::Level::INFO) | None => "info",
            Some(tracing::Level::WARN) => "warn",
            Some(tracing::Level::ERROR) => "error",
        };
        // RUST_LOG wins over the programmatic level.
        let mut filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(base));
        for directive in &self.directives {
            if let Ok(parsed) = directive.parse() {
                filter = filter.add_directive(parsed);
            }
        }
        filter
    }

    /// Installs the subscriber.
    ///
    /// # Panics
    ///
    /// Panics if a subscriber has already been set.
    pub fn init(self) {
        let filter = self.build_filter();
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_target(self.with_target)
                    .with_thread_ids(self.with_thread_ids),
            )
            .with(filter)
            .init();
    }

    /// Installs the subscriber, returning an error when one is already set.
    pub fn try_init(self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let filter = self.build_filter();
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_target(self.with_target)
                    .with_thread_ids(self.with_thread_ids),
            )
            .with(filter)
            .try_init()
            .map_err(|error| Box::new(error) as Box<dyn std::error::Error + Send + Sync>)
    }
}
