//! Keel runtime: the application facade and bootstrap layer.
//!
//! This crate ties the Keel framework together for embedders:
//!
//! - [`Application`]: initialize from argv, start plugins, run the single
//!   worker, quit, and tear down deterministically
//! - [`ScopedApplication`]: a lexical lifetime guard over an application
//! - [`config`]: the `--config-file` YAML loader
//! - [`logging`]: `tracing-subscriber` setup
//!
//! # Typical embedder
//!
//! ```rust,ignore
//! use keel_framework::plugin::registry;
//! use keel_runtime::{Application, logging};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     logging::init();
//!     registry::register::<StoragePlugin>();
//!     registry::register::<NetPlugin>();
//!
//!     let mut app = Application::new("keeld", env!("CARGO_PKG_VERSION"));
//!     if app.initialize(std::env::args())? {
//!         app.startup()?;
//!         app.exec()?;
//!     }
//!     Ok(())
//! }
//! ```

pub mod application;
pub mod config;
pub mod error;
pub mod logging;
pub mod scoped;

// Re-exports
pub use application::Application;
pub use config::{ConfigValues, load_config_file, load_config_str};
pub use error::{AppError, AppResult, ConfigError, ConfigResult};
pub use logging::LoggingBuilder;
pub use scoped::ScopedApplication;
