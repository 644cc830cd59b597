//! Runtime error types.

use std::path::PathBuf;

use keel_core::ReactorError;
use keel_framework::{LifecycleError, OptionsError};
use thiserror::Error;

/// Errors that can occur during configuration file loading.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// File not found at the specified path.
    #[error("configuration file not found: {0}")]
    FileNotFound(PathBuf),

    /// YAML parsing or extraction error.
    #[error("configuration parse error: {0}")]
    Parse(String),
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Umbrella error surfaced by the [`Application`](crate::Application) facade.
#[derive(Error, Debug)]
pub enum AppError {
    /// Command-line schema or parse failure.
    #[error(transparent)]
    Options(#[from] OptionsError),

    /// Configuration file failure.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Plugin resolution or lifecycle hook failure.
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    /// A posted task failed or panicked inside `exec`.
    #[error(transparent)]
    Reactor(#[from] ReactorError),

    /// A typed plugin lookup named a plugin that was never activated.
    #[error("plugin '{0}' is not activated")]
    PluginNotActivated(&'static str),
}

/// Result type for application operations.
pub type AppResult<T> = Result<T, AppError>;
