//! Framework error types.

use std::fmt;

use keel_core::BoxError;
use thiserror::Error;

use crate::plugin::PluginState;

/// Lifecycle hook a [`LifecycleError::Hook`] originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookPhase {
    /// `plugin_initialize`
    Initialize,
    /// `plugin_startup`
    Startup,
    /// `plugin_shutdown`
    Shutdown,
}

impl fmt::Display for HookPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let phase = match self {
            HookPhase::Initialize => "initialize",
            HookPhase::Startup => "startup",
            HookPhase::Shutdown => "shutdown",
        };
        f.write_str(phase)
    }
}

/// Errors raised while resolving, initializing, starting, or stopping
/// plugins.
#[derive(Error, Debug)]
pub enum LifecycleError {
    /// The named plugin has no registered descriptor.
    #[error("unknown plugin '{0}'")]
    UnknownPlugin(String),

    /// The declared dependency graph contains a cycle.
    #[error("plugin dependency cycle: {chain}")]
    DependencyCycle {
        /// The chain of plugin names that closes the cycle.
        chain: String,
    },

    /// Startup was requested for a plugin that never reached the
    /// initialized state.
    #[error("plugin '{plugin}' cannot start from state {state}")]
    NotInitialized {
        /// Name of the offending plugin.
        plugin: &'static str,
        /// State the plugin was found in.
        state: PluginState,
    },

    /// Initialization was re-attempted for a plugin whose initializer
    /// already failed in this application.
    #[error("plugin '{0}' already failed to initialize")]
    InitializeFailed(&'static str),

    /// A lifecycle hook returned an error.
    #[error("{phase} hook of plugin '{plugin}' failed: {source}")]
    Hook {
        /// Name of the plugin whose hook failed.
        plugin: &'static str,
        /// Which hook failed.
        phase: HookPhase,
        /// The error the hook returned.
        source: BoxError,
    },
}

/// Result type for lifecycle operations.
pub type LifecycleResult<T> = Result<T, LifecycleError>;

/// Errors raised while aggregating option schemas or parsing the command
/// line.
#[derive(Error, Debug)]
pub enum OptionsError {
    /// Two plugins declared the same option name.
    #[error("option --{option} declared by both '{first}' and '{second}'")]
    DuplicateOption {
        /// The clashing option name.
        option: &'static str,
        /// Plugin that declared it first.
        first: &'static str,
        /// Plugin that declared it again.
        second: &'static str,
    },

    /// A plugin tried to declare one of the framework's built-in options.
    #[error("option --{0} is reserved by the framework")]
    ReservedOption(&'static str),

    /// The command line did not parse; the message is clap's rendered
    /// diagnostic.
    #[error("{0}")]
    Usage(String),
}

/// Result type for options operations.
pub type OptionsResult<T> = Result<T, OptionsError>;
