//! Core error types.

use thiserror::Error;

/// Boxed error type used by fallible tasks and plugin hooks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors surfaced by the reactor and its task queue.
#[derive(Error, Debug)]
pub enum ReactorError {
    /// `run` was called while another call to `run` was still driving the loop.
    #[error("reactor is already being driven by another thread")]
    AlreadyRunning,

    /// A task returned an error. The task had already been removed from the
    /// queue when the error was raised.
    #[error("task failed: {0}")]
    TaskFailed(#[source] BoxError),

    /// A task panicked. The panic is contained at the dispatch boundary and
    /// reported like any other task failure.
    #[error("task panicked: {0}")]
    TaskPanic(String),
}

/// Result type for reactor operations.
pub type ReactorResult<T> = Result<T, ReactorError>;
