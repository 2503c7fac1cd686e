//! Error types used by the tickvisor scheduler and poll closures.
//!
//! This module defines two error enums:
//!
//! - [`TaskError`] faults raised by poll closures (returned `Err` or panicked).
//! - [`StackError`] misuse of the stack buffer (commit without an open stack, ...).
//!
//! Both types provide helper methods (`as_label`, `as_message`) for logging.

use std::any::Any;
use std::borrow::Cow;

use thiserror::Error;

/// # Faults produced by poll closures.
///
/// A fault never reaches the caller of [`TaskManager::tick`](crate::TaskManager::tick)
/// as an `Err`; the scheduler converts it into a
/// [`TickOutcome::Faulted`](crate::TickOutcome::Faulted) and applies the unit's
/// timeout policy.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    /// The closure reported a failure.
    #[error("execution failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// The closure panicked; the panic was caught at the tick boundary.
    #[error("poll panicked: {message}")]
    Panicked {
        /// Panic payload rendered as text.
        message: String,
    },
}

impl TaskError {
    /// Shorthand for [`TaskError::Fail`].
    pub fn fail(error: impl Into<String>) -> Self {
        TaskError::Fail {
            error: error.into(),
        }
    }

    /// Builds a [`TaskError::Panicked`] from a `catch_unwind` payload.
    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(msg) = payload.downcast_ref::<&'static str>() {
            (*msg).to_string()
        } else if let Some(msg) = payload.downcast_ref::<String>() {
            msg.clone()
        } else {
            "unknown panic payload".to_string()
        };
        TaskError::Panicked { message }
    }

    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use tickvisor::TaskError;
    ///
    /// assert_eq!(TaskError::fail("boom").as_label(), "task_failed");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            TaskError::Fail { .. } => "task_failed",
            TaskError::Panicked { .. } => "task_panicked",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            TaskError::Fail { error } => format!("error: {error}"),
            TaskError::Panicked { message } => format!("panic: {message}"),
        }
    }
}

/// # Errors produced by stack buffer operations.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StackError {
    /// No stack is open; call [`TaskManager::begin_stack`](crate::TaskManager::begin_stack) first.
    #[error("no stack is open")]
    NotOpen,

    /// The stack was committed without any entries; it has been closed.
    #[error("stack {stack:?} is empty")]
    Empty {
        /// Name of the discarded stack.
        stack: Cow<'static, str>,
    },

    /// The build callback failed; the stack has been discarded.
    #[error("building stack {stack:?} failed: {source}")]
    Build {
        /// Name of the discarded stack.
        stack: Cow<'static, str>,
        /// Error returned by the callback.
        #[source]
        source: TaskError,
    },
}

impl StackError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            StackError::NotOpen => "stack_not_open",
            StackError::Empty { .. } => "stack_empty",
            StackError::Build { .. } => "stack_build_failed",
        }
    }
}
