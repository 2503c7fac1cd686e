//! # Poll results and their conversions.
//!
//! Every poll closure ends a call with one of three verdicts:
//! - [`PollResult::Continue`] not finished yet, poll again on the next tick;
//! - [`PollResult::Done`] finished, advance;
//! - [`PollResult::Abort`] hard failure, drop the whole pending queue.
//!
//! Closures are not forced to return [`PollResult`] directly. Anything that
//! implements [`IntoPollResult`] is accepted:
//!
//! | Return type              | Mapping                                         |
//! |--------------------------|-------------------------------------------------|
//! | `PollResult`             | as is                                           |
//! | `bool`                   | `true` → `Done`, `false` → `Continue`           |
//! | `()`                     | always `Done` (fire-and-forget action)          |
//! | `Result<T, TaskError>`   | `Ok(t)` → mapping of `t`, `Err(e)` → fault      |
//!
//! Timeouts and faults are not poll verdicts: the scheduler produces them
//! itself and describes them with a [`Failure`].

use std::borrow::Cow;
use std::fmt;
use std::panic::Location;
use std::time::Duration;

use crate::error::TaskError;

/// Tri-state outcome of a single poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollResult {
    /// Not finished; poll again next tick.
    Continue,
    /// Finished successfully.
    Done,
    /// Hard failure: discard the active unit and everything queued behind it.
    Abort,
}

impl From<bool> for PollResult {
    fn from(done: bool) -> Self {
        if done {
            PollResult::Done
        } else {
            PollResult::Continue
        }
    }
}

/// Conversion of a poll closure's return value into a poll verdict.
///
/// An `Err` means the closure faulted; the scheduler applies the unit's
/// timeout policy to it.
pub trait IntoPollResult {
    /// Converts `self` into a verdict or a fault.
    fn into_poll_result(self) -> Result<PollResult, TaskError>;
}

impl IntoPollResult for PollResult {
    #[inline]
    fn into_poll_result(self) -> Result<PollResult, TaskError> {
        Ok(self)
    }
}

impl IntoPollResult for bool {
    #[inline]
    fn into_poll_result(self) -> Result<PollResult, TaskError> {
        Ok(PollResult::from(self))
    }
}

impl IntoPollResult for () {
    #[inline]
    fn into_poll_result(self) -> Result<PollResult, TaskError> {
        Ok(PollResult::Done)
    }
}

impl<T: IntoPollResult> IntoPollResult for Result<T, TaskError> {
    #[inline]
    fn into_poll_result(self) -> Result<PollResult, TaskError> {
        self.and_then(IntoPollResult::into_poll_result)
    }
}

/// Why a unit failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureCause {
    /// The unit's window elapsed before it finished.
    Timeout {
        /// The budget that was exceeded.
        limit: Duration,
    },
    /// A poll closure returned an error or panicked.
    Fault(TaskError),
}

/// A timeout or fault, attributed to the unit whose policy applies.
#[derive(Debug, Clone)]
pub struct Failure {
    /// Name of the unit.
    pub unit: Cow<'static, str>,
    /// Where the unit was constructed.
    pub location: &'static Location<'static>,
    /// What went wrong.
    pub cause: FailureCause,
    /// `true` if the whole queue is cleared, `false` if only the unit is dropped.
    pub cascade: bool,
}

impl Failure {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match &self.cause {
            FailureCause::Timeout { .. } => "task_timeout",
            FailureCause::Fault(e) => e.as_label(),
        }
    }

    /// Returns `true` for timeouts.
    pub fn is_timeout(&self) -> bool {
        matches!(self.cause, FailureCause::Timeout { .. })
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.cause {
            FailureCause::Timeout { limit } => {
                write!(f, "{} ({}) timed out after {limit:?}", self.unit, self.location)
            }
            FailureCause::Fault(e) => write!(f, "{} ({}) faulted: {e}", self.unit, self.location),
        }
    }
}
