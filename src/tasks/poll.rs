//! # Poll closures and their per-call context.
//!
//! A poll closure receives a [`PollContext`] on every call. The context gives
//! read access to the tick clock and the unit's flags, mutable access to the
//! manager's [`ThrottleRegistry`], and two side channels back into the
//! scheduler:
//!
//! - **escape hatch**: [`PollContext::abort_current`] / [`PollContext::abort_all`]
//!   drop the active unit (or the whole queue) right after the call returns,
//!   whatever the closure returned;
//! - **staging**: [`PollContext::enqueue`] / [`PollContext::insert`] queue new
//!   units, applied right after the call returns.
//!
//! Closures run at frame cadence and must return promptly: the scheduler never
//! preempts a call, timeouts are only checked between calls.

use std::panic::{self, AssertUnwindSafe};
use std::time::{Duration, Instant};

use crate::error::TaskError;
use crate::tasks::config::ControlFlags;
use crate::tasks::outcome::{Failure, IntoPollResult, PollResult};
use crate::tasks::unit::Unit;
use crate::throttle::ThrottleRegistry;

/// Boxed poll closure as stored inside units.
pub(crate) type PollFn = Box<dyn FnMut(&mut PollContext<'_>) -> Result<PollResult, TaskError>>;

/// Boxed branch condition.
pub(crate) type ConditionFn = Box<dyn FnMut(&mut PollContext<'_>) -> Result<bool, TaskError>>;

/// Boxes a user closure, normalizing its return type.
pub(crate) fn boxed<F, R>(mut f: F) -> PollFn
where
    F: FnMut(&mut PollContext<'_>) -> R + 'static,
    R: IntoPollResult,
{
    Box::new(move |cx: &mut PollContext<'_>| f(cx).into_poll_result())
}

/// Boxes a branch condition, normalizing its return type.
pub(crate) fn boxed_condition<F, R>(mut f: F) -> ConditionFn
where
    F: FnMut(&mut PollContext<'_>) -> R + 'static,
    R: IntoCondition,
{
    Box::new(move |cx: &mut PollContext<'_>| f(cx).into_condition())
}

/// Calls a poll closure once, converting a panic into a fault.
pub(crate) fn invoke(f: &mut PollFn, cx: &mut PollContext<'_>) -> Result<PollResult, TaskError> {
    panic::catch_unwind(AssertUnwindSafe(|| f(cx))).unwrap_or_else(|p| Err(TaskError::from_panic(p)))
}

/// Evaluates a branch condition once, converting a panic into a fault.
pub(crate) fn evaluate(f: &mut ConditionFn, cx: &mut PollContext<'_>) -> Result<bool, TaskError> {
    panic::catch_unwind(AssertUnwindSafe(|| f(cx))).unwrap_or_else(|p| Err(TaskError::from_panic(p)))
}

/// Return types accepted from branch conditions.
pub trait IntoCondition {
    /// Converts `self` into the selected arm (`true` / `false`) or a fault.
    fn into_condition(self) -> Result<bool, TaskError>;
}

impl IntoCondition for bool {
    #[inline]
    fn into_condition(self) -> Result<bool, TaskError> {
        Ok(self)
    }
}

impl IntoCondition for Result<bool, TaskError> {
    #[inline]
    fn into_condition(self) -> Result<bool, TaskError> {
        self
    }
}

/// Request raised by a poll closure through the escape hatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Escape {
    /// Drop the active unit, keep the queue.
    AbortCurrent,
    /// Drop the active unit and the queue.
    AbortAll,
}

/// Unit staged by a poll closure.
pub(crate) enum Staged {
    Enqueue(Unit),
    Insert(Unit),
}

/// Per-call view of the scheduler handed to poll closures.
pub struct PollContext<'a> {
    now: Instant,
    started_at: Instant,
    flags: ControlFlags,
    throttles: &'a mut ThrottleRegistry,
    escape: Option<Escape>,
    staged: Vec<Staged>,
    /// Manager default timeout, used to resolve `TimeLimit::Inherit` of nested units.
    pub(crate) default_timeout: Option<Duration>,
    /// Failures contained inside composites during this call.
    pub(crate) contained: Vec<Failure>,
}

impl<'a> PollContext<'a> {
    pub(crate) fn new(
        now: Instant,
        started_at: Instant,
        default_timeout: Option<Duration>,
        throttles: &'a mut ThrottleRegistry,
    ) -> Self {
        Self {
            now,
            started_at,
            flags: ControlFlags::NONE,
            throttles,
            escape: None,
            staged: Vec::new(),
            default_timeout,
            contained: Vec::new(),
        }
    }

    /// Clock reading of the current tick.
    #[inline]
    pub fn now(&self) -> Instant {
        self.now
    }

    /// Time since the active top-level unit was activated.
    #[inline]
    pub fn elapsed(&self) -> Duration {
        self.now.saturating_duration_since(self.started_at)
    }

    /// Flags of the unit that owns the closure being called.
    #[inline]
    pub fn flags(&self) -> ControlFlags {
        self.flags
    }

    /// Passes through the named throttle gate at the current tick time.
    pub fn throttle(&mut self, name: &str, window: Duration) -> bool {
        self.throttles.throttle_at(name, window, self.now)
    }

    /// Direct access to the manager's throttle gates.
    pub fn throttles(&mut self) -> &mut ThrottleRegistry {
        self.throttles
    }

    /// Drops the active unit once this call returns; the queue keeps running.
    pub fn abort_current(&mut self) {
        self.escape.get_or_insert(Escape::AbortCurrent);
    }

    /// Drops the active unit and everything queued once this call returns.
    pub fn abort_all(&mut self) {
        self.escape = Some(Escape::AbortAll);
    }

    /// Appends `unit` to the queue once this call returns.
    pub fn enqueue(&mut self, unit: Unit) {
        self.staged.push(Staged::Enqueue(unit));
    }

    /// Puts `unit` at the head of the queue once this call returns.
    pub fn insert(&mut self, unit: Unit) {
        self.staged.push(Staged::Insert(unit));
    }

    pub(crate) fn set_flags(&mut self, flags: ControlFlags) {
        self.flags = flags;
    }

    pub(crate) fn escape(&self) -> Option<Escape> {
        self.escape
    }

    pub(crate) fn take_staged(&mut self) -> Vec<Staged> {
        std::mem::take(&mut self.staged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cx(throttles: &mut ThrottleRegistry) -> PollContext<'_> {
        let now = Instant::now();
        PollContext::new(now, now, None, throttles)
    }

    #[test]
    fn panics_become_faults() {
        let mut gates = ThrottleRegistry::new();
        let mut cx = cx(&mut gates);
        let mut f = boxed(|_cx: &mut PollContext<'_>| -> bool { panic!("sensor crashed") });

        let err = invoke(&mut f, &mut cx).unwrap_err();
        assert_eq!(err, TaskError::Panicked { message: "sensor crashed".into() });
    }

    #[test]
    fn abort_all_wins_over_abort_current() {
        let mut gates = ThrottleRegistry::new();
        let mut cx = cx(&mut gates);

        cx.abort_all();
        cx.abort_current();
        assert_eq!(cx.escape(), Some(Escape::AbortAll));
    }

    #[test]
    fn throttle_uses_tick_clock() {
        let mut gates = ThrottleRegistry::new();
        let mut cx = cx(&mut gates);

        assert!(cx.throttle("interact", Duration::from_secs(1)));
        assert!(!cx.throttle("interact", Duration::from_secs(1)));
    }
}
