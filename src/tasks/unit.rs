//! # Schedulable units.
//!
//! A [`Unit`] is one queue entry. Every unit carries a name, the source location
//! it was built at, and a [`TaskConfig`]. Its behavior is one of four kinds:
//!
//! ```text
//! Simple      one poll closure
//! Sequential  poll closures run one after another      (cursor over steps)
//! Branch      condition, evaluated once, picks a child (then forwards)
//! Collection  child units run one after another        (cursor over children)
//! ```
//!
//! ## Polling
//! Polling a unit makes **exactly one** closure call (a step, a condition or a
//! leaf of a child). A composite that finishes a step returns `Continue` and
//! calls the next step on the following tick.
//!
//! ## Windows
//! The manager arms a timeout window for the top-level unit unless the unit is
//! a composite with `inner_timeouts` set. Such composites arm windows for their
//! children instead:
//! - `Sequential`: every step gets a fresh window of the group's own limit;
//! - `Branch` / `Collection`: the current child gets a window from its own config.
//!
//! ## Failure containment
//! A timeout or fault is attributed to the unit whose config applies. If that
//! config does not cascade, the nearest enclosing `Branch` / `Collection` drops
//! the child, reports the failure and moves on. Cascading failures bubble up to
//! the manager, which clears the queue.

use std::borrow::Cow;
use std::fmt;
use std::panic::Location;
use std::time::{Duration, Instant};

use crate::tasks::config::{TaskConfig, TimeLimit};
use crate::tasks::outcome::{Failure, FailureCause, IntoPollResult, PollResult};
use crate::tasks::poll::{self, ConditionFn, PollContext, PollFn};
use crate::tasks::window::Window;

/// Result of polling a unit once.
#[derive(Debug)]
pub(crate) enum Outcome {
    Continue,
    Done,
    Abort,
    /// A closure used the escape hatch; the manager decides what to drop.
    Escaped,
    Failed(Failure),
}

pub(crate) enum UnitKind {
    Simple(PollFn),
    Sequential {
        steps: Vec<PollFn>,
        cursor: usize,
        window: Window,
    },
    Branch {
        condition: ConditionFn,
        selected: Option<bool>,
        on_true: Box<Unit>,
        on_false: Box<Unit>,
        window: Window,
    },
    Collection {
        children: Vec<Unit>,
        cursor: usize,
        window: Window,
    },
}

/// One schedulable queue entry.
pub struct Unit {
    name: Cow<'static, str>,
    location: &'static Location<'static>,
    config: TaskConfig,
    kind: UnitKind,
}

impl Unit {
    pub(crate) fn from_parts(
        name: Cow<'static, str>,
        location: &'static Location<'static>,
        config: TaskConfig,
        kind: UnitKind,
    ) -> Self {
        Self {
            name,
            location,
            config,
            kind,
        }
    }

    /// Creates a unit around one poll closure with [`TaskConfig::DEFAULT`].
    ///
    /// ```rust
    /// use tickvisor::{PollContext, Unit};
    ///
    /// let u = Unit::simple("say-hello", |_cx: &mut PollContext<'_>| {});
    /// assert_eq!(u.name(), "say-hello");
    /// ```
    #[track_caller]
    pub fn simple<F, R>(name: impl Into<Cow<'static, str>>, f: F) -> Self
    where
        F: FnMut(&mut PollContext<'_>) -> R + 'static,
        R: IntoPollResult,
    {
        Self::from_parts(
            name.into(),
            Location::caller(),
            TaskConfig::DEFAULT,
            UnitKind::Simple(poll::boxed(f)),
        )
    }

    /// Creates a unit that finishes once `delay` has passed since its first poll.
    #[track_caller]
    pub fn delay(name: impl Into<Cow<'static, str>>, delay: Duration) -> Self {
        let mut until: Option<Instant> = None;
        Self::simple(name, move |cx: &mut PollContext<'_>| {
            let until = *until.get_or_insert(cx.now() + delay);
            cx.now() >= until
        })
        .with_config(TaskConfig::DEFAULT.with_time_limit(TimeLimit::Unlimited))
    }

    /// Always-done unit used for unset branch arms.
    pub(crate) fn noop(name: Cow<'static, str>, location: &'static Location<'static>) -> Self {
        Self::from_parts(
            name,
            location,
            TaskConfig::DEFAULT,
            UnitKind::Simple(poll::boxed(|_cx: &mut PollContext<'_>| {})),
        )
    }

    /// Returns the unit with `config` replacing its configuration.
    pub fn with_config(mut self, config: TaskConfig) -> Self {
        self.config = config;
        self
    }

    /// Unit name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn name_cow(&self) -> Cow<'static, str> {
        self.name.clone()
    }

    /// Source location the unit was built at.
    pub fn location(&self) -> &'static Location<'static> {
        self.location
    }

    /// Unit configuration.
    pub fn config(&self) -> &TaskConfig {
        &self.config
    }

    /// Short label of the unit kind.
    pub fn kind_label(&self) -> &'static str {
        match self.kind {
            UnitKind::Simple(_) => "simple",
            UnitKind::Sequential { .. } => "sequential",
            UnitKind::Branch { .. } => "branch",
            UnitKind::Collection { .. } => "collection",
        }
    }

    /// `(cursor, len)` of a `Sequential` or `Collection`; `None` otherwise.
    pub fn position(&self) -> Option<(usize, usize)> {
        match &self.kind {
            UnitKind::Sequential { steps, cursor, .. } => Some((*cursor, steps.len())),
            UnitKind::Collection {
                children, cursor, ..
            } => Some((*cursor, children.len())),
            _ => None,
        }
    }

    fn is_composite(&self) -> bool {
        !matches!(self.kind, UnitKind::Simple(_))
    }

    /// `false` for composites that hand windows down to their children.
    pub(crate) fn governs_own_window(&self) -> bool {
        !(self.is_composite() && self.config.inner_timeouts)
    }

    /// Effective timeout of this unit.
    pub(crate) fn limit(&self, default: Option<Duration>) -> Option<Duration> {
        self.config.time_limit.resolve(default)
    }

    pub(crate) fn failure(&self, cause: FailureCause) -> Failure {
        failure(&self.name, self.location, &self.config, cause)
    }

    /// Deadline of the innermost window currently armed inside this unit.
    pub(crate) fn inner_deadline(&self) -> Option<Instant> {
        match &self.kind {
            UnitKind::Simple(_) => None,
            UnitKind::Sequential { window, .. } => window.deadline(),
            UnitKind::Branch {
                selected,
                on_true,
                on_false,
                window,
                ..
            } => {
                let child = match selected {
                    Some(true) => on_true.inner_deadline(),
                    Some(false) => on_false.inner_deadline(),
                    None => None,
                };
                child.or(window.deadline())
            }
            UnitKind::Collection {
                children,
                cursor,
                window,
            } => children
                .get(*cursor)
                .and_then(Unit::inner_deadline)
                .or(window.deadline()),
        }
    }

    /// Polls the unit once.
    pub(crate) fn poll(&mut self, cx: &mut PollContext<'_>) -> Outcome {
        let Unit {
            name,
            location,
            config,
            kind,
        } = self;

        match kind {
            UnitKind::Simple(f) => {
                cx.set_flags(config.flags);
                let res = poll::invoke(f, cx);
                if cx.escape().is_some() {
                    return Outcome::Escaped;
                }
                match res {
                    Ok(r) => r.into(),
                    Err(e) => Outcome::Failed(failure(name, *location, config, FailureCause::Fault(e))),
                }
            }

            UnitKind::Sequential {
                steps,
                cursor,
                window,
            } => {
                let Some(step) = steps.get_mut(*cursor) else {
                    return Outcome::Done;
                };

                if config.inner_timeouts {
                    window.arm(cx.now(), config.time_limit.resolve(cx.default_timeout));
                    if window.expired(cx.now()) {
                        let cause = FailureCause::Timeout {
                            limit: window.limit(),
                        };
                        return Outcome::Failed(failure(name, *location, config, cause));
                    }
                }

                cx.set_flags(config.flags);
                let res = poll::invoke(step, cx);
                if cx.escape().is_some() {
                    return Outcome::Escaped;
                }
                match res {
                    Ok(PollResult::Continue) => Outcome::Continue,
                    Ok(PollResult::Done) => {
                        *cursor += 1;
                        window.reset();
                        if *cursor == steps.len() {
                            Outcome::Done
                        } else {
                            Outcome::Continue
                        }
                    }
                    Ok(PollResult::Abort) => Outcome::Abort,
                    Err(e) => Outcome::Failed(failure(name, *location, config, FailureCause::Fault(e))),
                }
            }

            UnitKind::Branch {
                condition,
                selected,
                on_true,
                on_false,
                window,
            } => {
                let Some(take_true) = *selected else {
                    cx.set_flags(config.flags);
                    let res = poll::evaluate(condition, cx);
                    if cx.escape().is_some() {
                        return Outcome::Escaped;
                    }
                    return match res {
                        Ok(arm) => {
                            *selected = Some(arm);
                            Outcome::Continue
                        }
                        Err(e) => Outcome::Failed(failure(name, *location, config, FailureCause::Fault(e))),
                    };
                };

                let child = if take_true { on_true } else { on_false };
                match poll_child(child, config.inner_timeouts, window, cx) {
                    Step::Finished => Outcome::Done,
                    Step::Running(out) => out,
                }
            }

            UnitKind::Collection {
                children,
                cursor,
                window,
            } => {
                let Some(child) = children.get_mut(*cursor) else {
                    return Outcome::Done;
                };

                match poll_child(child, config.inner_timeouts, window, cx) {
                    Step::Finished => {
                        *cursor += 1;
                        window.reset();
                        if *cursor == children.len() {
                            Outcome::Done
                        } else {
                            Outcome::Continue
                        }
                    }
                    Step::Running(out) => out,
                }
            }
        }
    }
}

/// Child progress as seen by its parent.
enum Step {
    /// The child is done, or failed without cascading and was dropped.
    Finished,
    /// Anything else, relayed verbatim.
    Running(Outcome),
}

/// Polls a child of a `Branch` / `Collection`, arming its window if the
/// parent hands windows down.
fn poll_child(child: &mut Unit, inner: bool, window: &mut Window, cx: &mut PollContext<'_>) -> Step {
    if inner && child.governs_own_window() {
        window.arm(cx.now(), child.limit(cx.default_timeout));
        if window.expired(cx.now()) {
            let f = child.failure(FailureCause::Timeout {
                limit: window.limit(),
            });
            return contain(f, cx);
        }
    }

    match child.poll(cx) {
        Outcome::Done => Step::Finished,
        Outcome::Failed(f) => contain(f, cx),
        other => Step::Running(other),
    }
}

fn contain(f: Failure, cx: &mut PollContext<'_>) -> Step {
    if f.cascade {
        Step::Running(Outcome::Failed(f))
    } else {
        cx.contained.push(f);
        Step::Finished
    }
}

fn failure(
    name: &Cow<'static, str>,
    location: &'static Location<'static>,
    config: &TaskConfig,
    cause: FailureCause,
) -> Failure {
    Failure {
        unit: name.clone(),
        location,
        cause,
        cascade: config.abort_queue_on_timeout,
    }
}

impl From<PollResult> for Outcome {
    fn from(r: PollResult) -> Self {
        match r {
            PollResult::Continue => Outcome::Continue,
            PollResult::Done => Outcome::Done,
            PollResult::Abort => Outcome::Abort,
        }
    }
}

impl fmt::Debug for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Unit")
            .field("name", &self.name)
            .field("kind", &self.kind_label())
            .field("location", &format_args!("{}", self.location))
            .field("config", &self.config)
            .field("position", &self.position())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builders::{BranchBuilder, CollectionBuilder, GroupBuilder};
    use crate::error::TaskError;
    use crate::throttle::ThrottleRegistry;

    fn poll_at(unit: &mut Unit, gates: &mut ThrottleRegistry, now: Instant) -> (Outcome, Vec<Failure>) {
        let mut cx = PollContext::new(now, now, None, gates);
        let out = unit.poll(&mut cx);
        (out, std::mem::take(&mut cx.contained))
    }

    fn countdown(mut n: u32) -> impl FnMut(&mut PollContext<'_>) -> bool {
        move |_cx: &mut PollContext<'_>| {
            if n == 0 {
                true
            } else {
                n -= 1;
                false
            }
        }
    }

    #[test]
    fn sequential_advances_one_step_per_poll() {
        let mut gates = ThrottleRegistry::new();
        let now = Instant::now();
        let mut unit = GroupBuilder::new("three")
            .then(|_cx: &mut PollContext<'_>| {})
            .then(countdown(1))
            .then(|_cx: &mut PollContext<'_>| true)
            .build();

        assert!(matches!(poll_at(&mut unit, &mut gates, now).0, Outcome::Continue));
        assert_eq!(unit.position(), Some((1, 3)));
        assert!(matches!(poll_at(&mut unit, &mut gates, now).0, Outcome::Continue));
        assert_eq!(unit.position(), Some((1, 3)));
        assert!(matches!(poll_at(&mut unit, &mut gates, now).0, Outcome::Continue));
        assert!(matches!(poll_at(&mut unit, &mut gates, now).0, Outcome::Done));
        assert_eq!(unit.position(), Some((3, 3)));
    }

    #[test]
    fn sequential_abort_propagates() {
        let mut gates = ThrottleRegistry::new();
        let now = Instant::now();
        let mut unit = GroupBuilder::new("abort")
            .then(|_cx: &mut PollContext<'_>| PollResult::Abort)
            .then(|_cx: &mut PollContext<'_>| {})
            .build();

        assert!(matches!(poll_at(&mut unit, &mut gates, now).0, Outcome::Abort));
        assert_eq!(unit.position(), Some((0, 2)));
    }

    #[test]
    fn empty_group_is_done_immediately() {
        let mut gates = ThrottleRegistry::new();
        let mut unit = GroupBuilder::new("empty").build();
        assert!(matches!(
            poll_at(&mut unit, &mut gates, Instant::now()).0,
            Outcome::Done
        ));
    }

    #[test]
    fn branch_condition_is_evaluated_once() {
        let mut gates = ThrottleRegistry::new();
        let now = Instant::now();
        let mut calls = 0;
        let mut unit = BranchBuilder::new("pick")
            .condition(move |_cx: &mut PollContext<'_>| {
                calls += 1;
                assert_eq!(calls, 1, "condition must run once");
                true
            })
            .on_true(Unit::simple("yes", countdown(1)))
            .on_false(Unit::simple("no", |_cx: &mut PollContext<'_>| PollResult::Abort))
            .build();

        assert!(matches!(poll_at(&mut unit, &mut gates, now).0, Outcome::Continue));
        assert!(matches!(poll_at(&mut unit, &mut gates, now).0, Outcome::Continue));
        assert!(matches!(poll_at(&mut unit, &mut gates, now).0, Outcome::Done));
    }

    #[test]
    fn branch_without_arms_is_a_noop() {
        let mut gates = ThrottleRegistry::new();
        let now = Instant::now();
        let mut unit = BranchBuilder::new("empty")
            .condition(|_cx: &mut PollContext<'_>| false)
            .build();

        assert!(matches!(poll_at(&mut unit, &mut gates, now).0, Outcome::Continue));
        assert!(matches!(poll_at(&mut unit, &mut gates, now).0, Outcome::Done));
    }

    #[test]
    fn collection_contains_non_cascading_child_fault() {
        let mut gates = ThrottleRegistry::new();
        let now = Instant::now();
        let lenient = TaskConfig::DEFAULT.with_abort_queue_on_timeout(false);
        let mut unit = CollectionBuilder::new("batch")
            .add(
                Unit::simple("broken", |_cx: &mut PollContext<'_>| -> Result<bool, TaskError> {
                    Err(TaskError::fail("no target"))
                })
                .with_config(lenient),
            )
            .add(Unit::simple("fine", |_cx: &mut PollContext<'_>| {}))
            .build();

        let (out, contained) = poll_at(&mut unit, &mut gates, now);
        assert!(matches!(out, Outcome::Continue));
        assert_eq!(contained.len(), 1);
        assert_eq!(contained[0].unit, "broken");
        assert!(matches!(poll_at(&mut unit, &mut gates, now).0, Outcome::Done));
    }

    #[test]
    fn collection_child_window_times_out_independently() {
        let mut gates = ThrottleRegistry::new();
        let t0 = Instant::now();
        let child_cfg = TaskConfig::DEFAULT
            .with_time_limit(TimeLimit::millis(100))
            .with_abort_queue_on_timeout(false);
        let mut unit = CollectionBuilder::new("batch")
            .config(TaskConfig::COLLECTION)
            .add(Unit::simple("stuck", |_cx: &mut PollContext<'_>| false).with_config(child_cfg))
            .add(Unit::simple("next", |_cx: &mut PollContext<'_>| true))
            .build();

        assert!(matches!(poll_at(&mut unit, &mut gates, t0).0, Outcome::Continue));
        assert_eq!(unit.inner_deadline(), Some(t0 + Duration::from_millis(100)));

        let (out, contained) = poll_at(&mut unit, &mut gates, t0 + Duration::from_millis(101));
        assert!(matches!(out, Outcome::Continue));
        assert!(contained[0].is_timeout());
        assert_eq!(unit.position(), Some((1, 2)));

        let later = t0 + Duration::from_millis(102);
        assert!(matches!(poll_at(&mut unit, &mut gates, later).0, Outcome::Done));
    }

    #[test]
    fn cascading_child_failure_bubbles_up() {
        let mut gates = ThrottleRegistry::new();
        let now = Instant::now();
        let mut unit = CollectionBuilder::new("batch")
            .add(Unit::simple("boom", |_cx: &mut PollContext<'_>| -> bool { panic!("boom") }))
            .build();

        match poll_at(&mut unit, &mut gates, now).0 {
            Outcome::Failed(f) => {
                assert!(f.cascade);
                assert_eq!(f.unit, "boom");
                assert_eq!(f.as_label(), "task_panicked");
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn escape_hatch_short_circuits() {
        let mut gates = ThrottleRegistry::new();
        let mut unit = Unit::simple("escape", |cx: &mut PollContext<'_>| {
            cx.abort_current();
            PollResult::Done
        });
        assert!(matches!(
            poll_at(&mut unit, &mut gates, Instant::now()).0,
            Outcome::Escaped
        ));
    }

    #[test]
    fn delay_waits_from_first_poll() {
        let mut gates = ThrottleRegistry::new();
        let t0 = Instant::now();
        let mut unit = Unit::delay("pause", Duration::from_millis(50));

        assert!(matches!(poll_at(&mut unit, &mut gates, t0).0, Outcome::Continue));
        let mid = t0 + Duration::from_millis(49);
        assert!(matches!(poll_at(&mut unit, &mut gates, mid).0, Outcome::Continue));
        let end = t0 + Duration::from_millis(50);
        assert!(matches!(poll_at(&mut unit, &mut gates, end).0, Outcome::Done));
    }

    #[test]
    fn sequential_inner_windows_restart_per_step() {
        let mut gates = ThrottleRegistry::new();
        let t0 = Instant::now();
        let ms = Duration::from_millis;
        let mut unit = GroupBuilder::new("walk")
            .config(
                TaskConfig::DEFAULT
                    .with_time_limit(TimeLimit::millis(100))
                    .with_inner_timeouts(true),
            )
            .then(move |cx: &mut PollContext<'_>| cx.now() >= t0 + ms(90))
            .then(|_cx: &mut PollContext<'_>| false)
            .build();

        assert!(matches!(poll_at(&mut unit, &mut gates, t0).0, Outcome::Continue));
        assert!(matches!(poll_at(&mut unit, &mut gates, t0 + ms(90)).0, Outcome::Continue));
        assert_eq!(unit.position(), Some((1, 2)));

        // second step arms its own window here
        assert!(matches!(poll_at(&mut unit, &mut gates, t0 + ms(150)).0, Outcome::Continue));
        assert!(matches!(poll_at(&mut unit, &mut gates, t0 + ms(250)).0, Outcome::Continue));
        assert_eq!(unit.inner_deadline(), Some(t0 + ms(250)));

        match poll_at(&mut unit, &mut gates, t0 + ms(251)).0 {
            Outcome::Failed(f) => {
                assert_eq!(f.unit, "walk");
                assert_eq!(f.cause, FailureCause::Timeout { limit: ms(100) });
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }
}
