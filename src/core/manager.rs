//! # Task manager: queue, active unit and the tick loop.
//!
//! [`TaskManager`] owns the pending queue and at most one active unit. The host
//! calls [`tick`](TaskManager::tick) (or [`tick_at`](TaskManager::tick_at)) once
//! per frame; every tick makes at most one poll.
//!
//! ## Tick
//! ```text
//! tick_at(now)
//!   ├─► interrupt pending?      → abort_tasks()                  → Interrupted (if any dropped)
//!   ├─► nothing active:
//!   │     ├─► queue empty       → observed_total = 0             → Idle
//!   │     └─► pop head          → active (window not armed yet)
//!   ├─► first poll              → arm window (now + limit)
//!   ├─► now > deadline          → Timeout (no poll)              → TimedOut
//!   └─► poll once
//!         ├─► staged units      → enqueue / insert
//!         ├─► escape hatch      → drop unit / drop all           → Cleared / Aborted
//!         ├─► Continue                                           → Continued
//!         ├─► Done              → drop unit (next one next tick) → Completed
//!         ├─► Abort             → drop unit, queue, stack        → Aborted
//!         └─► Err / panic       → Fault                          → Faulted
//! ```
//!
//! Timeouts and faults share one policy: with `abort_queue_on_timeout` the
//! queue (and any open stack) is cleared, otherwise only the failing unit is
//! dropped and the queue proceeds on the next tick.
//!
//! ## Stack
//! Between [`begin_stack`](TaskManager::begin_stack) and
//! [`enqueue_stack`](TaskManager::enqueue_stack) / [`insert_stack`](TaskManager::insert_stack)
//! every enqueue and insert lands in the stack buffer. The buffer reaches the
//! queue as one `Collection` unit, or not at all.
//!
//! ## Telemetry
//! Every transition is logged through `tracing` and published on the event bus
//! ([`subscribe`](TaskManager::subscribe)).

use std::borrow::Cow;
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe, Location};
use std::time::{Duration, Instant};

use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::builders::{BranchBuilder, CollectionBuilder, GroupBuilder};
use crate::config::ManagerConfig;
use crate::core::interrupt::InterruptHandle;
use crate::core::stack::{DiscardedStack, StackBuffer};
use crate::error::{StackError, TaskError};
use crate::events::{Bus, Event, EventKind};
use crate::tasks::config::TaskConfig;
use crate::tasks::outcome::{Failure, FailureCause, IntoPollResult};
use crate::tasks::poll::{Escape, PollContext, Staged};
use crate::tasks::unit::{Outcome, Unit};
use crate::tasks::window::Window;
use crate::throttle::ThrottleRegistry;

/// What a single tick did.
#[derive(Debug, Clone)]
pub enum TickOutcome {
    /// Nothing to run.
    Idle,
    /// An interrupt request dropped the active unit and the queue before any poll.
    Interrupted {
        /// Units dropped (active included).
        dropped: usize,
    },
    /// The active unit asked to be polled again.
    Continued { unit: Cow<'static, str> },
    /// The active unit finished.
    Completed { unit: Cow<'static, str> },
    /// The active unit returned `Abort` or called `abort_all`; the queue is gone.
    Aborted {
        unit: Cow<'static, str>,
        /// Units dropped (active included).
        dropped: usize,
    },
    /// The active unit called `abort_current`; the queue keeps running.
    Cleared { unit: Cow<'static, str> },
    /// A window elapsed.
    TimedOut(Failure),
    /// A poll closure returned an error or panicked.
    Faulted(Failure),
}

impl TickOutcome {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            TickOutcome::Idle => "idle",
            TickOutcome::Interrupted { .. } => "interrupted",
            TickOutcome::Continued { .. } => "continued",
            TickOutcome::Completed { .. } => "completed",
            TickOutcome::Aborted { .. } => "aborted",
            TickOutcome::Cleared { .. } => "cleared",
            TickOutcome::TimedOut(_) => "timed_out",
            TickOutcome::Faulted(_) => "faulted",
        }
    }

    /// The failure behind `TimedOut` / `Faulted`.
    pub fn failure(&self) -> Option<&Failure> {
        match self {
            TickOutcome::TimedOut(f) | TickOutcome::Faulted(f) => Some(f),
            _ => None,
        }
    }
}

/// Active unit with its manager-level timing.
struct Active {
    unit: Unit,
    started_at: Instant,
    window: Window,
}

/// Cooperative single-threaded scheduler.
///
/// ```rust
/// use tickvisor::{PollContext, PollResult, TaskManager, TickOutcome};
///
/// let mut tm = TaskManager::default();
/// let mut left = 2;
/// tm.enqueue("approach", move |_cx: &mut PollContext<'_>| {
///     left -= 1;
///     if left == 0 { PollResult::Done } else { PollResult::Continue }
/// });
///
/// assert!(matches!(tm.tick(), TickOutcome::Continued { .. }));
/// assert!(matches!(tm.tick(), TickOutcome::Completed { .. }));
/// assert!(matches!(tm.tick(), TickOutcome::Idle));
/// ```
pub struct TaskManager {
    cfg: ManagerConfig,
    queue: VecDeque<Unit>,
    active: Option<Active>,
    observed_total: usize,
    stack: Option<StackBuffer>,
    throttles: ThrottleRegistry,
    bus: Bus,
    interrupt: InterruptHandle,
}

impl TaskManager {
    /// Creates an idle manager.
    pub fn new(cfg: ManagerConfig) -> Self {
        let bus = Bus::new(cfg.bus_capacity_clamped());
        Self {
            cfg,
            queue: VecDeque::new(),
            active: None,
            observed_total: 0,
            stack: None,
            throttles: ThrottleRegistry::new(),
            bus,
            interrupt: InterruptHandle::new(),
        }
    }

    /// Manager configuration.
    pub fn config(&self) -> &ManagerConfig {
        &self.cfg
    }

    // ---------------------------------------------------------------------
    // Enqueue / insert
    // ---------------------------------------------------------------------

    /// Appends a simple unit with the manager's task configuration.
    #[track_caller]
    pub fn enqueue<F, R>(&mut self, name: impl Into<Cow<'static, str>>, f: F)
    where
        F: FnMut(&mut PollContext<'_>) -> R + 'static,
        R: IntoPollResult,
    {
        let config = self.cfg.task;
        self.enqueue_with(name, config, f);
    }

    /// Appends a simple unit with an explicit configuration.
    #[track_caller]
    pub fn enqueue_with<F, R>(&mut self, name: impl Into<Cow<'static, str>>, config: TaskConfig, f: F)
    where
        F: FnMut(&mut PollContext<'_>) -> R + 'static,
        R: IntoPollResult,
    {
        self.enqueue_unit(Unit::simple(name, f).with_config(config));
    }

    /// Puts a simple unit with the manager's task configuration at the head of the queue.
    #[track_caller]
    pub fn insert<F, R>(&mut self, name: impl Into<Cow<'static, str>>, f: F)
    where
        F: FnMut(&mut PollContext<'_>) -> R + 'static,
        R: IntoPollResult,
    {
        let config = self.cfg.task;
        self.insert_with(name, config, f);
    }

    /// Puts a simple unit with an explicit configuration at the head of the queue.
    #[track_caller]
    pub fn insert_with<F, R>(&mut self, name: impl Into<Cow<'static, str>>, config: TaskConfig, f: F)
    where
        F: FnMut(&mut PollContext<'_>) -> R + 'static,
        R: IntoPollResult,
    {
        self.insert_unit(Unit::simple(name, f).with_config(config));
    }

    /// Appends a unit that finishes `delay` after its first poll.
    #[track_caller]
    pub fn enqueue_delay(&mut self, name: impl Into<Cow<'static, str>>, delay: Duration) {
        self.enqueue_unit(Unit::delay(name, delay));
    }

    /// Puts a unit that finishes `delay` after its first poll at the head of the queue.
    #[track_caller]
    pub fn insert_delay(&mut self, name: impl Into<Cow<'static, str>>, delay: Duration) {
        self.insert_unit(Unit::delay(name, delay));
    }

    /// Appends a built unit (to the open stack, if any).
    pub fn enqueue_unit(&mut self, unit: Unit) {
        match self.stack.as_mut() {
            Some(stack) => {
                debug!(unit = unit.name(), stack = %stack.name(), "stacked");
                stack.push_back(unit);
            }
            None => {
                debug!(unit = unit.name(), location = %unit.location(), "enqueued");
                self.queue.push_back(unit);
            }
        }
    }

    /// Puts a built unit at the head of the queue (or of the open stack, if any).
    pub fn insert_unit(&mut self, unit: Unit) {
        match self.stack.as_mut() {
            Some(stack) => {
                debug!(unit = unit.name(), stack = %stack.name(), "stacked at front");
                stack.push_front(unit);
            }
            None => {
                debug!(unit = unit.name(), location = %unit.location(), "inserted");
                self.queue.push_front(unit);
            }
        }
    }

    /// Starts a sequential group builder.
    #[track_caller]
    pub fn create_group(&self, name: impl Into<Cow<'static, str>>) -> GroupBuilder {
        GroupBuilder::new(name)
    }

    /// Starts a branch builder.
    #[track_caller]
    pub fn create_branch(&self, name: impl Into<Cow<'static, str>>) -> BranchBuilder {
        BranchBuilder::new(name)
    }

    /// Starts a collection builder.
    #[track_caller]
    pub fn create_collection(&self, name: impl Into<Cow<'static, str>>) -> CollectionBuilder {
        CollectionBuilder::new(name)
    }

    // ---------------------------------------------------------------------
    // Stack
    // ---------------------------------------------------------------------

    /// Opens a stack buffer.
    ///
    /// An already open stack is discarded first; its summary is returned.
    #[track_caller]
    pub fn begin_stack(
        &mut self,
        name: impl Into<Cow<'static, str>>,
        config: TaskConfig,
    ) -> Option<DiscardedStack> {
        let location = Location::caller();
        let name = name.into();

        let discarded = self.stack.take().map(|old| {
            warn!(
                stack = %old.name(),
                location = %old.location(),
                replaced_by = %name,
                "stack reopened, discarding the open one"
            );
            self.discard(old, "reopened")
        });

        debug!(stack = %name, %location, "stack opened");
        self.stack = Some(StackBuffer::open(name, location, config));
        discarded
    }

    /// Adds a simple unit to the open stack.
    #[track_caller]
    pub fn add_to_stack<F, R>(&mut self, name: impl Into<Cow<'static, str>>, f: F) -> Result<(), StackError>
    where
        F: FnMut(&mut PollContext<'_>) -> R + 'static,
        R: IntoPollResult,
    {
        let unit = Unit::simple(name, f).with_config(self.cfg.task);
        let stack = self.stack.as_mut().ok_or(StackError::NotOpen)?;
        stack.push_back(unit);
        Ok(())
    }

    /// Closes the open stack and appends it to the queue as one unit.
    pub fn enqueue_stack(&mut self) -> Result<(), StackError> {
        let unit = self.commit_stack()?;
        self.queue.push_back(unit);
        Ok(())
    }

    /// Closes the open stack and puts it at the head of the queue as one unit.
    pub fn insert_stack(&mut self) -> Result<(), StackError> {
        let unit = self.commit_stack()?;
        self.queue.push_front(unit);
        Ok(())
    }

    /// Drops the open stack and everything in it.
    pub fn discard_stack(&mut self) -> Option<DiscardedStack> {
        let stack = self.stack.take()?;
        Some(self.discard(stack, "discarded"))
    }

    /// Opens a stack, lets `build` fill it and appends it to the queue.
    ///
    /// If `build` fails or panics the stack is discarded and the queue is left
    /// untouched. A panic is resumed after the discard.
    #[track_caller]
    pub fn enqueue_stack_with<B>(
        &mut self,
        name: impl Into<Cow<'static, str>>,
        config: TaskConfig,
        build: B,
    ) -> Result<(), StackError>
    where
        B: FnOnce(&mut Self) -> Result<(), TaskError>,
    {
        self.build_stack(name.into(), config, build)?;
        self.enqueue_stack()
    }

    /// Opens a stack, lets `build` fill it and puts it at the head of the queue.
    ///
    /// If `build` fails or panics the stack is discarded and the queue is left
    /// untouched. A panic is resumed after the discard.
    #[track_caller]
    pub fn insert_stack_with<B>(
        &mut self,
        name: impl Into<Cow<'static, str>>,
        config: TaskConfig,
        build: B,
    ) -> Result<(), StackError>
    where
        B: FnOnce(&mut Self) -> Result<(), TaskError>,
    {
        self.build_stack(name.into(), config, build)?;
        self.insert_stack()
    }

    /// Returns `true` while a stack buffer is open.
    pub fn is_stack_open(&self) -> bool {
        self.stack.is_some()
    }

    /// Entries in the open stack (0 if none is open).
    pub fn stack_len(&self) -> usize {
        self.stack.as_ref().map_or(0, StackBuffer::len)
    }

    #[track_caller]
    fn build_stack<B>(&mut self, name: Cow<'static, str>, config: TaskConfig, build: B) -> Result<(), StackError>
    where
        B: FnOnce(&mut Self) -> Result<(), TaskError>,
    {
        self.begin_stack(name.clone(), config);
        match panic::catch_unwind(AssertUnwindSafe(|| build(&mut *self))) {
            Ok(Ok(())) => Ok(()),
            Ok(Err(source)) => {
                warn!(stack = %name, error = %source, "stack build failed");
                self.discard_stack();
                Err(StackError::Build { stack: name, source })
            }
            Err(payload) => {
                warn!(stack = %name, "stack build panicked");
                self.discard_stack();
                panic::resume_unwind(payload)
            }
        }
    }

    fn commit_stack(&mut self) -> Result<Unit, StackError> {
        let stack = self.stack.take().ok_or(StackError::NotOpen)?;
        let (name, location, len) = (stack.name().clone(), stack.location(), stack.len());

        let unit = stack.commit().inspect_err(|e| {
            warn!(stack = %name, %location, error = %e, "stack not committed");
        })?;

        debug!(stack = %name, %location, entries = len, "stack committed");
        self.bus.publish(
            Event::now(EventKind::StackCommitted)
                .with_unit(&name)
                .with_location(location)
                .with_dropped(len),
        );
        Ok(unit)
    }

    fn discard(&self, stack: StackBuffer, reason: &'static str) -> DiscardedStack {
        let location = stack.location();
        let summary = stack.discard();
        debug!(stack = %summary.name, entries = summary.len, reason, "stack discarded");
        self.bus.publish(
            Event::now(EventKind::StackDiscarded)
                .with_unit(&summary.name)
                .with_location(location)
                .with_dropped(summary.len)
                .with_reason(reason),
        );
        summary
    }

    // ---------------------------------------------------------------------
    // Abort
    // ---------------------------------------------------------------------

    /// Drops the queue, the active unit and any open stack. Idempotent.
    pub fn abort_tasks(&mut self) {
        self.clear_all("abort_tasks");
    }

    /// Drops the active unit only; the queue proceeds on the next tick.
    pub fn abort_current_task(&mut self) {
        if let Some(active) = self.active.take() {
            self.cleared(&active.unit, "abort_current_task");
        }
    }

    /// Handle that lets other threads abort everything on the next tick.
    pub fn interrupt_handle(&self) -> InterruptHandle {
        self.interrupt.clone()
    }

    // ---------------------------------------------------------------------
    // Tick
    // ---------------------------------------------------------------------

    /// Advances the scheduler using the current clock.
    pub fn tick(&mut self) -> TickOutcome {
        self.tick_at(Instant::now())
    }

    /// Advances the scheduler as of `now`.
    pub fn tick_at(&mut self, now: Instant) -> TickOutcome {
        if self.interrupt.take() {
            let dropped = self.clear_all("interrupted");
            if dropped > 0 {
                warn!(dropped, "interrupt requested, queue cleared");
                return TickOutcome::Interrupted { dropped };
            }
        }

        if self.active.is_none() {
            let Some(unit) = self.queue.pop_front() else {
                self.observed_total = 0;
                return TickOutcome::Idle;
            };
            self.activate(unit, now);
        }

        let outcome = self.step(now);
        self.observe();
        outcome
    }

    fn activate(&mut self, unit: Unit, now: Instant) {
        debug!(
            unit = unit.name(),
            location = %unit.location(),
            kind = unit.kind_label(),
            queued = self.queue.len(),
            "unit started"
        );
        self.bus.publish(
            Event::now(EventKind::UnitStarted)
                .with_unit(unit.name())
                .with_location(unit.location())
                .with_queued(self.queue.len()),
        );
        self.active = Some(Active {
            unit,
            started_at: now,
            window: Window::default(),
        });
        self.observe();
    }

    fn step(&mut self, now: Instant) -> TickOutcome {
        let default_timeout = self.cfg.default_timeout();
        let Some(active) = self.active.as_mut() else {
            return TickOutcome::Idle;
        };

        if active.unit.governs_own_window() {
            active.window.arm(now, active.unit.limit(default_timeout));
            if active.window.expired(now) {
                let limit = active.window.limit();
                let failure = active.unit.failure(FailureCause::Timeout { limit });
                return self.fail(failure);
            }
        }

        let unit = active.unit.name_cow();
        let (outcome, escape, staged, contained) = {
            let mut cx = PollContext::new(now, active.started_at, default_timeout, &mut self.throttles);
            let outcome = active.unit.poll(&mut cx);
            let contained = std::mem::take(&mut cx.contained);
            (outcome, cx.escape(), cx.take_staged(), contained)
        };

        for failure in &contained {
            self.report(failure);
        }
        for staged in staged {
            match staged {
                Staged::Enqueue(u) => self.enqueue_unit(u),
                Staged::Insert(u) => self.insert_unit(u),
            }
        }

        match (escape, outcome) {
            (Some(Escape::AbortAll), _) => {
                let dropped = self.clear_all("abort_all");
                TickOutcome::Aborted { unit, dropped }
            }
            (Some(Escape::AbortCurrent), _) | (None, Outcome::Escaped) => {
                if let Some(active) = self.active.take() {
                    self.cleared(&active.unit, "abort_current");
                }
                TickOutcome::Cleared { unit }
            }
            (None, Outcome::Continue) => TickOutcome::Continued { unit },
            (None, Outcome::Done) => {
                if let Some(active) = self.active.take() {
                    debug!(unit = %unit, location = %active.unit.location(), "unit completed");
                    self.bus.publish(
                        Event::now(EventKind::UnitCompleted)
                            .with_unit(&unit)
                            .with_location(active.unit.location()),
                    );
                }
                TickOutcome::Completed { unit }
            }
            (None, Outcome::Abort) => {
                if let Some(active) = self.active.as_ref() {
                    debug!(unit = %unit, location = %active.unit.location(), "unit aborted");
                    self.bus.publish(
                        Event::now(EventKind::UnitAborted)
                            .with_unit(&unit)
                            .with_location(active.unit.location()),
                    );
                }
                let dropped = self.clear_all("aborted");
                TickOutcome::Aborted { unit, dropped }
            }
            (None, Outcome::Failed(failure)) => self.fail(failure),
        }
    }

    /// Applies the timeout / fault policy.
    fn fail(&mut self, failure: Failure) -> TickOutcome {
        self.report(&failure);
        if failure.cascade {
            self.clear_all(failure.as_label());
        } else {
            self.active = None;
        }

        if failure.is_timeout() {
            TickOutcome::TimedOut(failure)
        } else {
            TickOutcome::Faulted(failure)
        }
    }

    fn report(&self, failure: &Failure) {
        let policy = if failure.cascade { "cascade" } else { "contained" };
        warn!(
            unit = %failure.unit,
            location = %failure.location,
            cause = failure.as_label(),
            policy,
            "{failure}"
        );

        let ev = match &failure.cause {
            FailureCause::Timeout { limit } => Event::now(EventKind::TimeoutHit)
                .with_timeout(*limit)
                .with_reason(policy),
            FailureCause::Fault(e) => Event::now(EventKind::UnitFaulted).with_reason(e.as_message()),
        };
        self.bus
            .publish(ev.with_unit(&failure.unit).with_location(failure.location));
    }

    fn cleared(&self, unit: &Unit, reason: &'static str) {
        debug!(unit = unit.name(), location = %unit.location(), reason, "unit cleared");
        self.bus.publish(
            Event::now(EventKind::UnitCleared)
                .with_unit(unit.name())
                .with_location(unit.location())
                .with_reason(reason),
        );
    }

    /// Drops queue, active unit and open stack; returns how many units were dropped.
    fn clear_all(&mut self, reason: &'static str) -> usize {
        let dropped = self.queue.len() + usize::from(self.active.is_some());
        self.queue.clear();
        self.active = None;
        if let Some(stack) = self.stack.take() {
            self.discard(stack, reason);
        }

        if dropped > 0 {
            debug!(dropped, reason, "queue cleared");
            self.bus.publish(
                Event::now(EventKind::QueueCleared)
                    .with_dropped(dropped)
                    .with_reason(reason),
            );
        }
        dropped
    }

    fn observe(&mut self) {
        if self.is_busy() {
            let live = self.queue.len() + usize::from(self.active.is_some());
            self.observed_total = self.observed_total.max(live);
        }
    }

    // ---------------------------------------------------------------------
    // Telemetry
    // ---------------------------------------------------------------------

    /// Returns `true` while a unit is active or queued.
    pub fn is_busy(&self) -> bool {
        self.active.is_some() || !self.queue.is_empty()
    }

    /// Units waiting behind the active one.
    pub fn queued_count(&self) -> usize {
        self.queue.len()
    }

    /// High-water mark of live units since the manager was last idle.
    pub fn observed_total(&self) -> usize {
        self.observed_total
    }

    /// Share of observed units already finished, in `[0, 1]`.
    pub fn progress(&self) -> f32 {
        if self.observed_total == 0 {
            return 0.0;
        }
        let live = self.queue.len() + usize::from(self.active.is_some());
        let done = self.observed_total.saturating_sub(live);
        (done as f32 / self.observed_total as f32).clamp(0.0, 1.0)
    }

    /// Name of the active unit.
    pub fn current_unit_name(&self) -> Option<&str> {
        self.active.as_ref().map(|a| a.unit.name())
    }

    /// Construction site of the active unit.
    pub fn current_location(&self) -> Option<&'static Location<'static>> {
        self.active.as_ref().map(|a| a.unit.location())
    }

    /// `(cursor, len)` of the active composite.
    pub fn current_position(&self) -> Option<(usize, usize)> {
        self.active.as_ref().and_then(|a| a.unit.position())
    }

    /// Time left before the innermost armed window of the active unit expires.
    pub fn remaining_time(&self) -> Option<Duration> {
        self.remaining_time_at(Instant::now())
    }

    /// Same as [`remaining_time`](Self::remaining_time), as of `now`.
    pub fn remaining_time_at(&self, now: Instant) -> Option<Duration> {
        let active = self.active.as_ref()?;
        let deadline = active.unit.inner_deadline().or(active.window.deadline())?;
        Some(deadline.saturating_duration_since(now))
    }

    /// New receiver of scheduler events.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.bus.subscribe()
    }

    /// Throttle gates shared by every poll closure.
    pub fn throttles(&self) -> &ThrottleRegistry {
        &self.throttles
    }

    /// Mutable access to the throttle gates, e.g. to reset one from the host.
    pub fn throttles_mut(&mut self) -> &mut ThrottleRegistry {
        &mut self.throttles
    }
}

impl Default for TaskManager {
    fn default() -> Self {
        Self::new(ManagerConfig::default())
    }
}
