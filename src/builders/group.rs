use std::borrow::Cow;
use std::panic::Location;

use crate::core::TaskManager;
use crate::tasks::poll::{self, PollFn};
use crate::tasks::unit::UnitKind;
use crate::{IntoPollResult, PollContext, TaskConfig, Unit};

/// Builder for a sequential group of poll closures.
///
/// The group runs its steps in the order they were added, one step per tick
/// at most. It completes when the last step returns `Done`.
///
/// ```rust
/// use tickvisor::{GroupBuilder, PollContext, TaskManager};
///
/// let mut tm = TaskManager::default();
/// GroupBuilder::new("approach")
///     .then(|_cx: &mut PollContext<'_>| true)
///     .then(|_cx: &mut PollContext<'_>| {})
///     .enqueue(&mut tm);
///
/// assert_eq!(tm.queued_count(), 1);
/// ```
#[must_use = "a builder does nothing until built or enqueued"]
pub struct GroupBuilder {
    name: Cow<'static, str>,
    location: &'static Location<'static>,
    config: TaskConfig,
    steps: Vec<PollFn>,
}

impl GroupBuilder {
    /// Creates an empty group with [`TaskConfig::DEFAULT`].
    #[track_caller]
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            name: name.into(),
            location: Location::caller(),
            config: TaskConfig::DEFAULT,
            steps: Vec::new(),
        }
    }

    /// Replaces the group configuration.
    pub fn config(mut self, config: TaskConfig) -> Self {
        self.config = config;
        self
    }

    /// Appends a step.
    pub fn then<F, R>(mut self, f: F) -> Self
    where
        F: FnMut(&mut PollContext<'_>) -> R + 'static,
        R: IntoPollResult,
    {
        self.push(f);
        self
    }

    /// Appends a step in place (handy inside loops).
    pub fn push<F, R>(&mut self, f: F) -> &mut Self
    where
        F: FnMut(&mut PollContext<'_>) -> R + 'static,
        R: IntoPollResult,
    {
        self.steps.push(poll::boxed(f));
        self
    }

    /// Number of steps added so far.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Returns `true` if no step was added.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Finalizes the group into a unit.
    pub fn build(self) -> Unit {
        Unit::from_parts(
            self.name,
            self.location,
            self.config,
            UnitKind::Sequential {
                steps: self.steps,
                cursor: 0,
                window: Default::default(),
            },
        )
    }

    /// Finalizes the group and appends it to `manager`'s queue.
    pub fn enqueue(self, manager: &mut TaskManager) {
        manager.enqueue_unit(self.build());
    }

    /// Finalizes the group and puts it at the head of `manager`'s queue.
    pub fn insert(self, manager: &mut TaskManager) {
        manager.insert_unit(self.build());
    }
}
