use std::borrow::Cow;
use std::panic::Location;

use crate::core::TaskManager;
use crate::tasks::poll::{self, ConditionFn, IntoCondition};
use crate::tasks::unit::UnitKind;
use crate::{PollContext, TaskConfig, Unit};

/// Builder for a conditional unit.
///
/// The condition is evaluated exactly once, on the unit's first poll. The
/// selected arm then runs to completion even if the condition would evaluate
/// differently later. Unset arms are always-done no-ops; an unset condition
/// selects the `true` arm.
///
/// ```rust
/// use tickvisor::{BranchBuilder, PollContext, Unit};
///
/// let unit = BranchBuilder::new("mount-if-needed")
///     .condition(|_cx: &mut PollContext<'_>| false)
///     .on_true(Unit::simple("mount", |_cx: &mut PollContext<'_>| true))
///     .build();
///
/// assert_eq!(unit.kind_label(), "branch");
/// ```
#[must_use = "a builder does nothing until built or enqueued"]
pub struct BranchBuilder {
    name: Cow<'static, str>,
    location: &'static Location<'static>,
    config: TaskConfig,
    condition: Option<ConditionFn>,
    on_true: Option<Unit>,
    on_false: Option<Unit>,
}

impl BranchBuilder {
    /// Creates a branch with [`TaskConfig::BRANCH`].
    #[track_caller]
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            name: name.into(),
            location: Location::caller(),
            config: TaskConfig::BRANCH,
            condition: None,
            on_true: None,
            on_false: None,
        }
    }

    /// Replaces the branch configuration.
    pub fn config(mut self, config: TaskConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the condition.
    pub fn condition<F, R>(mut self, f: F) -> Self
    where
        F: FnMut(&mut PollContext<'_>) -> R + 'static,
        R: IntoCondition,
    {
        self.condition = Some(poll::boxed_condition(f));
        self
    }

    /// Sets the unit run when the condition holds.
    pub fn on_true(mut self, unit: Unit) -> Self {
        self.on_true = Some(unit);
        self
    }

    /// Sets the unit run when the condition does not hold.
    pub fn on_false(mut self, unit: Unit) -> Self {
        self.on_false = Some(unit);
        self
    }

    /// Finalizes the branch into a unit.
    pub fn build(self) -> Unit {
        let location = self.location;
        let arm = |unit: Option<Unit>, suffix: &str| {
            unit.unwrap_or_else(|| Unit::noop(format!("{}:{suffix}", self.name).into(), location))
        };
        let on_true = arm(self.on_true, "true");
        let on_false = arm(self.on_false, "false");
        let condition = self
            .condition
            .unwrap_or_else(|| poll::boxed_condition(|_cx: &mut PollContext<'_>| true));

        Unit::from_parts(
            self.name,
            location,
            self.config,
            UnitKind::Branch {
                condition,
                selected: None,
                on_true: Box::new(on_true),
                on_false: Box::new(on_false),
                window: Default::default(),
            },
        )
    }

    /// Finalizes the branch and appends it to `manager`'s queue.
    pub fn enqueue(self, manager: &mut TaskManager) {
        manager.enqueue_unit(self.build());
    }

    /// Finalizes the branch and puts it at the head of `manager`'s queue.
    pub fn insert(self, manager: &mut TaskManager) {
        manager.insert_unit(self.build());
    }
}
