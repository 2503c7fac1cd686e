use std::borrow::Cow;
use std::panic::Location;

use crate::core::TaskManager;
use crate::tasks::unit::UnitKind;
use crate::{IntoPollResult, PollContext, TaskConfig, Unit};

/// Builder for an ordered collection of heterogeneous units.
///
/// Children run in the order they were added. With the default
/// [`TaskConfig::COLLECTION`], every child runs under its own timeout window
/// and abort policy.
#[must_use = "a builder does nothing until built or enqueued"]
pub struct CollectionBuilder {
    name: Cow<'static, str>,
    location: &'static Location<'static>,
    config: TaskConfig,
    children: Vec<Unit>,
}

impl CollectionBuilder {
    /// Creates an empty collection with [`TaskConfig::COLLECTION`].
    #[track_caller]
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self::located(name.into(), Location::caller(), TaskConfig::COLLECTION)
    }

    pub(crate) fn located(
        name: Cow<'static, str>,
        location: &'static Location<'static>,
        config: TaskConfig,
    ) -> Self {
        Self {
            name,
            location,
            config,
            children: Vec::new(),
        }
    }

    /// Replaces the collection configuration.
    pub fn config(mut self, config: TaskConfig) -> Self {
        self.config = config;
        self
    }

    /// Appends a child unit.
    pub fn add(mut self, unit: Unit) -> Self {
        self.children.push(unit);
        self
    }

    /// Appends a simple child built from a closure.
    #[track_caller]
    pub fn then<F, R>(self, name: impl Into<Cow<'static, str>>, f: F) -> Self
    where
        F: FnMut(&mut PollContext<'_>) -> R + 'static,
        R: IntoPollResult,
    {
        let unit = Unit::simple(name, f);
        self.add(unit)
    }

    /// Appends a child unit in place.
    pub fn push(&mut self, unit: Unit) -> &mut Self {
        self.children.push(unit);
        self
    }

    /// Puts a child unit in front of the others, in place.
    pub fn push_front(&mut self, unit: Unit) -> &mut Self {
        self.children.insert(0, unit);
        self
    }

    /// Number of children added so far.
    pub fn len(&self) -> usize {
        self.children.len()
    }

    /// Returns `true` if no child was added.
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub(crate) fn name(&self) -> &Cow<'static, str> {
        &self.name
    }

    /// Finalizes the collection into a unit.
    pub fn build(self) -> Unit {
        Unit::from_parts(
            self.name,
            self.location,
            self.config,
            UnitKind::Collection {
                children: self.children,
                cursor: 0,
                window: Default::default(),
            },
        )
    }

    /// Finalizes the collection and appends it to `manager`'s queue.
    pub fn enqueue(self, manager: &mut TaskManager) {
        manager.enqueue_unit(self.build());
    }

    /// Finalizes the collection and puts it at the head of `manager`'s queue.
    pub fn insert(self, manager: &mut TaskManager) {
        manager.insert_unit(self.build());
    }
}
