//! # Stack buffer.
//!
//! While a stack is open, everything the manager is asked to enqueue or insert
//! lands in the buffer instead of the queue. Committing the stack turns the
//! buffer into a single `Collection` unit; discarding it drops every entry.
//! Either way, the queue sees all of the stack or none of it.

use std::borrow::Cow;
use std::panic::Location;

use crate::builders::CollectionBuilder;
use crate::error::StackError;
use crate::tasks::config::TaskConfig;
use crate::tasks::unit::Unit;

/// Summary of a stack that was thrown away.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscardedStack {
    /// Name the stack was opened with.
    pub name: Cow<'static, str>,
    /// Entries lost with it.
    pub len: usize,
}

/// Open stack: a collection under construction.
pub(crate) struct StackBuffer {
    location: &'static Location<'static>,
    builder: CollectionBuilder,
}

impl StackBuffer {
    pub(crate) fn open(
        name: Cow<'static, str>,
        location: &'static Location<'static>,
        config: TaskConfig,
    ) -> Self {
        Self {
            location,
            builder: CollectionBuilder::located(name, location, config),
        }
    }

    pub(crate) fn name(&self) -> &Cow<'static, str> {
        self.builder.name()
    }

    pub(crate) fn location(&self) -> &'static Location<'static> {
        self.location
    }

    pub(crate) fn len(&self) -> usize {
        self.builder.len()
    }

    pub(crate) fn push_back(&mut self, unit: Unit) {
        self.builder.push(unit);
    }

    pub(crate) fn push_front(&mut self, unit: Unit) {
        self.builder.push_front(unit);
    }

    /// Turns the buffer into a collection unit.
    pub(crate) fn commit(self) -> Result<Unit, StackError> {
        if self.builder.is_empty() {
            return Err(StackError::Empty {
                stack: self.name().clone(),
            });
        }
        Ok(self.builder.build())
    }

    pub(crate) fn discard(self) -> DiscardedStack {
        DiscardedStack {
            name: self.name().clone(),
            len: self.len(),
        }
    }
}
