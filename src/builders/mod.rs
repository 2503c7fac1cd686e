//! # Fluent unit builders.
//!
//! Builders are construction-time helpers without runtime state:
//! - [`GroupBuilder`] poll closures → sequential unit;
//! - [`BranchBuilder`] condition + optional arms → branch unit;
//! - [`CollectionBuilder`] child units → collection unit.
//!
//! Each builder ends with `build()` (hand the unit around yourself) or with
//! `enqueue(&mut manager)` / `insert(&mut manager)`, the only two calls that
//! touch a [`TaskManager`](crate::TaskManager).
//!
//! The builder records the source location of its `new` call; it shows up in
//! logs and events of the built unit.

mod branch;
mod collection;
mod group;

pub use branch::BranchBuilder;
pub use collection::CollectionBuilder;
pub use group::GroupBuilder;
