//! # Units and what they are made of.
//!
//! - [`outcome`]: poll results, accepted closure return types, failures;
//! - [`config`]: per-unit configuration and presets;
//! - [`poll`]: boxed poll closures and the [`PollContext`] handed to them;
//! - [`window`]: lazily armed timeout windows;
//! - [`unit`]: the four unit kinds and their single poll function.

pub(crate) mod config;
pub(crate) mod outcome;
pub(crate) mod poll;
pub(crate) mod unit;
pub(crate) mod window;

pub use config::{ControlFlags, TaskConfig, TimeLimit};
pub use outcome::{Failure, FailureCause, IntoPollResult, PollResult};
pub use poll::{IntoCondition, PollContext};
pub use unit::Unit;
