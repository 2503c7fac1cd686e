//! Scheduler events: types and broadcast bus.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! The only publisher is [`TaskManager`](crate::TaskManager); receivers are
//! obtained through [`TaskManager::subscribe`](crate::TaskManager::subscribe).

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
