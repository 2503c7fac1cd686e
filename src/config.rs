//! # Manager configuration.
//!
//! [`ManagerConfig`] holds the settings a [`TaskManager`](crate::TaskManager)
//! is created with: the default unit timeout, the event bus capacity, and the
//! configuration given to units enqueued through the closure shortcuts.
//!
//! ## Sentinel values
//! - `timeout = 0s` → no default timeout (`TimeLimit::Inherit` units never time out)
//!
//! # Example
//! ```
//! use std::time::Duration;
//! use tickvisor::{ManagerConfig, TaskManager};
//!
//! let mut cfg = ManagerConfig::default();
//! cfg.timeout = Duration::from_secs(3);
//! cfg.bus_capacity = 64;
//!
//! let tm = TaskManager::new(cfg);
//! assert_eq!(tm.config().default_timeout(), Some(Duration::from_secs(3)));
//! ```

use std::time::Duration;

use crate::tasks::config::TaskConfig;

/// Configuration of a task manager.
///
/// ## Field semantics
/// - `timeout`: window of units whose limit is `TimeLimit::Inherit` (`0s` = none)
/// - `bus_capacity`: event bus ring buffer size (min 1; clamped)
/// - `task`: configuration of units created by `enqueue(name, f)` / `insert(name, f)`
#[derive(Clone, Debug)]
pub struct ManagerConfig {
    /// Default unit timeout.
    pub timeout: Duration,

    /// Capacity of the event bus broadcast channel ring buffer.
    ///
    /// Receivers that lag behind more than `bus_capacity` events get
    /// `Lagged` and skip older items.
    pub bus_capacity: usize,

    /// Configuration applied by the closure shortcuts.
    pub task: TaskConfig,
}

impl ManagerConfig {
    /// Returns the default unit timeout as an `Option`.
    ///
    /// - `None` → no timeout
    /// - `Some(d)` → window length of inheriting units
    #[inline]
    pub fn default_timeout(&self) -> Option<Duration> {
        if self.timeout == Duration::ZERO {
            None
        } else {
            Some(self.timeout)
        }
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for ManagerConfig {
    /// Default configuration:
    ///
    /// - `timeout = 10s`
    /// - `bus_capacity = 1024`
    /// - `task = TaskConfig::DEFAULT`
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            bus_capacity: 1024,
            task: TaskConfig::DEFAULT,
        }
    }
}
