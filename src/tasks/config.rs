//! # Per-unit configuration.
//!
//! [`TaskConfig`] is an immutable value attached to every unit. It decides:
//! - how long the unit may run before it times out ([`TimeLimit`]);
//! - whether nested units get their own timeout windows (`inner_timeouts`);
//! - what a timeout or fault does to the rest of the queue (`abort_queue_on_timeout`);
//! - which opaque [`ControlFlags`] are handed to poll closures.
//!
//! ## Presets
//! | Preset                      | Time limit       | Inner windows | Timeout clears queue |
//! |-----------------------------|------------------|---------------|----------------------|
//! | [`TaskConfig::DEFAULT`]     | inherit          | no            | yes                  |
//! | [`TaskConfig::SHORT`]       | 1s               | no            | yes                  |
//! | [`TaskConfig::BRANCH`]      | inherit          | yes           | yes                  |
//! | [`TaskConfig::COLLECTION`]  | inherit          | yes           | yes                  |

use std::ops::{BitOr, BitOrAssign};
use std::time::Duration;

/// Opaque bitset carried by a unit and exposed to its poll closures.
///
/// The scheduler never interprets these bits.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ControlFlags(u32);

impl ControlFlags {
    /// No flags set.
    pub const NONE: ControlFlags = ControlFlags(0);

    /// Wraps raw bits.
    pub const fn from_bits(bits: u32) -> Self {
        ControlFlags(bits)
    }

    /// Returns raw bits.
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Returns `true` if every bit of `other` is set in `self`.
    pub const fn contains(self, other: ControlFlags) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns `true` if no bit is set.
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for ControlFlags {
    type Output = ControlFlags;

    fn bitor(self, rhs: Self) -> Self::Output {
        ControlFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for ControlFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// How long a unit may run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TimeLimit {
    /// Use the manager's default timeout.
    #[default]
    Inherit,
    /// Time out after the given duration.
    Limit(Duration),
    /// Never time out.
    Unlimited,
}

impl TimeLimit {
    /// Shorthand for `TimeLimit::Limit(Duration::from_millis(ms))`.
    pub const fn millis(ms: u64) -> Self {
        TimeLimit::Limit(Duration::from_millis(ms))
    }

    /// Resolves the limit against the manager default (`None` = no timeout).
    #[inline]
    pub fn resolve(self, default: Option<Duration>) -> Option<Duration> {
        match self {
            TimeLimit::Inherit => default,
            TimeLimit::Limit(d) => Some(d),
            TimeLimit::Unlimited => None,
        }
    }
}

/// Immutable configuration of a unit.
///
/// ## Example
/// ```rust
/// use tickvisor::{TaskConfig, TimeLimit};
///
/// let cfg = TaskConfig::DEFAULT
///     .with_time_limit(TimeLimit::millis(250))
///     .with_abort_queue_on_timeout(false);
///
/// assert_eq!(cfg.time_limit, TimeLimit::millis(250));
/// assert!(!cfg.abort_queue_on_timeout);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TaskConfig {
    /// Pass-through flags for poll closures.
    pub flags: ControlFlags,
    /// Timeout budget of the unit.
    pub time_limit: TimeLimit,
    /// Children of a composite unit get independent windows.
    ///
    /// Ignored by [`Unit::simple`](crate::Unit::simple) units.
    pub inner_timeouts: bool,
    /// A timeout (or fault) clears the whole queue instead of dropping the unit.
    pub abort_queue_on_timeout: bool,
}

impl TaskConfig {
    /// Inherited timeout, shared windows, cascading timeouts.
    pub const DEFAULT: TaskConfig = TaskConfig {
        flags: ControlFlags::NONE,
        time_limit: TimeLimit::Inherit,
        inner_timeouts: false,
        abort_queue_on_timeout: true,
    };

    /// One second budget for quick checks.
    pub const SHORT: TaskConfig = TaskConfig {
        time_limit: TimeLimit::Limit(Duration::from_secs(1)),
        ..TaskConfig::DEFAULT
    };

    /// Branch preset: the selected arm runs under its own window.
    pub const BRANCH: TaskConfig = TaskConfig {
        inner_timeouts: true,
        ..TaskConfig::DEFAULT
    };

    /// Collection preset: every child runs under its own window.
    pub const COLLECTION: TaskConfig = TaskConfig {
        inner_timeouts: true,
        ..TaskConfig::DEFAULT
    };

    /// Returns a copy with updated time limit.
    pub const fn with_time_limit(mut self, time_limit: TimeLimit) -> Self {
        self.time_limit = time_limit;
        self
    }

    /// Returns a copy with updated inner-timeouts switch.
    pub const fn with_inner_timeouts(mut self, inner: bool) -> Self {
        self.inner_timeouts = inner;
        self
    }

    /// Returns a copy with updated abort policy.
    pub const fn with_abort_queue_on_timeout(mut self, abort: bool) -> Self {
        self.abort_queue_on_timeout = abort;
        self
    }

    /// Returns a copy with updated control flags.
    pub const fn with_flags(mut self, flags: ControlFlags) -> Self {
        self.flags = flags;
        self
    }
}

impl Default for TaskConfig {
    /// Returns [`TaskConfig::DEFAULT`].
    fn default() -> Self {
        TaskConfig::DEFAULT
    }
}
