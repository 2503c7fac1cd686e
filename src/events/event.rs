//! # Scheduler events.
//!
//! The [`EventKind`] enum classifies what happened inside the task manager:
//! - **Unit lifecycle**: started, completed, aborted, cleared;
//! - **Failures**: timeout hit, fault;
//! - **Queue / stack**: queue cleared, stack committed or discarded.
//!
//! The [`Event`] struct carries metadata such as timestamps, unit name,
//! construction site and reasons.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use tickvisor::{Event, EventKind};
//!
//! let ev = Event::now(EventKind::TimeoutHit)
//!     .with_unit("approach")
//!     .with_reason("no path")
//!     .with_timeout(Duration::from_secs(5));
//!
//! assert_eq!(ev.kind, EventKind::TimeoutHit);
//! assert_eq!(ev.unit.as_deref(), Some("approach"));
//! assert_eq!(ev.timeout_ms, Some(5_000));
//! ```

use std::panic::Location;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of scheduler events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Unit lifecycle ===
    /// A unit was taken from the queue and became active.
    ///
    /// Sets: `unit`, `location`, `queued` (units left behind it).
    UnitStarted,

    /// The active unit returned `Done`.
    ///
    /// Sets: `unit`, `location`.
    UnitCompleted,

    /// The active unit returned `Abort`; the queue is cleared as well.
    ///
    /// Sets: `unit`, `location`.
    UnitAborted,

    /// The active unit was dropped without finishing (escape hatch or
    /// `abort_current_task`); the queue keeps running.
    ///
    /// Sets: `unit`, `location`, `reason`.
    UnitCleared,

    // === Failures ===
    /// A unit's window elapsed.
    ///
    /// Sets: `unit`, `location`, `timeout_ms`, `reason` (`"cascade"` or `"contained"`).
    TimeoutHit,

    /// A poll closure returned an error or panicked.
    ///
    /// Sets: `unit`, `location`, `reason` (error message).
    UnitFaulted,

    // === Queue / stack ===
    /// Queue, active unit and open stack were dropped.
    ///
    /// Sets: `dropped` (units dropped), `reason`.
    QueueCleared,

    /// An open stack was turned into a unit and queued.
    ///
    /// Sets: `unit` (stack name), `location`, `dropped` (entries in the stack).
    StackCommitted,

    /// An open stack was thrown away.
    ///
    /// Sets: `unit` (stack name), `location`, `dropped` (entries lost), `reason`.
    StackDiscarded,
}

impl EventKind {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            EventKind::UnitStarted => "unit_started",
            EventKind::UnitCompleted => "unit_completed",
            EventKind::UnitAborted => "unit_aborted",
            EventKind::UnitCleared => "unit_cleared",
            EventKind::TimeoutHit => "timeout_hit",
            EventKind::UnitFaulted => "unit_faulted",
            EventKind::QueueCleared => "queue_cleared",
            EventKind::StackCommitted => "stack_committed",
            EventKind::StackDiscarded => "stack_discarded",
        }
    }
}

/// Scheduler event with optional metadata.
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Name of the unit (or stack), if applicable.
    pub unit: Option<Arc<str>>,
    /// Where the unit was constructed.
    pub location: Option<&'static Location<'static>>,
    /// Human-readable reason (errors, policy, ...).
    pub reason: Option<Arc<str>>,
    /// Timeout budget in milliseconds (compact).
    pub timeout_ms: Option<u32>,
    /// Number of units left in the queue.
    pub queued: Option<u32>,
    /// Number of units or stack entries dropped.
    pub dropped: Option<u32>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn now(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            unit: None,
            location: None,
            reason: None,
            timeout_ms: None,
            queued: None,
            dropped: None,
        }
    }

    /// Attaches a unit name.
    #[inline]
    pub fn with_unit(mut self, unit: impl AsRef<str>) -> Self {
        self.unit = Some(Arc::from(unit.as_ref()));
        self
    }

    /// Attaches a construction site.
    #[inline]
    pub fn with_location(mut self, location: &'static Location<'static>) -> Self {
        self.location = Some(location);
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a timeout budget (stored as milliseconds).
    #[inline]
    pub fn with_timeout(mut self, d: Duration) -> Self {
        self.timeout_ms = Some(clamp_u32(d.as_millis()));
        self
    }

    /// Attaches the queue length.
    #[inline]
    pub fn with_queued(mut self, n: usize) -> Self {
        self.queued = Some(clamp_u32(n as u128));
        self
    }

    /// Attaches a dropped count.
    #[inline]
    pub fn with_dropped(mut self, n: usize) -> Self {
        self.dropped = Some(clamp_u32(n as u128));
        self
    }

    /// Returns `true` for `TimeoutHit` and `UnitFaulted`.
    #[inline]
    pub fn is_failure(&self) -> bool {
        matches!(self.kind, EventKind::TimeoutHit | EventKind::UnitFaulted)
    }
}

fn clamp_u32(n: u128) -> u32 {
    n.min(u128::from(u32::MAX)) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_numbers_increase() {
        let a = Event::now(EventKind::UnitStarted);
        let b = Event::now(EventKind::UnitCompleted);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn compact_fields_saturate() {
        let ev = Event::now(EventKind::TimeoutHit).with_timeout(Duration::from_secs(u64::MAX));
        assert_eq!(ev.timeout_ms, Some(u32::MAX));
        assert!(ev.is_failure());
        assert_eq!(ev.kind.as_label(), "timeout_hit");
    }
}
