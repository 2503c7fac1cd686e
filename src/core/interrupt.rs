//! # Cross-thread abort request.
//!
//! [`InterruptHandle`] is the only part of the scheduler that may leave the
//! tick thread. A watchdog, signal handler or UI thread calls
//! [`trigger`](InterruptHandle::trigger); the next tick sees the request,
//! clears the queue and reports [`TickOutcome::Interrupted`](crate::TickOutcome::Interrupted).
//!
//! ```text
//! other thread ──► InterruptHandle::trigger() ──► AtomicBool ──► TaskManager::tick_at()
//!                                                                   └─► abort_tasks()
//! ```
//!
//! Requests are coalesced: several triggers between two ticks cause one abort.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Cloneable, thread-safe handle that asks a task manager to abort everything.
#[derive(Clone, Debug, Default)]
pub struct InterruptHandle {
    flag: Arc<AtomicBool>,
}

impl InterruptHandle {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Requests an abort on the next tick.
    pub fn trigger(&self) {
        self.flag.store(true, Ordering::Release);
    }

    /// Returns `true` if a request is pending.
    pub fn is_triggered(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// Consumes a pending request.
    pub(crate) fn take(&self) -> bool {
        self.flag.swap(false, Ordering::AcqRel)
    }
}
