use std::time::{Duration, Instant};

/// Lazily armed timeout window.
///
/// The deadline is computed on the first poll of the governed unit, not when
/// the unit is queued or activated.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct Window {
    armed: bool,
    limit: Option<Duration>,
    deadline: Option<Instant>,
}

impl Window {
    /// Arms the window once; later calls are no-ops until [`reset`](Self::reset).
    pub(crate) fn arm(&mut self, now: Instant, limit: Option<Duration>) {
        if !self.armed {
            self.armed = true;
            self.limit = limit;
            self.deadline = limit.map(|d| now + d);
        }
    }

    /// Strictly past the deadline.
    #[inline]
    pub(crate) fn expired(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|d| now > d)
    }

    #[inline]
    pub(crate) fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    #[inline]
    pub(crate) fn limit(&self) -> Duration {
        self.limit.unwrap_or_default()
    }

    #[inline]
    pub(crate) fn reset(&mut self) {
        *self = Window::default();
    }
}
