//! Named throttle gates for leaf poll closures.
//!
//! A poll closure runs every tick. When it issues a side effect towards the
//! host (send a command, click an object) it usually must not repeat that
//! effect on every frame. [`ThrottleRegistry`] keeps one gate per name: a gate
//! opens once, then stays closed until its window has elapsed.
//!
//! The manager owns one registry and hands it to poll closures through
//! [`PollContext::throttle`](crate::PollContext::throttle); a standalone
//! registry works the same way.
//!
//! ```rust
//! use std::time::{Duration, Instant};
//! use tickvisor::ThrottleRegistry;
//!
//! let mut gates = ThrottleRegistry::new();
//! let t0 = Instant::now();
//!
//! assert!(gates.throttle_at("interact", Duration::from_millis(500), t0));
//! assert!(!gates.throttle_at("interact", Duration::from_millis(500), t0));
//! assert!(gates.throttle_at("interact", Duration::from_millis(500), t0 + Duration::from_millis(500)));
//! ```

use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Registry of named, time-windowed gates.
#[derive(Debug, Default, Clone)]
pub struct ThrottleRegistry {
    /// Instant at which each gate opens again.
    gates: HashMap<String, Instant>,
}

impl ThrottleRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Passes through the gate `name` if it is open, closing it for `window`.
    ///
    /// Returns `true` when the caller may act now.
    pub fn throttle(&mut self, name: &str, window: Duration) -> bool {
        self.throttle_at(name, window, Instant::now())
    }

    /// Same as [`throttle`](Self::throttle) with an explicit clock reading.
    pub fn throttle_at(&mut self, name: &str, window: Duration, now: Instant) -> bool {
        match self.gates.get_mut(name) {
            Some(opens_at) if now < *opens_at => false,
            Some(opens_at) => {
                *opens_at = now + window;
                true
            }
            None => {
                self.gates.insert(name.to_owned(), now + window);
                true
            }
        }
    }

    /// Returns `true` if the gate `name` is open, without passing through it.
    #[must_use]
    pub fn check(&self, name: &str) -> bool {
        self.check_at(name, Instant::now())
    }

    /// Same as [`check`](Self::check) with an explicit clock reading.
    #[must_use]
    pub fn check_at(&self, name: &str, now: Instant) -> bool {
        self.gates.get(name).is_none_or(|opens_at| now >= *opens_at)
    }

    /// Time until the gate `name` opens (zero if open or unknown).
    #[must_use]
    pub fn remaining_at(&self, name: &str, now: Instant) -> Duration {
        self.gates
            .get(name)
            .map(|opens_at| opens_at.saturating_duration_since(now))
            .unwrap_or_default()
    }

    /// Closes the gate `name` for `window` starting at `now`, open or not.
    pub fn rethrottle_at(&mut self, name: &str, window: Duration, now: Instant) {
        self.gates.insert(name.to_owned(), now + window);
    }

    /// Opens the gate `name` immediately. Returns `true` if it existed.
    pub fn reset(&mut self, name: &str) -> bool {
        self.gates.remove(name).is_some()
    }

    /// Forgets every gate.
    pub fn clear(&mut self) {
        self.gates.clear();
    }

    /// Drops gates that are already open; returns how many were removed.
    pub fn prune_at(&mut self, now: Instant) -> usize {
        let before = self.gates.len();
        self.gates.retain(|_, opens_at| *opens_at > now);
        before - self.gates.len()
    }

    /// Number of tracked gates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.gates.len()
    }

    /// Returns `true` if no gate is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.gates.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_millis(200);

    #[test]
    fn gate_closes_for_its_window() {
        let mut gates = ThrottleRegistry::new();
        let t0 = Instant::now();

        assert!(gates.throttle_at("chat", WINDOW, t0));
        assert!(!gates.throttle_at("chat", WINDOW, t0 + Duration::from_millis(199)));
        assert!(!gates.check_at("chat", t0 + Duration::from_millis(100)));
        assert_eq!(
            gates.remaining_at("chat", t0 + Duration::from_millis(50)),
            Duration::from_millis(150)
        );
        assert!(gates.throttle_at("chat", WINDOW, t0 + WINDOW));
    }

    #[test]
    fn gates_are_independent() {
        let mut gates = ThrottleRegistry::new();
        let t0 = Instant::now();

        assert!(gates.throttle_at("move", WINDOW, t0));
        assert!(gates.throttle_at("target", WINDOW, t0));
        assert!(!gates.throttle_at("move", WINDOW, t0));
        assert!(gates.check_at("unknown", t0));
        assert_eq!(gates.remaining_at("unknown", t0), Duration::ZERO);
    }

    #[test]
    fn reset_and_rethrottle() {
        let mut gates = ThrottleRegistry::new();
        let t0 = Instant::now();

        assert!(gates.throttle_at("a", WINDOW, t0));
        assert!(gates.reset("a"));
        assert!(!gates.reset("a"));
        assert!(gates.throttle_at("a", WINDOW, t0));

        gates.rethrottle_at("b", WINDOW, t0);
        assert!(!gates.check_at("b", t0));
    }

    #[test]
    fn prune_drops_open_gates_only() {
        let mut gates = ThrottleRegistry::new();
        let t0 = Instant::now();

        gates.throttle_at("short", Duration::from_millis(10), t0);
        gates.throttle_at("long", Duration::from_secs(10), t0);

        assert_eq!(gates.prune_at(t0 + Duration::from_millis(10)), 1);
        assert_eq!(gates.len(), 1);
        gates.clear();
        assert!(gates.is_empty());
    }
}
