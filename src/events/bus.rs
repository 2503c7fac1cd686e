//! # Event bus for scheduler events.
//!
//! [`Bus`] is a thin wrapper around [`tokio::sync::broadcast`]. The task manager
//! publishes from the tick thread; any number of receivers (UI overlays, log
//! sinks, test harnesses) observe clones of every event.
//!
//! ```text
//! TaskManager::tick_at ──► Bus ──┬──► overlay receiver
//!                               └──► test receiver
//! ```
//!
//! ## Rules
//! - **Non-blocking publish**: `publish()` never blocks; a tick never waits on a receiver.
//! - **Bounded capacity**: a single ring buffer stores recent events for all receivers.
//! - **Lag handling**: slow receivers get `RecvError::Lagged(n)` and skip `n` oldest items.
//! - **No persistence**: events are lost if there are no active subscribers at send time.

use tokio::sync::broadcast;

use super::event::Event;

/// Broadcast channel for scheduler events.
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
}

impl Bus {
    /// Creates a new bus with the given channel capacity (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, _rx) = broadcast::channel::<Event>(capacity);
        Self { tx }
    }

    /// Publishes an event to all active subscribers.
    ///
    /// If there are no receivers, the event is dropped.
    pub fn publish(&self, ev: Event) {
        let _ = self.tx.send(ev);
    }

    /// Creates a new receiver that will observe subsequent events.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;
    use tokio::sync::broadcast::error::TryRecvError;

    #[test]
    fn publish_without_receivers_is_a_noop() {
        let bus = Bus::new(0);
        bus.publish(Event::now(EventKind::QueueCleared));
        let mut rx = bus.subscribe();
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[test]
    fn receivers_only_see_later_events() {
        let bus = Bus::new(4);
        bus.publish(Event::now(EventKind::UnitStarted));

        let mut rx = bus.subscribe();
        bus.publish(Event::now(EventKind::UnitCompleted));

        assert_eq!(rx.try_recv().map(|e| e.kind).ok(), Some(EventKind::UnitCompleted));
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[test]
    fn slow_receivers_lag() {
        let bus = Bus::new(1);
        let mut rx = bus.subscribe();
        bus.publish(Event::now(EventKind::UnitStarted));
        bus.publish(Event::now(EventKind::UnitCompleted));

        assert!(matches!(rx.try_recv(), Err(TryRecvError::Lagged(1))));
        assert_eq!(rx.try_recv().map(|e| e.kind).ok(), Some(EventKind::UnitCompleted));
    }
}
