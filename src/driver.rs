//! # Frame driver.
//!
//! Hosts with their own frame loop call [`TaskManager::tick`](crate::TaskManager::tick)
//! themselves. Everyone else can let [`drive`] tick the manager on a tokio
//! interval until a [`CancellationToken`] fires.
//!
//! ```text
//! interval(frame) ──► tick_at(now) ──► interval(frame) ──► ...
//!        ▲                                    │
//!        └──── token.cancelled() ◄────────────┘ (stops the loop)
//! ```
//!
//! Missed frames are skipped rather than replayed: a late frame produces one
//! tick, never a burst.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use tickvisor::{PollContext, TaskManager, driver};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let mut tm = TaskManager::default();
//!     tm.enqueue("hello", |_cx: &mut PollContext<'_>| {});
//!
//!     let ticks = driver::drive_until_idle(&mut tm, Duration::from_millis(5), CancellationToken::new()).await;
//!     assert!(ticks >= 2);
//! }
//! ```

use std::time::Duration;

use tokio::select;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::core::{TaskManager, TickOutcome};

/// Shortest accepted frame.
const MIN_FRAME: Duration = Duration::from_millis(1);

/// Ticks `manager` once per `frame` until `token` is cancelled.
///
/// Returns the number of ticks made.
pub async fn drive(manager: &mut TaskManager, frame: Duration, token: CancellationToken) -> u64 {
    run(manager, frame, &token, false).await
}

/// Like [`drive`], but also returns after the first idle tick.
pub async fn drive_until_idle(
    manager: &mut TaskManager,
    frame: Duration,
    token: CancellationToken,
) -> u64 {
    run(manager, frame, &token, true).await
}

async fn run(manager: &mut TaskManager, frame: Duration, token: &CancellationToken, stop_on_idle: bool) -> u64 {
    let mut interval = time::interval(frame.max(MIN_FRAME));
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut ticks: u64 = 0;

    loop {
        select! {
            _ = token.cancelled() => {
                debug!(ticks, "driver cancelled");
                break;
            }
            _ = interval.tick() => {
                ticks += 1;
                let outcome = manager.tick_at(Instant::now().into_std());
                if let Some(failure) = outcome.failure() {
                    debug!(
                        ticks,
                        outcome = outcome.as_label(),
                        unit = %failure.unit,
                        cause = failure.as_label(),
                        "tick failed"
                    );
                }
                if stop_on_idle && matches!(outcome, TickOutcome::Idle) {
                    debug!(ticks, "driver idle");
                    break;
                }
            }
        }
    }
    ticks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PollContext;
    use std::cell::Cell;
    use std::rc::Rc;

    #[tokio::test(start_paused = true)]
    async fn delay_finishes_on_the_frame_clock() {
        let mut tm = TaskManager::default();
        tm.enqueue_delay("pause", Duration::from_millis(50));

        let started = Instant::now();
        let ticks = drive_until_idle(&mut tm, Duration::from_millis(10), CancellationToken::new()).await;

        assert!(!tm.is_busy());
        assert!(started.elapsed() >= Duration::from_millis(50));
        assert!(ticks >= 6);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_stops_the_loop() {
        let mut tm = TaskManager::default();
        let polls = Rc::new(Cell::new(0u32));
        let counter = Rc::clone(&polls);
        tm.enqueue_with(
            "forever",
            crate::TaskConfig::DEFAULT.with_time_limit(crate::TimeLimit::Unlimited),
            move |_cx: &mut PollContext<'_>| {
                counter.set(counter.get() + 1);
                false
            },
        );

        let token = CancellationToken::new();
        let stop = token.clone();
        tokio::spawn(async move {
            time::sleep(Duration::from_millis(95)).await;
            stop.cancel();
        });

        let ticks = drive(&mut tm, Duration::from_millis(10), token).await;
        assert_eq!(u64::from(polls.get()), ticks);
        assert!(ticks >= 9);
        assert!(tm.is_busy());
    }

    #[tokio::test(start_paused = true)]
    async fn idle_manager_stops_after_one_tick() {
        let mut tm = TaskManager::default();
        let ticks = drive_until_idle(&mut tm, Duration::ZERO, CancellationToken::new()).await;
        assert_eq!(ticks, 1);
    }
}
