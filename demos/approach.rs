//! # Example: approach
//!
//! A small bot routine driven at 60 frames per second.
//!
//! Demonstrates how to:
//! - Build a sequential group and a branch with the manager's builders.
//! - Batch units atomically with a stack.
//! - Watch scheduler events from a receiver.
//! - Drive the manager with [`driver::drive_until_idle`].
//!
//! ## Flow
//! ```text
//! Approach (group, 1s)  ──► Door (branch) ──► Loot (stack → collection)
//!   ├─► walk: 3 frames        ├─► open        ├─► pick
//!   └─► stop                  └─► skip        └─► bank (throttled)
//! ```
//!
//! ## Run
//! ```bash
//! RUST_LOG=debug cargo run --example approach
//! ```

use std::time::Duration;

use tickvisor::{PollContext, PollResult, TaskConfig, TaskManager, TimeLimit, driver};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut tm = TaskManager::default();
    let mut events = tm.subscribe();

    // 1. Walk for a few frames, then stop; the whole group must finish within 1s
    let mut frames = 3;
    tm.create_group("Approach")
        .config(TaskConfig::DEFAULT.with_time_limit(TimeLimit::millis(1000)))
        .then(move |_cx: &mut PollContext<'_>| {
            if frames == 0 {
                return PollResult::Done;
            }
            frames -= 1;
            PollResult::Continue
        })
        .then(|_cx: &mut PollContext<'_>| println!("[approach] arrived"))
        .enqueue(&mut tm);

    // 2. Open the door only if it is closed
    tm.create_branch("Door")
        .condition(|_cx: &mut PollContext<'_>| true)
        .on_true(tickvisor::Unit::simple("open", |_cx: &mut PollContext<'_>| {
            println!("[door] opened")
        }))
        .enqueue(&mut tm);

    // 3. Queue loot handling as one unit
    tm.enqueue_stack_with("Loot", TaskConfig::COLLECTION, |tm| {
        tm.enqueue("pick", |_cx: &mut PollContext<'_>| println!("[loot] picked"));
        tm.enqueue("bank", |cx: &mut PollContext<'_>| {
            if cx.throttle("bank-click", Duration::from_millis(50)) {
                println!("[loot] banked");
            }
            true
        });
        Ok(())
    })?;

    let ticks = driver::drive_until_idle(&mut tm, Duration::from_millis(16), CancellationToken::new()).await;
    println!("finished after {ticks} ticks");

    while let Ok(ev) = events.try_recv() {
        let mark = if ev.is_failure() { "!" } else { " " };
        println!(
            "#{:<3}{mark} {:<16} {}",
            ev.seq,
            ev.kind.as_label(),
            ev.unit.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}
