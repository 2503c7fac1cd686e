//! # tickvisor
//!
//! **Tickvisor** is a cooperative, tick-driven task manager for multi-step
//! automation sequences.
//!
//! The host calls [`TaskManager::tick`] once per frame. Each tick polls the
//! active unit exactly once; units report progress with a tri-state
//! [`PollResult`] and are dropped the moment they finish, abort, time out or
//! fault. Composite units (sequential groups, branches, collections) are built
//! with fluent builders, and a stack buffer lets callers queue a batch of
//! units atomically.
//!
//! ## Architecture
//! ```text
//!  enqueue / insert          builders                begin_stack … enqueue_stack
//!        │             (Group / Branch / Collection)            │
//!        ▼                       ▼                              ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  TaskManager                                                      │
//! │  - queue (VecDeque<Unit>)         - stack buffer (optional)       │
//! │  - active unit + window           - throttle registry             │
//! │  - observed total (progress)      - interrupt handle              │
//! └──────┬───────────────────────────────────────────────────┬────────┘
//!        │ tick_at(now): one poll                            │ publish
//!        ▼                                                   ▼
//! ┌──────────────┐                                ┌──────────────────┐
//! │ Unit::poll   │ Simple / Sequential /          │ Bus (broadcast)  │
//! │ (PollContext)│ Branch / Collection            │ Event{kind, ...} │
//! └──────────────┘                                └──────────────────┘
//! ```
//!
//! ### Tick
//! ```text
//! loop (host frame or driver::drive) {
//!   ├─► interrupt pending ─► clear everything            ─► Interrupted
//!   ├─► no active unit    ─► pop head, or go idle        ─► Idle
//!   ├─► window expired    ─► Timeout (policy)            ─► TimedOut
//!   └─► poll once
//!         ├─ Continue ─► keep
//!         ├─ Done     ─► drop unit                       ─► Completed
//!         ├─ Abort    ─► drop unit + queue + stack       ─► Aborted
//!         └─ Err/panic─► Fault (policy)                  ─► Faulted
//! }
//! ```
//!
//! ## Features
//! | Area              | Description                                             | Key types                                   |
//! |-------------------|---------------------------------------------------------|---------------------------------------------|
//! | **Scheduling**    | Queue, tick loop, abort and stack operations.           | [`TaskManager`], [`TickOutcome`]            |
//! | **Units**         | Poll closures and composite units.                      | [`Unit`], [`PollContext`], [`PollResult`]   |
//! | **Builders**      | Fluent construction of composites.                      | [`GroupBuilder`], [`BranchBuilder`], [`CollectionBuilder`] |
//! | **Policy**        | Timeouts, inner windows, abort-on-timeout.              | [`TaskConfig`], [`TimeLimit`]               |
//! | **Rate limiting** | Named throttle gates shared by all closures.            | [`ThrottleRegistry`]                        |
//! | **Events**        | Broadcast lifecycle events.                             | [`Event`], [`EventKind`]                    |
//! | **Errors**        | Typed leaf and stack errors.                            | [`TaskError`], [`StackError`]               |
//! | **Driver**        | Tokio interval loop with cancellation.                  | [`driver::drive`]                           |
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use tickvisor::{PollContext, PollResult, TaskConfig, TaskManager, TickOutcome, TimeLimit};
//!
//! let mut tm = TaskManager::default();
//!
//! let mut steps_left = 2;
//! tm.create_group("Approach")
//!     .config(TaskConfig::DEFAULT.with_time_limit(TimeLimit::millis(1000)))
//!     .then(move |_cx: &mut PollContext<'_>| {
//!         if steps_left == 0 {
//!             return PollResult::Done;
//!         }
//!         steps_left -= 1;
//!         PollResult::Continue
//!     })
//!     .then(|_cx: &mut PollContext<'_>| PollResult::Done)
//!     .enqueue(&mut tm);
//!
//! tm.enqueue_delay("settle", Duration::ZERO);
//!
//! let mut ticks = 0;
//! while !matches!(tm.tick(), TickOutcome::Idle) {
//!     ticks += 1;
//! }
//! assert_eq!(ticks, 5);
//! ```

mod builders;
mod config;
mod core;
pub mod driver;
mod error;
mod events;
mod tasks;
mod throttle;

// ---- Public re-exports ----

pub use builders::{BranchBuilder, CollectionBuilder, GroupBuilder};
pub use config::ManagerConfig;
pub use core::{DiscardedStack, InterruptHandle, TaskManager, TickOutcome};
pub use error::{StackError, TaskError};
pub use events::{Bus, Event, EventKind};
pub use tasks::{
    ControlFlags, Failure, FailureCause, IntoCondition, IntoPollResult, PollContext, PollResult, TaskConfig,
    TimeLimit, Unit,
};
pub use throttle::ThrottleRegistry;
