//! Scheduler core: the task manager and what it owns.
//!
//! - [`manager`]: queue, active unit, tick loop, abort policy, telemetry;
//! - [`stack`]: the stack buffer that batches units into one collection;
//! - [`interrupt`]: cross-thread abort requests.

mod interrupt;
mod manager;
mod stack;

pub use interrupt::InterruptHandle;
pub use manager::{TaskManager, TickOutcome};
pub use stack::DiscardedStack;
