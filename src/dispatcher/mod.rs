//! The dispatcher control loop and its consumer slots.
//!
//! ```text
//! tick (every Config::tick):
//!   1. Reap  — drop every slot whose worker exited
//!   2. Fill  — while active < capacity:
//!        scan tenants in rotation order;
//!        first tenant with an unclaimed pending task gets a slot,
//!        rotates to the back, and the scan restarts from the top
//! ```
//!
//! The loop is single-threaded and cooperative: only the tick mutates
//! dispatcher state, so no internal locking exists. Per-slot stop timers
//! run as their own cancellable tasks and never block the tick.

mod core;
mod slot;

pub use self::core::Dispatcher;
pub use slot::ConsumerSlot;
