//! Runtime events: types and broadcast bus.
//!
//! The dispatcher and the periodic scheduler publish lifecycle events to a
//! shared broadcast [`Bus`]. Consumers observe without being able to block
//! the control loops.
//!
//! ```text
//! Publishers (many):                      Consumers (independent):
//!   Dispatcher  ──┐
//!   ConsumerSlot ─┼────► Bus ───────► log listener (renders via tracing)
//!   Scheduler   ──┤  (broadcast chan) └► tests / custom receivers
//!   Tenant load ──┘
//! ```
//!
//! The two control loops never consume each other's events; the bus exists
//! for observability only. Delivery is fire-and-forget: slow receivers lag
//! and skip, they are never awaited.

mod bus;
mod event;
mod log;

pub use bus::Bus;
pub use event::{Event, EventKind};
pub use log::spawn_event_logger;
