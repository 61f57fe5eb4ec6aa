//! Queue backend boundary and message codec.
//!
//! The task queues themselves live in an external key-value store; this
//! module owns the crate's view of them:
//!
//! - [`QueueBackend`] — the operations the control loops need: list pending
//!   items, enqueue one, observe worker liveness events.
//! - [`RedisQueue`] — the production backend, one per tenant.
//! - [`TaskMessage`] — the typed 6/7-field message codec.
//!
//! ```text
//! Scheduler ── enqueue(TaskMessage) ──► QueueBackend ◄── enqueued_items() ── Dispatcher
//!                                            ▲
//!                    worker subprocess ──────┘ (drains items, emits events)
//! ```
//!
//! Atomicity of enqueue/list is the store's responsibility; the loops never
//! share any other state.

mod message;
mod redis;

#[cfg(test)]
pub(crate) mod memory;

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::error::QueueError;

pub use self::redis::RedisQueue;
pub use message::{MessageArity, TaskMessage};

/// Liveness event emitted by a running worker onto its tenant's event
/// channel. The dispatcher only uses these as an activity signal; the
/// payload is otherwise opaque.
#[derive(Debug, Clone)]
pub struct WorkerEvent {
    /// Event kind as reported by the worker ("unknown" when unparseable).
    pub kind: String,
    /// Task id the event refers to, when the worker included one.
    pub task_id: Option<String>,
}

/// Per-tenant task queue as seen by the control loops.
#[async_trait]
pub trait QueueBackend: Send + Sync + 'static {
    /// Lists currently enqueued raw messages, oldest first.
    async fn enqueued_items(&self) -> Result<Vec<Vec<u8>>, QueueError>;

    /// Appends one raw message to the queue.
    async fn enqueue(&self, raw: Vec<u8>) -> Result<(), QueueError>;

    /// Subscribes to the tenant's worker liveness events.
    ///
    /// Each call returns an independent receiver; events published before
    /// the call are not replayed.
    async fn worker_events(&self) -> Result<broadcast::Receiver<WorkerEvent>, QueueError>;

    /// Queue name for logs.
    fn name(&self) -> &str;
}
