//! # Runtime events emitted by the dispatcher and the periodic scheduler.
//!
//! [`EventKind`] classifies what happened; [`Event`] carries the metadata
//! (tenant, task id, reason, exit code) relevant to that kind.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases
//! monotonically. Use `seq` to restore exact order when events are observed
//! out of order across receivers.

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::SystemTime;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Startup ===
    /// A tenant finished loading (config parsed, periodic tasks registered).
    ///
    /// Sets: `tenant`.
    TenantLoaded,

    // === Consumer slot lifecycle ===
    /// A pending task was claimed and a worker subprocess spawned for it.
    ///
    /// Sets: `tenant`, `task`.
    SlotSpawned,

    /// A slot's worker exited and the slot was dropped.
    ///
    /// Sets: `tenant`, `task`, `code` (when the OS reported one).
    SlotReaped,

    /// A worker ran past the hard ceiling and was force-killed.
    ///
    /// Sets: `tenant`, `task`.
    WatchdogKilled,

    /// A stop signal was sent to a running worker by its stopping policy.
    ///
    /// Sets: `tenant`, `task`, `reason` ("grace-elapsed", "idle-timeout",
    /// "hard-cap", "events-closed").
    StopSignaled,

    /// A queue message failed to decode and was skipped.
    ///
    /// Sets: `tenant`, `reason` (codec error label).
    MessageRejected,

    // === Periodic scheduler ===
    /// A due periodic task was written to its tenant's queue.
    ///
    /// Sets: `tenant`, `task` (label).
    PeriodicEnqueued,

    /// The scheduler found itself behind schedule and skipped the iteration.
    TickSkipped,

    // === Shutdown ===
    /// Termination signal observed; the dispatcher is returning.
    ShutdownRequested,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Tenant name, if applicable.
    pub tenant: Option<Arc<str>>,
    /// Task id or task label, if applicable.
    pub task: Option<Arc<str>>,
    /// Human-readable reason (stop cause, codec label, etc.).
    pub reason: Option<Arc<str>>,
    /// Worker exit code, if the OS reported one.
    pub code: Option<i32>,
}

impl Event {
    /// Creates a new event of the given kind with the current timestamp and
    /// the next sequence number.
    pub fn now(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            tenant: None,
            task: None,
            reason: None,
            code: None,
        }
    }

    /// Attaches a tenant name.
    #[inline]
    pub fn with_tenant(mut self, tenant: impl Into<Arc<str>>) -> Self {
        self.tenant = Some(tenant.into());
        self
    }

    /// Attaches a task id or label.
    #[inline]
    pub fn with_task(mut self, task: impl Into<Arc<str>>) -> Self {
        self.task = Some(task.into());
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a worker exit code.
    #[inline]
    pub fn with_code(mut self, code: i32) -> Self {
        self.code = Some(code);
        self
    }
}
