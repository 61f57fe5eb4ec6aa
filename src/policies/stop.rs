//! # Per-slot stopping policy.
//!
//! A consumer slot binds one claimed task to one worker subprocess. The
//! stopping policy decides when that worker is told to stop; the watchdog
//! ceiling applies on top of every variant.
//!
//! ## Variants
//! - `RunOnce`: the worker drains one task and exits by itself.
//! - `UntilIdle`: the worker stays alive; stop once its event channel goes
//!   quiet, or a hard cap elapses, whichever first.
//! - `GracePeriod`: unconditional stop signal after a fixed delay.

use std::time::Duration;

/// Policy controlling when a running worker receives its stop signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopPolicy {
    /// The worker self-terminates after draining one task; the slot only
    /// polls for exit.
    ///
    /// Use when:
    /// - Workers are short-lived by construction
    /// - Exactly-one-task-per-spawn semantics are wanted
    RunOnce,

    /// The worker keeps draining tasks; stop once no liveness event has
    /// arrived for `idle`, or after `cap` in total, whichever comes first.
    ///
    /// Use when:
    /// - Spawn cost is high and queues are bursty
    /// - The worker emits liveness events the slot can observe
    UntilIdle {
        /// Quiet period after the last event before stopping.
        idle: Duration,
        /// Hard upper bound on the drain window.
        cap: Duration,
    },

    /// Send the stop signal unconditionally after `delay`, relying on the
    /// worker's own graceful shutdown to finish in-flight work.
    ///
    /// Use when:
    /// - Workers handle the interrupt signal cleanly
    /// - A predictable per-spawn budget matters more than throughput
    GracePeriod {
        /// Time the worker is given before the stop signal.
        delay: Duration,
    },
}

impl StopPolicy {
    /// `UntilIdle` with the stock thresholds: 1s idle, 20s cap.
    pub fn until_idle() -> Self {
        StopPolicy::UntilIdle {
            idle: Duration::from_secs(1),
            cap: Duration::from_secs(20),
        }
    }

    /// `GracePeriod` with the stock 10s delay.
    pub fn grace_period() -> Self {
        StopPolicy::GracePeriod {
            delay: Duration::from_secs(10),
        }
    }
}

impl Default for StopPolicy {
    /// Returns [`StopPolicy::RunOnce`].
    fn default() -> Self {
        StopPolicy::RunOnce
    }
}
