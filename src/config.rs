//! # Global runtime configuration.
//!
//! [`Config`] centralizes the knobs of both control loops. It is built once
//! in the binary from CLI flags and defaults, and never mutated afterwards.
//!
//! ## Field semantics
//! - `consumers`: hard cap on concurrently active consumer slots.
//! - `tick`: dispatcher reap/fill period.
//! - `watchdog_ceiling`: longest a worker may run before being force-killed.
//! - `stop_policy`: when a claimed worker is told to stop.
//! - `periodic`: whether the scheduler loop runs at all.
//! - `scheduler_interval`: scheduler wake-up period in seconds; clamped to
//!   60 by the scheduler itself.
//! - `utc`: evaluate cron predicates in UTC (`true`) or local time.

use std::time::Duration;

use crate::policies::StopPolicy;

/// Global configuration for the dispatcher and scheduler runtime.
#[derive(Clone, Debug)]
pub struct Config {
    /// Maximum number of simultaneously active consumer slots.
    pub consumers: usize,

    /// Dispatcher tick period (reap + fill).
    pub tick: Duration,

    /// Hard ceiling on worker runtime before the watchdog force-kills it.
    pub watchdog_ceiling: Duration,

    /// Stopping policy applied to every consumer slot.
    pub stop_policy: StopPolicy,

    /// Whether the periodic scheduler loop is enabled.
    pub periodic: bool,

    /// Scheduler wake-up interval, seconds.
    pub scheduler_interval: u64,

    /// Evaluate cron predicates in UTC instead of local time.
    pub utc: bool,

    /// Event bus ring buffer capacity.
    pub bus_capacity: usize,
}

impl Config {
    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `consumers = 1`
    /// - `tick = 500ms`
    /// - `watchdog_ceiling = 15min`
    /// - `stop_policy = RunOnce`
    /// - `periodic = false`
    /// - `scheduler_interval = 60s`
    /// - `utc = true`
    /// - `bus_capacity = 1024`
    fn default() -> Self {
        Self {
            consumers: 1,
            tick: Duration::from_millis(500),
            watchdog_ceiling: Duration::from_secs(15 * 60),
            stop_policy: StopPolicy::RunOnce,
            periodic: false,
            scheduler_interval: 60,
            utc: true,
            bus_capacity: 1024,
        }
    }
}
