//! # Periodic scheduler: drift-corrected interval timer.
//!
//! Wakes up every `interval` seconds (clamped to 60), evaluates each
//! tenant's cron predicates once per minute boundary, and writes the due
//! tasks' message envelopes directly into the tenant queues. It never
//! executes anything itself; workers pick the messages up through the
//! normal dispatch path.
//!
//! ## Drift correction
//! The schedule is anchored to the previous target time, not to
//! wall-clock-at-invocation, so sleep jitter never accumulates. With
//! `q, r = divmod(60, interval)` a running remainder `cr` absorbs the
//! leftover seconds, which keeps the once-per-minute firing exact even
//! when `interval` does not evenly divide 60. A scheduler that finds its
//! next target already in the past skips the iteration entirely rather
//! than catching up by double-enqueuing.
//!
//! ```text
//! interval = 45 (q = 1, r = 15)
//!
//! wall:   0 ───── 45 ──(+15)── 60 ───── 90 ──(+30)── 120 ───── ...
//! tick:   idle    fire at 60          fire at 120              once per minute
//! ```
//!
//! Time flows through the [`Clock`] trait so tests can drive the loop with
//! a deterministic clock.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Local, TimeZone, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::events::{Bus, Event, EventKind};
use crate::queue::TaskMessage;
use crate::tenant::TenantInstance;

/// Time source for the scheduler loop.
#[async_trait]
pub trait Clock: Send + Sync + 'static {
    /// Seconds since the unix epoch.
    fn timestamp(&self) -> f64;

    /// Sleeps for the given duration.
    async fn sleep(&self, dur: Duration);
}

/// Wall clock backed by the tokio timer.
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn timestamp(&self) -> f64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0)
    }

    async fn sleep(&self, dur: Duration) {
        tokio::time::sleep(dur).await;
    }
}

/// What one scheduler iteration did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The loop was behind schedule and did no work.
    Skipped,
    /// Not a minute boundary; nothing was evaluated.
    Idle,
    /// Cron predicates were evaluated; this many tasks were enqueued.
    Fired(usize),
}

/// Independent control loop that enqueues due periodic tasks.
pub struct PeriodicScheduler {
    tenants: Vec<Arc<TenantInstance>>,
    clock: Arc<dyn Clock>,
    bus: Bus,
    /// Wake-up period, seconds; at most 60.
    interval: u64,
    /// Evaluate cron predicates in UTC instead of local time.
    utc: bool,

    /// 60 div interval.
    q: u64,
    /// 60 mod interval.
    r: u64,
    /// Running remainder of seconds carried toward the next minute.
    cr: u64,
    /// Iterations since the last minute boundary.
    counter: i64,
    /// Target start time of the next iteration.
    next_loop: f64,
}

impl PeriodicScheduler {
    pub fn new(
        tenants: Vec<Arc<TenantInstance>>,
        interval: u64,
        utc: bool,
        clock: Arc<dyn Clock>,
        bus: Bus,
    ) -> Self {
        let interval = interval.clamp(1, 60);
        let (q, r) = (60 / interval, 60 % interval);
        let next_loop = clock.timestamp();
        info!(interval, utc, "init scheduler");
        Self {
            tenants,
            clock,
            bus,
            interval,
            utc,
            q,
            r,
            cr: r,
            counter: 0,
            next_loop,
        }
    }

    /// Effective wake-up period after clamping.
    pub fn interval(&self) -> u64 {
        self.interval
    }

    /// Runs the loop until cancelled.
    pub async fn run(mut self, token: CancellationToken) {
        info!("start scheduler");
        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    info!("scheduler stopped");
                    return;
                }
                _ = self.tick() => {}
            }
        }
    }

    /// One iteration: advance the anchored target, fold the remainder, and
    /// on a minute boundary evaluate and enqueue due periodic tasks.
    pub async fn tick(&mut self) -> TickOutcome {
        let current = self.next_loop;
        self.next_loop += self.interval as f64;
        if self.next_loop < self.clock.timestamp() {
            // Behind schedule after a stall; doing the work now would
            // double-process the minute once the loop catches up.
            info!("scheduler skipping iteration to avoid race");
            self.bus.publish(Event::now(EventKind::TickSkipped));
            return TickOutcome::Skipped;
        }

        let mut outcome = TickOutcome::Idle;
        if self.counter >= self.q as i64 {
            self.counter = 0;
            if self.cr > 0 {
                self.sleep_anchored(current, self.cr as f64).await;
            }
            if self.r > 0 {
                self.cr += self.r;
                if self.cr >= self.interval {
                    self.cr -= self.interval;
                    self.counter -= 1;
                }
            }
            outcome = TickOutcome::Fired(self.enqueue_due().await);
        }
        self.counter += 1;

        self.sleep_anchored(current, self.interval as f64).await;
        outcome
    }

    /// Sleeps until `start + nseconds`, recomputing the remaining duration
    /// immediately before sleeping to absorb time spent on logging/work.
    async fn sleep_anchored(&self, start: f64, nseconds: f64) {
        let remaining = nseconds - (self.clock.timestamp() - start);
        if remaining <= 0.0 {
            return;
        }
        debug!(seconds = remaining, "scheduler sleeping");
        let remaining = nseconds - (self.clock.timestamp() - start);
        if remaining > 0.0 {
            self.clock.sleep(Duration::from_secs_f64(remaining)).await;
        }
    }

    /// Evaluates every tenant's periodic tasks against the current minute
    /// and enqueues the due ones. Returns how many were enqueued.
    async fn enqueue_due(&self) -> usize {
        let ts = self.clock.timestamp() as i64;
        if self.utc {
            match DateTime::<Utc>::from_timestamp(ts, 0) {
                Some(now) => self.enqueue_for(&now).await,
                None => 0,
            }
        } else {
            match Local.timestamp_opt(ts, 0).single() {
                Some(now) => self.enqueue_for(&now).await,
                None => 0,
            }
        }
    }

    async fn enqueue_for<Tz>(&self, now: &DateTime<Tz>) -> usize
    where
        Tz: TimeZone,
        Tz::Offset: Send + Sync,
    {
        let mut fired = 0;
        for tenant in &self.tenants {
            for task in tenant.periodic_due(now) {
                let msg = TaskMessage::periodic(&task.command);
                match tenant.queue().enqueue(msg.encode()).await {
                    Ok(()) => {
                        info!(
                            tenant = %tenant.name(),
                            task = task.label(),
                            "scheduling periodic task"
                        );
                        self.bus.publish(
                            Event::now(EventKind::PeriodicEnqueued)
                                .with_tenant(tenant.name())
                                .with_task(task.label()),
                        );
                        fired += 1;
                    }
                    Err(err) => {
                        warn!(
                            tenant = %tenant.name(),
                            task = task.label(),
                            error = %err,
                            "failed to enqueue periodic task"
                        );
                    }
                }
            }
        }
        fired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cron::CronSpec;
    use crate::error::QueueError;
    use crate::queue::{QueueBackend, WorkerEvent};
    use crate::registry::PeriodicTask;
    use crate::tenant::TenantConfig;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use tokio::sync::broadcast;

    /// Deterministic clock: `sleep` advances time instead of waiting.
    struct ManualClock {
        now: Mutex<f64>,
    }

    impl ManualClock {
        fn new(start: f64) -> Self {
            Self {
                now: Mutex::new(start),
            }
        }

        fn set(&self, ts: f64) {
            *self.now.lock().unwrap() = ts;
        }
    }

    #[async_trait]
    impl Clock for ManualClock {
        fn timestamp(&self) -> f64 {
            *self.now.lock().unwrap()
        }

        async fn sleep(&self, dur: Duration) {
            *self.now.lock().unwrap() += dur.as_secs_f64();
        }
    }

    /// Queue double that stamps each enqueue with the clock's time.
    struct RecordingQueue {
        clock: Arc<ManualClock>,
        stamps: Mutex<Vec<f64>>,
    }

    #[async_trait]
    impl QueueBackend for RecordingQueue {
        async fn enqueued_items(&self) -> Result<Vec<Vec<u8>>, QueueError> {
            Ok(Vec::new())
        }

        async fn enqueue(&self, _raw: Vec<u8>) -> Result<(), QueueError> {
            self.stamps.lock().unwrap().push(self.clock.timestamp());
            Ok(())
        }

        async fn worker_events(&self) -> Result<broadcast::Receiver<WorkerEvent>, QueueError> {
            Ok(broadcast::channel(1).1)
        }

        fn name(&self) -> &str {
            "recording"
        }
    }

    fn every_minute_tenant(clock: &Arc<ManualClock>) -> (Arc<TenantInstance>, Arc<RecordingQueue>) {
        let mut keys = HashMap::new();
        keys.insert("python".to_string(), "/usr/bin/env".to_string());
        keys.insert("script".to_string(), "/srv/app/manage.py".to_string());
        let cfg = TenantConfig::from_section("app", &keys).unwrap();
        let queue = Arc::new(RecordingQueue {
            clock: Arc::clone(clock),
            stamps: Mutex::new(Vec::new()),
        });
        let mut instance = TenantInstance::new(cfg, queue.clone());
        instance.register_periodic(PeriodicTask::new(
            "app.tasks.every_minute",
            CronSpec::every_minute(),
        ));
        (Arc::new(instance), queue)
    }

    #[tokio::test]
    async fn test_interval_45_fires_exactly_once_per_minute() {
        let clock = Arc::new(ManualClock::new(0.0));
        let (tenant, queue) = every_minute_tenant(&clock);
        let mut scheduler = PeriodicScheduler::new(
            vec![tenant],
            45,
            true,
            clock.clone(),
            Bus::new(64),
        );

        while clock.timestamp() < 601.0 {
            scheduler.tick().await;
        }

        let stamps: Vec<i64> = queue
            .stamps
            .lock()
            .unwrap()
            .iter()
            .map(|t| t.round() as i64)
            .collect();
        let expected: Vec<i64> = (1..=10).map(|m| m * 60).collect();
        assert_eq!(stamps, expected, "one firing per 60s window, on the minute");
    }

    #[tokio::test]
    async fn test_interval_60_fires_once_per_minute() {
        let clock = Arc::new(ManualClock::new(0.0));
        let (tenant, queue) = every_minute_tenant(&clock);
        let mut scheduler = PeriodicScheduler::new(
            vec![tenant],
            60,
            true,
            clock.clone(),
            Bus::new(64),
        );

        while clock.timestamp() < 301.0 {
            scheduler.tick().await;
        }

        let stamps: Vec<i64> = queue
            .stamps
            .lock()
            .unwrap()
            .iter()
            .map(|t| t.round() as i64)
            .collect();
        assert_eq!(stamps, vec![60, 120, 180, 240, 300]);
    }

    #[tokio::test]
    async fn test_interval_is_clamped_to_sixty() {
        let clock = Arc::new(ManualClock::new(0.0));
        let (tenant, _queue) = every_minute_tenant(&clock);
        let scheduler =
            PeriodicScheduler::new(vec![tenant], 3600, true, clock, Bus::new(64));
        assert_eq!(scheduler.interval(), 60);
    }

    #[tokio::test]
    async fn test_behind_schedule_skips_instead_of_catching_up() {
        let clock = Arc::new(ManualClock::new(0.0));
        let (tenant, queue) = every_minute_tenant(&clock);
        let mut scheduler = PeriodicScheduler::new(
            vec![tenant],
            45,
            true,
            clock.clone(),
            Bus::new(64),
        );

        // The process stalled well past the next target.
        clock.set(500.0);
        assert_eq!(scheduler.tick().await, TickOutcome::Skipped);
        assert!(queue.stamps.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_only_due_tasks_are_enqueued() {
        let clock = Arc::new(ManualClock::new(0.0));
        let mut keys = HashMap::new();
        keys.insert("python".to_string(), "/usr/bin/env".to_string());
        keys.insert("script".to_string(), "/srv/app/manage.py".to_string());
        let cfg = TenantConfig::from_section("app", &keys).unwrap();
        let queue = Arc::new(RecordingQueue {
            clock: Arc::clone(&clock),
            stamps: Mutex::new(Vec::new()),
        });
        let mut instance = TenantInstance::new(cfg, queue.clone());
        // Fires only on minute 30 of each hour; the simulated run stays
        // inside minutes 0..10 of hour zero and must never hit it.
        instance.register_periodic(PeriodicTask::new(
            "app.tasks.half_past",
            CronSpec::parse("30", "*", "*", "*", "*"),
        ));
        let mut scheduler = PeriodicScheduler::new(
            vec![Arc::new(instance)],
            60,
            true,
            clock.clone(),
            Bus::new(64),
        );

        while clock.timestamp() < 301.0 {
            scheduler.tick().await;
        }
        assert!(queue.stamps.lock().unwrap().is_empty());
    }
}
