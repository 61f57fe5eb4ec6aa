//! # Dispatcher: the main control loop.
//!
//! Polls tenant queues, claims pending tasks into consumer slots, caps the
//! number of concurrently running workers, and reaps finished ones.
//!
//! ## Invariants
//! - Active slots never exceed `Config::consumers`.
//! - No two active slots share a task id.
//! - After a tenant yields one claim it rotates to the back of the order
//!   before any tenant is checked again, so a fill cycle serves tenants
//!   round-robin.
//!
//! ## Failure containment
//! Queue errors, undecodable messages, and spawn failures are logged and
//! cost the affected tenant (or message) its turn; the loop keeps running.
//! An interrupt signal stops the loop without waiting for or killing
//! already-spawned workers: outstanding work is allowed to finish or
//! orphan rather than be torn down mid-task.

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::RuntimeError;
use crate::events::{Bus, Event, EventKind};
use crate::process::PollState;
use crate::queue::TaskMessage;
use crate::shutdown;
use crate::tenant::TenantInstance;

use super::slot::ConsumerSlot;

/// Main control loop state: tenant rotation, active slots, capacity.
pub struct Dispatcher {
    cfg: Config,
    /// Rotation order; the front tenant is offered the next claim.
    tenants: Vec<Arc<TenantInstance>>,
    slots: Vec<ConsumerSlot>,
    bus: Bus,
}

impl Dispatcher {
    pub fn new(cfg: Config, tenants: Vec<Arc<TenantInstance>>, bus: Bus) -> Self {
        info!(
            consumers = cfg.consumers,
            tenants = tenants.len(),
            tick = ?cfg.tick,
            "init dispatcher"
        );
        Self {
            cfg,
            tenants,
            slots: Vec::new(),
            bus,
        }
    }

    /// Number of currently active consumer slots.
    pub fn active(&self) -> usize {
        self.slots.len()
    }

    /// Task ids of the active slots, in claim order.
    pub fn claimed_ids(&self) -> Vec<&str> {
        self.slots.iter().map(|s| s.task_id()).collect()
    }

    fn is_claimed(&self, task_id: &str) -> bool {
        self.slots.iter().any(|s| s.task_id() == task_id)
    }

    /// Drops every slot whose worker has exited.
    pub fn reap(&mut self) {
        let mut kept = Vec::with_capacity(self.slots.len());
        for mut slot in self.slots.drain(..) {
            match slot.poll() {
                PollState::Running => kept.push(slot),
                PollState::Exited(code) => {
                    let mut ev = Event::now(EventKind::SlotReaped)
                        .with_tenant(slot.tenant_name())
                        .with_task(slot.task_id());
                    if let Some(code) = code {
                        ev = ev.with_code(code);
                    }
                    self.bus.publish(ev);
                }
            }
        }
        self.slots = kept;
    }

    /// Attempts one claim: scans tenants in rotation order and consumes the
    /// first pending task whose id is not already claimed. Returns whether
    /// anything was claimed.
    async fn claim_one(&mut self) -> bool {
        for idx in 0..self.tenants.len() {
            let tenant = Arc::clone(&self.tenants[idx]);
            let pending = match tenant.pending_tasks().await {
                Ok(pending) => pending,
                Err(err) => {
                    warn!(tenant = %tenant.name(), error = %err, "failed to list pending tasks");
                    continue;
                }
            };
            for raw in pending {
                let msg = match TaskMessage::decode(&raw) {
                    Ok(msg) => msg,
                    Err(err) => {
                        warn!(tenant = %tenant.name(), error = %err, "rejected queue message");
                        self.bus.publish(
                            Event::now(EventKind::MessageRejected)
                                .with_tenant(tenant.name())
                                .with_reason(err.as_label()),
                        );
                        continue;
                    }
                };
                if self.is_claimed(msg.id()) {
                    continue;
                }
                match ConsumerSlot::claim(
                    Arc::clone(&tenant),
                    msg.id().to_string(),
                    self.cfg.stop_policy,
                    self.cfg.watchdog_ceiling,
                    self.bus.clone(),
                )
                .await
                {
                    Ok(slot) => {
                        info!(
                            tenant = %tenant.name(),
                            task = msg.id(),
                            label = msg.label(),
                            "consume task"
                        );
                        self.slots.push(slot);
                        let rotated = self.tenants.remove(idx);
                        self.tenants.push(rotated);
                        return true;
                    }
                    Err(err) => {
                        // This tenant yields no slot this cycle; the next
                        // tenant still gets its turn.
                        error!(tenant = %tenant.name(), error = %err, "failed to spawn worker");
                        break;
                    }
                }
            }
        }
        false
    }

    /// Brings the active slot count up to capacity, one claim at a time,
    /// stopping early when a full pass over the tenants yields nothing.
    pub async fn fill(&mut self) {
        let mut consumed = true;
        while self.slots.len() < self.cfg.consumers && consumed {
            consumed = self.claim_one().await;
        }
    }

    /// One reap + fill pass.
    pub async fn tick(&mut self) {
        self.reap();
        self.fill().await;
    }

    /// Runs until a termination signal arrives.
    ///
    /// Returning does not tear down spawned workers; they finish on their
    /// own or orphan.
    pub async fn run(&mut self) -> Result<(), RuntimeError> {
        info!("start dispatcher");
        loop {
            tokio::select! {
                signal = shutdown::wait_for_shutdown_signal() => {
                    let signal = signal?;
                    self.bus.publish(Event::now(EventKind::ShutdownRequested));
                    info!(signal, outstanding = self.slots.len(), "leaving workers to finish");
                    return Ok(());
                }
                _ = tokio::time::sleep(self.cfg.tick) => {
                    self.tick().await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policies::StopPolicy;
    use crate::queue::memory::MemoryQueue;
    use crate::tenant::TenantConfig;
    use serde_json::json;
    use std::collections::HashMap;
    use std::path::Path;
    use std::time::{Duration, Instant};

    fn raw_message(id: &str) -> Vec<u8> {
        serde_json::to_vec(&json!([id, "app.tasks.job", [[], {}], null, 0, 0])).unwrap()
    }

    fn tenant_with_queue(
        name: &str,
        executable: &str,
        script_dir: &Path,
    ) -> (Arc<TenantInstance>, Arc<MemoryQueue>) {
        let mut keys = HashMap::new();
        keys.insert("python".to_string(), executable.to_string());
        keys.insert(
            "script".to_string(),
            script_dir.join("entry").display().to_string(),
        );
        keys.insert("workers".to_string(), "2".to_string());
        keys.insert("worker-type".to_string(), "thread".to_string());
        let cfg = TenantConfig::from_section(name, &keys).unwrap();
        let queue = Arc::new(MemoryQueue::new(name));
        (
            Arc::new(TenantInstance::new(cfg, queue.clone())),
            queue,
        )
    }

    fn dispatcher(consumers: usize, tenants: Vec<Arc<TenantInstance>>) -> Dispatcher {
        let cfg = Config {
            consumers,
            stop_policy: StopPolicy::RunOnce,
            ..Config::default()
        };
        Dispatcher::new(cfg, tenants, Bus::new(64))
    }

    async fn wait_all_reaped(d: &mut Dispatcher, within: Duration) {
        let deadline = Instant::now() + within;
        while Instant::now() < deadline {
            d.reap();
            if d.active() == 0 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        panic!("slots did not drain in time");
    }

    #[tokio::test]
    async fn test_capacity_is_never_exceeded() {
        let dir = tempfile::tempdir().unwrap();
        let (tenant, queue) = tenant_with_queue("shop", "/usr/bin/env", dir.path());
        for i in 0..5 {
            queue.push(raw_message(&format!("task-{i}")));
        }
        let mut d = dispatcher(2, vec![tenant]);
        d.fill().await;
        assert_eq!(d.active(), 2);

        // A second fill against the same state claims nothing new.
        d.fill().await;
        assert_eq!(d.active(), 2);
    }

    #[tokio::test]
    async fn test_task_id_never_double_claimed() {
        let dir = tempfile::tempdir().unwrap();
        let (tenant, queue) = tenant_with_queue("shop", "/usr/bin/env", dir.path());
        queue.push(raw_message("dup"));
        queue.push(raw_message("dup"));
        queue.push(raw_message("other"));
        let mut d = dispatcher(4, vec![tenant]);
        d.fill().await;
        let mut ids = d.claimed_ids();
        ids.sort();
        assert_eq!(ids, vec!["dup", "other"]);
    }

    #[tokio::test]
    async fn test_fill_interleaves_tenants_round_robin() {
        let dir = tempfile::tempdir().unwrap();
        let (a, qa) = tenant_with_queue("alpha", "/usr/bin/env", dir.path());
        let (b, qb) = tenant_with_queue("beta", "/usr/bin/env", dir.path());
        qa.push(raw_message("a-1"));
        qa.push(raw_message("a-2"));
        qb.push(raw_message("b-1"));
        qb.push(raw_message("b-2"));

        let mut d = dispatcher(4, vec![a, b]);
        d.fill().await;
        assert_eq!(d.claimed_ids(), vec!["a-1", "b-1", "a-2", "b-2"]);
    }

    #[tokio::test]
    async fn test_both_tenants_served_before_either_served_twice() {
        let dir = tempfile::tempdir().unwrap();
        let (a, qa) = tenant_with_queue("alpha", "/usr/bin/env", dir.path());
        let (b, qb) = tenant_with_queue("beta", "/usr/bin/env", dir.path());
        qa.push(raw_message("a-1"));
        qb.push(raw_message("b-1"));

        let mut d = dispatcher(1, vec![a, b]);
        d.fill().await;
        assert_eq!(d.claimed_ids(), vec!["a-1"]);

        // The worker drains its task and exits; the next cycle must serve
        // the other tenant.
        qa.take_front();
        assert_eq!(qa.len(), 0);
        wait_all_reaped(&mut d, Duration::from_secs(5)).await;
        d.tick().await;
        assert_eq!(d.claimed_ids(), vec!["b-1"]);
    }

    #[tokio::test]
    async fn test_fill_with_no_pending_is_a_noop() {
        let dir = tempfile::tempdir().unwrap();
        let (tenant, _queue) = tenant_with_queue("shop", "/usr/bin/env", dir.path());
        let mut d = dispatcher(3, vec![tenant]);
        d.fill().await;
        assert_eq!(d.active(), 0);
    }

    #[tokio::test]
    async fn test_single_pending_task_binds_one_slot() {
        let dir = tempfile::tempdir().unwrap();
        let (tenant, queue) = tenant_with_queue("shop", "/usr/bin/env", dir.path());
        queue.push(raw_message("abc123"));
        let mut d = dispatcher(4, vec![tenant]);
        d.fill().await;

        assert_eq!(d.claimed_ids(), vec!["abc123"]);
        let argv = d.slots[0].argv();
        assert_eq!(
            &argv[2..],
            ["execute_task", "--no-periodic", "-k", "thread", "-w", "2"]
        );
    }

    #[tokio::test]
    async fn test_undecodable_message_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let (tenant, queue) = tenant_with_queue("shop", "/usr/bin/env", dir.path());
        queue.push(b"not a message".to_vec());
        queue.push(raw_message("good"));

        let cfg = Config {
            consumers: 2,
            ..Config::default()
        };
        let bus = Bus::new(64);
        let mut rx = bus.subscribe();
        let mut d = Dispatcher::new(cfg, vec![tenant], bus);
        d.fill().await;

        assert_eq!(d.claimed_ids(), vec!["good"]);
        let mut rejected = false;
        while let Ok(ev) = rx.try_recv() {
            rejected |= ev.kind == EventKind::MessageRejected;
        }
        assert!(rejected);
    }

    #[tokio::test]
    async fn test_spawn_failure_does_not_kill_the_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let (bad, bad_queue) = tenant_with_queue("alpha", "/nonexistent/interpreter", dir.path());
        let (good, good_queue) = tenant_with_queue("beta", "/usr/bin/env", dir.path());
        bad_queue.push(raw_message("bad-1"));
        good_queue.push(raw_message("good-1"));

        let mut d = dispatcher(2, vec![bad, good]);
        d.fill().await;
        assert_eq!(d.claimed_ids(), vec!["good-1"]);
    }
}
