//! # Consumer slot: one claimed task, one worker subprocess.
//!
//! A [`ConsumerSlot`] is created when the dispatcher claims a pending task
//! and destroyed when the worker exits or is force-killed. It owns:
//!
//! - the worker [`ProcessHandle`];
//! - an optional stop timer task, per [`StopPolicy`], cancelled on drop;
//! - the watchdog overlay checked on every poll.
//!
//! ## Rules
//! - The stop timer holds only the worker's pid, never the handle; polling
//!   and signaling from the timer can therefore never contend with the
//!   reaper.
//! - A worker past the hard ceiling is force-killed once; the slot keeps
//!   reporting `Running` until the OS reaps the process, and a later reap
//!   pass drops it. The start timestamp is never reset.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::error::SpawnError;
use crate::events::{Bus, Event, EventKind};
use crate::policies::StopPolicy;
use crate::process::{signal_pid, PollState, ProcessHandle, StopSignal};
use crate::queue::WorkerEvent;
use crate::tenant::TenantInstance;

/// Binding between one claimed task id and its running worker.
pub struct ConsumerSlot {
    task_id: String,
    tenant: Arc<TenantInstance>,
    handle: ProcessHandle,
    started_at: Instant,
    ceiling: Duration,
    bus: Bus,
    stopper: Option<CancellationToken>,
    watchdog_fired: bool,
}

impl std::fmt::Debug for ConsumerSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsumerSlot")
            .field("task_id", &self.task_id)
            .field("started_at", &self.started_at)
            .field("ceiling", &self.ceiling)
            .field("watchdog_fired", &self.watchdog_fired)
            .finish_non_exhaustive()
    }
}

impl ConsumerSlot {
    /// Claims `task_id` for `tenant`: spawns a worker parameterized by the
    /// tenant's worker count and type, and arms the stop timer the policy
    /// asks for.
    pub async fn claim(
        tenant: Arc<TenantInstance>,
        task_id: String,
        policy: StopPolicy,
        ceiling: Duration,
        bus: Bus,
    ) -> Result<Self, SpawnError> {
        let handle = tenant.execute_command(&tenant.worker_command())?;
        bus.publish(
            Event::now(EventKind::SlotSpawned)
                .with_tenant(tenant.name())
                .with_task(task_id.as_str()),
        );

        let stopper = match (policy, handle.id()) {
            (StopPolicy::RunOnce, _) | (_, None) => None,
            (StopPolicy::GracePeriod { delay }, Some(pid)) => Some(spawn_grace_timer(
                pid,
                delay,
                StopContext::new(&tenant, &task_id, &bus),
            )),
            (StopPolicy::UntilIdle { idle, cap }, Some(pid)) => {
                match tenant.queue().worker_events().await {
                    Ok(events) => Some(spawn_idle_timer(
                        pid,
                        idle,
                        cap,
                        events,
                        StopContext::new(&tenant, &task_id, &bus),
                    )),
                    Err(err) => {
                        // No liveness signal available; the hard cap still
                        // bounds the drain window.
                        warn!(
                            tenant = %tenant.name(),
                            error = %err,
                            "worker event channel unavailable, falling back to hard cap"
                        );
                        Some(spawn_grace_timer(
                            pid,
                            cap,
                            StopContext::new(&tenant, &task_id, &bus),
                        ))
                    }
                }
            }
        };

        Ok(Self {
            task_id,
            tenant,
            handle,
            started_at: Instant::now(),
            ceiling,
            bus,
            stopper,
            watchdog_fired: false,
        })
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    pub fn tenant_name(&self) -> &str {
        self.tenant.name()
    }

    /// Argument vector the worker was spawned with.
    pub fn argv(&self) -> &[String] {
        self.handle.argv()
    }

    /// Worker pid, while the process is alive.
    pub fn pid(&self) -> Option<u32> {
        self.handle.id()
    }

    /// Non-blocking liveness check with the watchdog overlaid: a worker
    /// running past the ceiling is force-killed (once).
    pub fn poll(&mut self) -> PollState {
        match self.handle.poll() {
            PollState::Exited(code) => PollState::Exited(code),
            PollState::Running => {
                if !self.watchdog_fired && self.started_at.elapsed() > self.ceiling {
                    self.watchdog_fired = true;
                    warn!(
                        tenant = %self.tenant.name(),
                        task = %self.task_id,
                        ceiling = ?self.ceiling,
                        "worker exceeded hard ceiling, force-killing"
                    );
                    self.handle.signal(StopSignal::Kill);
                    self.bus.publish(
                        Event::now(EventKind::WatchdogKilled)
                            .with_tenant(self.tenant.name())
                            .with_task(self.task_id.as_str()),
                    );
                }
                PollState::Running
            }
        }
    }

    pub fn is_running(&mut self) -> bool {
        matches!(self.poll(), PollState::Running)
    }
}

impl Drop for ConsumerSlot {
    fn drop(&mut self) {
        if let Some(token) = &self.stopper {
            token.cancel();
        }
    }
}

/// Everything a stop timer needs to report what it did.
struct StopContext {
    tenant: Arc<str>,
    task_id: Arc<str>,
    bus: Bus,
}

impl StopContext {
    fn new(tenant: &Arc<TenantInstance>, task_id: &str, bus: &Bus) -> Self {
        Self {
            tenant: Arc::from(tenant.name()),
            task_id: Arc::from(task_id),
            bus: bus.clone(),
        }
    }

    fn signaled(&self, reason: &'static str) {
        self.bus.publish(
            Event::now(EventKind::StopSignaled)
                .with_tenant(Arc::clone(&self.tenant))
                .with_task(Arc::clone(&self.task_id))
                .with_reason(reason),
        );
    }
}

/// Interrupts the worker after a fixed delay, unless cancelled first.
fn spawn_grace_timer(pid: u32, delay: Duration, ctx: StopContext) -> CancellationToken {
    let token = CancellationToken::new();
    let child = token.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = child.cancelled() => {}
            _ = tokio::time::sleep(delay) => {
                signal_pid(pid, StopSignal::Interrupt);
                ctx.signaled("grace-elapsed");
            }
        }
    });
    token
}

/// Interrupts the worker once its event channel has been quiet for `idle`,
/// or after `cap` in total, whichever comes first.
fn spawn_idle_timer(
    pid: u32,
    idle: Duration,
    cap: Duration,
    mut events: broadcast::Receiver<WorkerEvent>,
    ctx: StopContext,
) -> CancellationToken {
    let token = CancellationToken::new();
    let child = token.clone();
    tokio::spawn(async move {
        let deadline = tokio::time::sleep(cap);
        tokio::pin!(deadline);
        let reason = loop {
            tokio::select! {
                _ = child.cancelled() => return,
                _ = &mut deadline => break "hard-cap",
                recv = tokio::time::timeout(idle, events.recv()) => match recv {
                    // Any event counts as activity; lag means there was
                    // plenty of it.
                    Ok(Ok(_)) | Ok(Err(broadcast::error::RecvError::Lagged(_))) => continue,
                    Ok(Err(broadcast::error::RecvError::Closed)) => break "events-closed",
                    Err(_) => break "idle-timeout",
                },
            }
        };
        signal_pid(pid, StopSignal::Interrupt);
        ctx.signaled(reason);
    });
    token
}
