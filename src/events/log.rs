//! Bus-to-tracing bridge.
//!
//! The binary spawns one listener that renders every bus event through
//! `tracing`, so operators get a single consistent log stream regardless of
//! which loop produced the event.

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{Bus, Event, EventKind};

/// Subscribes to the bus and logs events until the bus is dropped.
///
/// Lag is tolerated: the listener notes how many events it skipped and keeps
/// going. It never blocks a publisher.
pub fn spawn_event_logger(bus: &Bus) -> JoinHandle<()> {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(ev) => log_event(&ev),
                Err(RecvError::Lagged(n)) => debug!(skipped = n, "event logger lagged"),
                Err(RecvError::Closed) => break,
            }
        }
    })
}

fn log_event(ev: &Event) {
    let tenant = ev.tenant.as_deref().unwrap_or("-");
    let task = ev.task.as_deref().unwrap_or("-");
    match ev.kind {
        EventKind::TenantLoaded => info!(tenant, "tenant loaded"),
        EventKind::SlotSpawned => info!(tenant, task, "consumer slot spawned"),
        EventKind::SlotReaped => debug!(tenant, task, code = ?ev.code, "consumer slot reaped"),
        EventKind::WatchdogKilled => warn!(tenant, task, "watchdog killed long-running worker"),
        EventKind::StopSignaled => {
            debug!(tenant, task, reason = ev.reason.as_deref(), "stop signal sent")
        }
        EventKind::MessageRejected => {
            warn!(tenant, reason = ev.reason.as_deref(), "queue message rejected")
        }
        EventKind::PeriodicEnqueued => info!(tenant, task, "periodic task enqueued"),
        EventKind::TickSkipped => warn!("scheduler tick skipped"),
        EventKind::ShutdownRequested => info!("shutdown requested"),
    }
}
