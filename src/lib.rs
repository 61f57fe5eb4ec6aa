//! # queuevisor
//!
//! **Queuevisor** lets many independent tenant applications, each owning
//! its own task queue in a shared key-value store, share a bounded pool of
//! worker execution slots on one host.
//!
//! It never executes tasks itself: it decides *when* and *how many* worker
//! subprocesses run, and monitors their liveness.
//!
//! ## Architecture
//! ```text
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │ TenantConfig │   │ TenantConfig │   │ TenantConfig │
//!     │  (shop.conf) │   │  (blog.conf) │   │   (crm.conf) │
//!     └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!            ▼                  ▼                  ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  TenantInstance (one per section)                                 │
//! │  - RedisQueue (pending tasks, worker events)                      │
//! │  - PeriodicRegistry (from schedule descriptor, via bootstrap)     │
//! │  - execute_command() → ProcessHandle                              │
//! └──────┬──────────────────────────────────────────────────┬─────────┘
//!        ▼                                                  ▼
//! ┌──────────────────────────────┐      ┌──────────────────────────────┐
//! │  Dispatcher (control loop)   │      │  PeriodicScheduler (loop)    │
//! │  - rotation fairness         │      │  - drift-corrected timer     │
//! │  - capacity cap (consumers)  │      │  - CronSpec evaluation       │
//! │  - ConsumerSlot reaping      │      │  - direct queue enqueue      │
//! └──────┬───────────────────────┘      └──────────────┬───────────────┘
//!        ▼                                             │
//!   ConsumerSlot × N  (one claimed task id,            │
//!        │             one worker subprocess,          │
//!        │             StopPolicy + watchdog)          │
//!        ▼                                             ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │            external queue backend (redis, per tenant)             │
//! └───────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The two control loops share no mutable state; their only common ground
//! is the queue backend. Both publish lifecycle [`Event`]s to a broadcast
//! [`Bus`] for logging and tests.
//!
//! ## Example
//! ```no_run
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//! use queuevisor::{
//!     Bus, Config, Dispatcher, PeriodicScheduler, SystemClock,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let cfg = Config { consumers: 4, periodic: true, ..Config::default() };
//!     let bus = Bus::new(cfg.bus_capacity_clamped());
//!     queuevisor::events::spawn_event_logger(&bus);
//!
//!     let tenants = queuevisor::tenant::load_all("conf".as_ref(), &bus).await?;
//!
//!     let token = CancellationToken::new();
//!     if cfg.periodic {
//!         let scheduler = PeriodicScheduler::new(
//!             tenants.clone(),
//!             cfg.scheduler_interval,
//!             cfg.utc,
//!             Arc::new(SystemClock),
//!             bus.clone(),
//!         );
//!         tokio::spawn(scheduler.run(token.clone()));
//!     }
//!
//!     let mut dispatcher = Dispatcher::new(cfg, tenants, bus);
//!     dispatcher.run().await?;
//!     token.cancel();
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod cron;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod policies;
pub mod process;
pub mod queue;
pub mod registry;
pub mod scheduler;
pub mod shutdown;
pub mod tenant;

// ---- Public re-exports ----

pub use config::Config;
pub use cron::{CronField, CronSpec};
pub use dispatcher::{ConsumerSlot, Dispatcher};
pub use error::{CodecError, ConfigError, QueueError, RuntimeError, SpawnError};
pub use events::{Bus, Event, EventKind};
pub use policies::StopPolicy;
pub use process::{PollState, ProcessHandle, StopSignal};
pub use queue::{MessageArity, QueueBackend, RedisQueue, TaskMessage, WorkerEvent};
pub use registry::{PeriodicRegistry, PeriodicTask};
pub use scheduler::{Clock, PeriodicScheduler, SystemClock, TickOutcome};
pub use tenant::{TenantConfig, TenantInstance, WorkerType};
