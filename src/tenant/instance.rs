//! # Runtime tenant instance.
//!
//! [`TenantInstance`] binds a [`TenantConfig`] to its queue backend and
//! periodic task registry, and is the sole mechanism by which the core
//! causes tenant-side work to happen: every subprocess (bootstrap, worker)
//! goes through [`TenantInstance::execute_command`].
//!
//! ## Rules
//! - `bootstrap_periodic` runs once, before the control loops start; it is
//!   the only place the registry is written.
//! - A missing schedule descriptor means zero periodic tasks, not an error.
//! - Bootstrap polls the subprocess without a timeout: a hanging bootstrap
//!   command blocks that tenant's startup, which is accepted.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone};
use tracing::{debug, info, warn};

use crate::error::{QueueError, SpawnError};
use crate::process::{PollState, ProcessHandle};
use crate::queue::QueueBackend;
use crate::registry::{PeriodicRegistry, PeriodicTask};

use super::config::TenantConfig;
use super::schedule::parse_schedule;

/// Poll period while waiting for the bootstrap command to exit.
const BOOTSTRAP_POLL: Duration = Duration::from_millis(500);

/// Tenant-side command that writes the schedule descriptor.
const BOOTSTRAP_COMMAND: &str = "makeschedule";

/// One configured tenant: queue access, periodic tasks, worker spawning.
pub struct TenantInstance {
    config: TenantConfig,
    queue: Arc<dyn QueueBackend>,
    periodic: PeriodicRegistry,
}

impl TenantInstance {
    pub fn new(config: TenantConfig, queue: Arc<dyn QueueBackend>) -> Self {
        info!(
            tenant = %config.name,
            workers = config.workers,
            worker_type = config.worker_type.as_str(),
            "registered tenant"
        );
        Self {
            config,
            queue,
            periodic: PeriodicRegistry::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &TenantConfig {
        &self.config
    }

    pub fn queue(&self) -> &Arc<dyn QueueBackend> {
        &self.queue
    }

    /// Registers one periodic task. Only valid during single-threaded
    /// startup; the registry is read-only once the loops run.
    pub fn register_periodic(&mut self, task: PeriodicTask) {
        self.periodic.register(task);
    }

    /// All registered periodic tasks, in registration order.
    pub fn periodic_tasks(&self) -> &[PeriodicTask] {
        self.periodic.all()
    }

    /// Runs the tenant's bootstrap command and loads the schedule
    /// descriptor it produces.
    ///
    /// Never fails: a bootstrap that cannot spawn, or a descriptor that is
    /// absent, leaves the tenant with zero periodic tasks.
    pub async fn bootstrap_periodic(&mut self) {
        match self.execute_command(BOOTSTRAP_COMMAND) {
            Ok(mut process) => {
                while matches!(process.poll(), PollState::Running) {
                    tokio::time::sleep(BOOTSTRAP_POLL).await;
                }
            }
            Err(err) => {
                warn!(tenant = %self.name(), error = %err, "schedule bootstrap failed to spawn");
                return;
            }
        }

        let path = self.config.schedule_file();
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(_) => {
                debug!(tenant = %self.name(), path = %path.display(), "schedule descriptor not found");
                return;
            }
        };

        for task in parse_schedule(&text, self.name()) {
            self.periodic.register(task);
        }
        if self.periodic.is_empty() {
            info!(tenant = %self.name(), "no periodic task found");
        }
    }

    /// Currently enqueued raw messages, oldest first.
    pub async fn pending_tasks(&self) -> Result<Vec<Vec<u8>>, QueueError> {
        self.queue.enqueued_items().await
    }

    /// Periodic tasks due at `now`.
    pub fn periodic_due<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Vec<&PeriodicTask> {
        self.periodic
            .all()
            .iter()
            .filter(|task| task.cron.matches(now))
            .collect()
    }

    /// Spawns the tenant's entry script with the given command line:
    /// `[executable, entry_script, ...split(command_line)]`, plus
    /// `--settings <ref>` when configured.
    pub fn execute_command(&self, command_line: &str) -> Result<ProcessHandle, SpawnError> {
        let mut args: Vec<String> = vec![self.config.entry_script.display().to_string()];
        args.extend(command_line.split_whitespace().map(str::to_string));
        if let Some(settings) = &self.config.settings {
            args.push("--settings".to_string());
            args.push(settings.clone());
        }

        let program = self.config.executable.display().to_string();
        let handle = ProcessHandle::spawn(&program, &args)?;
        info!(
            tenant = %self.name(),
            pid = ?handle.id(),
            command = command_line,
            "spawned tenant process"
        );
        Ok(handle)
    }

    /// Command line that runs one batch of this tenant's workers.
    pub fn worker_command(&self) -> String {
        format!(
            "execute_task --no-periodic -k {} -w {}",
            self.config.worker_type.as_str(),
            self.config.workers
        )
    }
}
