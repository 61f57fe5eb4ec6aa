//! # Periodic task registry.
//!
//! Append-only table of a tenant's periodic task specs. Entries are
//! registered once while the tenant bootstraps, before either control loop
//! starts, and are read-only afterwards.
//!
//! ## Rules
//! - Registration order is preserved; iteration yields entries in the order
//!   they were registered.
//! - There is no remove operation.
//! - The registry is never persisted: it is rebuilt from the tenant's
//!   schedule descriptor on every process start.
//! - Not thread-safe by design: registration happens on one thread during
//!   startup, so no locking is carried into the steady state.

use crate::cron::CronSpec;

/// One periodic task: a cron predicate plus the command it fires.
#[derive(Debug, Clone)]
pub struct PeriodicTask {
    /// Dotted command path invoked when the spec matches.
    pub command: String,
    /// When to fire.
    pub cron: CronSpec,
}

impl PeriodicTask {
    pub fn new(command: impl Into<String>, cron: CronSpec) -> Self {
        Self {
            command: command.into(),
            cron,
        }
    }

    /// Final segment of the dotted command path, used as the task label.
    pub fn label(&self) -> &str {
        self.command.rsplit('.').next().unwrap_or(&self.command)
    }
}

/// Append-only table of periodic task specs.
#[derive(Debug, Default)]
pub struct PeriodicRegistry {
    entries: Vec<PeriodicTask>,
}

impl PeriodicRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry. Order of registration is the order of iteration.
    pub fn register(&mut self, task: PeriodicTask) {
        self.entries.push(task);
    }

    /// All entries in registration order.
    pub fn all(&self) -> &[PeriodicTask] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
