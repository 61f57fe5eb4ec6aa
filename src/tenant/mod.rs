//! Tenant applications: configuration, bootstrap, and queue access.
//!
//! A tenant is one independently configured application with its own queue
//! and worker executable. This module owns:
//!
//! - [`TenantConfig`] — the immutable per-tenant settings, parsed from an
//!   INI-like `.conf` section.
//! - [`TenantInstance`] — the runtime object: queue handle, periodic task
//!   registry, and subprocess launching.
//! - [`load_all`] — discovery plus bounded-parallel bootstrap of every
//!   configured tenant.
//!
//! Bootstrap blocks on each tenant's schedule-producing subprocess, so
//! startup fans out across at most [`BOOTSTRAP_CONCURRENCY`] concurrent
//! loads instead of serializing N tenants' bootstrap latency.

mod config;
mod instance;
mod schedule;

use std::path::Path;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info};

use crate::error::ConfigError;
use crate::events::{Bus, Event, EventKind};
use crate::queue::RedisQueue;

pub use config::{TenantConfig, WorkerType, FALLBACK_CONF_DIR};
pub use instance::TenantInstance;

/// Upper bound on concurrently bootstrapping tenants.
const BOOTSTRAP_CONCURRENCY: usize = 16;

/// Discovers, parses, and bootstraps every configured tenant.
///
/// Per-section failures (unparseable config, unreachable queue) are logged
/// and skipped; only an entirely empty result is fatal. The returned list
/// is sorted by tenant name so the dispatcher's initial rotation order is
/// deterministic.
pub async fn load_all(conf_dir: &Path, bus: &Bus) -> Result<Vec<Arc<TenantInstance>>, ConfigError> {
    let dir = config::resolve_conf_dir(conf_dir)?;
    let files = config::discover_files(&dir)?;
    info!(dir = %dir.display(), files = files.len(), "loading tenant configuration");

    let semaphore = Arc::new(Semaphore::new(BOOTSTRAP_CONCURRENCY));
    let mut set = JoinSet::new();
    for path in files {
        let semaphore = Arc::clone(&semaphore);
        let bus = bus.clone();
        set.spawn(async move {
            let _permit = semaphore.acquire_owned().await.ok()?;
            Some(load_file(&path, &bus).await)
        });
    }

    let mut tenants: Vec<TenantInstance> = Vec::new();
    while let Some(res) = set.join_next().await {
        if let Ok(Some(loaded)) = res {
            tenants.extend(loaded);
        }
    }

    if tenants.is_empty() {
        error!(dir = %dir.display(), "no tenant could be loaded");
        return Err(ConfigError::NoTenants { dir });
    }

    tenants.sort_by(|a, b| a.name().cmp(b.name()));
    Ok(tenants.into_iter().map(Arc::new).collect())
}

/// Loads every tenant section of one `.conf` file.
async fn load_file(path: &Path, bus: &Bus) -> Vec<TenantInstance> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) => {
            error!(path = %path.display(), error = %err, "failed to read config file");
            return Vec::new();
        }
    };

    let mut out = Vec::new();
    for parsed in config::parse_file(&text) {
        let cfg = match parsed {
            Ok(cfg) => cfg,
            Err(err) => {
                error!(path = %path.display(), error = %err, "skipping tenant section");
                continue;
            }
        };
        let queue = match RedisQueue::open(&cfg.redis_prefix, &cfg.redis_host, cfg.redis_port) {
            Ok(queue) => queue,
            Err(err) => {
                error!(tenant = %cfg.name, error = %err, "skipping tenant: queue unavailable");
                continue;
            }
        };
        let mut instance = TenantInstance::new(cfg, Arc::new(queue));
        instance.bootstrap_periodic().await;
        bus.publish(Event::now(EventKind::TenantLoaded).with_tenant(instance.name()));
        out.push(instance);
    }
    out
}
