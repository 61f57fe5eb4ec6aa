//! Dispatcher binary: flag parsing, logging setup, tenant loading, and the
//! wiring of the two control loops. Runs until interrupted.
//!
//! Exit status: 0 after a graceful stop, nonzero on fatal startup errors
//! (no tenants configured, configuration directory missing).

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use queuevisor::events::spawn_event_logger;
use queuevisor::{Bus, Config, Dispatcher, PeriodicScheduler, SystemClock};

#[derive(Parser, Debug)]
#[command(name = "queuevisor", version, about = "Multi-tenant task queue dispatcher")]
struct Cli {
    /// How many consumers are available.
    #[arg(long, default_value_t = 1)]
    consumers: usize,

    /// Run periodic tasks.
    #[arg(long)]
    periodic: bool,

    /// Verbose logging (includes DEBUG statements).
    #[arg(long)]
    verbose: bool,

    /// Redirect logs to a file in addition to the console.
    #[arg(long)]
    logfile: Option<PathBuf>,
}

fn init_tracing(cli: &Cli) -> anyhow::Result<()> {
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("queuevisor={default_level}")));

    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer());

    match &cli.logfile {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("cannot open logfile {}", path.display()))?;
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(Arc::new(file)),
                )
                .init();
        }
        None => registry.init(),
    }
    Ok(())
}

/// Configuration directory: `conf/` next to the executable, with the
/// loader falling back to the system-wide path when it is absent.
fn default_conf_dir() -> anyhow::Result<PathBuf> {
    let exe = std::env::current_exe().context("cannot locate executable")?;
    Ok(exe
        .parent()
        .map(|dir| dir.join("conf"))
        .unwrap_or_else(|| PathBuf::from("conf")))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli)?;

    let cfg = Config {
        consumers: cli.consumers,
        periodic: cli.periodic,
        ..Config::default()
    };

    info!("init dispatcher");
    info!(consumers = cfg.consumers, "- consumers");
    info!(periodic = if cfg.periodic { "enabled" } else { "disabled" }, "- periodic");
    info!(verbose = if cli.verbose { "enabled" } else { "disabled" }, "- verbose");

    let bus = Bus::new(cfg.bus_capacity_clamped());
    spawn_event_logger(&bus);

    let conf_dir = default_conf_dir()?;
    let tenants = queuevisor::tenant::load_all(&conf_dir, &bus)
        .await
        .context("tenant configuration failed")?;

    let scheduler_token = CancellationToken::new();
    if cfg.periodic {
        let scheduler = PeriodicScheduler::new(
            tenants.clone(),
            cfg.scheduler_interval,
            cfg.utc,
            Arc::new(SystemClock),
            bus.clone(),
        );
        tokio::spawn(scheduler.run(scheduler_token.clone()));
    }

    let mut dispatcher = Dispatcher::new(cfg, tenants, bus);
    let result = dispatcher.run().await;
    scheduler_token.cancel();
    result?;

    info!("shutting down");
    Ok(())
}
