//! # Subprocess lifecycle wrapper.
//!
//! [`ProcessHandle`] wraps one OS subprocess with the three operations the
//! dispatcher needs: spawn, non-blocking poll, and signaling.
//!
//! ## Rules
//! - `poll()` never blocks; it reports [`PollState::Running`] or
//!   [`PollState::Exited`].
//! - Signaling an already-exited process is a no-op, not an error.
//! - Dropping a handle does NOT kill the process. Workers are deliberately
//!   allowed to outlive the dispatcher on shutdown and either finish or
//!   orphan.
//!
//! Graceful interrupts are delivered through the `kill(1)` command on unix
//! so in-flight work gets a chance to finish; the hard variant uses the
//! runtime's kill. On non-unix platforms both variants degrade to the hard
//! kill.

use std::process::Stdio;

use tokio::process::{Child, Command};
use tracing::{debug, warn};

use crate::error::SpawnError;

/// Result of a non-blocking liveness check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    /// The process is still running.
    Running,
    /// The process exited; the code is absent when the OS did not report
    /// one (e.g. termination by signal).
    Exited(Option<i32>),
}

/// How to stop a running worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopSignal {
    /// Graceful interrupt (SIGINT): the worker may drain in-flight work.
    Interrupt,
    /// Hard kill (SIGKILL): immediate termination.
    Kill,
}

/// Handle to one spawned subprocess.
#[derive(Debug)]
pub struct ProcessHandle {
    child: Child,
    argv: Vec<String>,
    /// Cached poll result once the process has exited.
    exited: Option<Option<i32>>,
}

impl ProcessHandle {
    /// Spawns `program` with `args`, inheriting stdio.
    ///
    /// Fails when the executable path is invalid or the OS refuses to
    /// fork/exec.
    pub fn spawn(program: &str, args: &[String]) -> Result<Self, SpawnError> {
        let mut argv = Vec::with_capacity(args.len() + 1);
        argv.push(program.to_string());
        argv.extend(args.iter().cloned());

        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .spawn()
            .map_err(|source| SpawnError {
                program: program.to_string(),
                source,
            })?;

        debug!(pid = child.id(), ?argv, "spawned subprocess");
        Ok(Self {
            child,
            argv,
            exited: None,
        })
    }

    /// OS process id, if the process has not been reaped yet.
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// The argument vector this process was spawned with.
    pub fn argv(&self) -> &[String] {
        &self.argv
    }

    /// Non-blocking liveness check.
    pub fn poll(&mut self) -> PollState {
        if let Some(code) = self.exited {
            return PollState::Exited(code);
        }
        match self.child.try_wait() {
            Ok(None) => PollState::Running,
            Ok(Some(status)) => {
                self.exited = Some(status.code());
                PollState::Exited(status.code())
            }
            Err(err) => {
                // Treat a failed wait like a vanished process.
                warn!(error = %err, "failed to poll subprocess");
                self.exited = Some(None);
                PollState::Exited(None)
            }
        }
    }

    /// Sends a stop signal. Idempotent: exited processes are left alone.
    pub fn signal(&mut self, sig: StopSignal) {
        if matches!(self.poll(), PollState::Exited(_)) {
            return;
        }
        match (sig, self.child.id()) {
            (StopSignal::Interrupt, Some(pid)) => signal_pid(pid, StopSignal::Interrupt),
            _ => {
                let _ = self.child.start_kill();
            }
        }
    }
}

/// Delivers a signal to a process by pid.
///
/// Used by detached stop timers that must not share the (mutable) handle
/// with the reaper. On unix this shells out to `kill(1)`; elsewhere only the
/// hard variant is available and the graceful one is a logged no-op.
pub fn signal_pid(pid: u32, sig: StopSignal) {
    #[cfg(unix)]
    {
        let flag = match sig {
            StopSignal::Interrupt => "-INT",
            StopSignal::Kill => "-KILL",
        };
        let _ = std::process::Command::new("kill")
            .args([flag, &pid.to_string()])
            .output();
        debug!(pid, signal = flag, "sent signal");
    }
    #[cfg(not(unix))]
    {
        warn!(pid, ?sig, "per-pid signaling not supported on this platform");
    }
}
