//! Error types used by the dispatcher runtime.
//!
//! One enum per failure domain:
//!
//! - [`ConfigError`] — tenant discovery and config-file parsing.
//! - [`CodecError`] — queue message decoding.
//! - [`QueueError`] — queue backend (connection, commands, event channel).
//! - [`SpawnError`] — subprocess creation.
//! - [`RuntimeError`] — faults of the control loops themselves.
//!
//! Errors that are recoverable per-tenant (a section that fails to parse, a
//! message that fails to decode, a worker that fails to spawn) are logged and
//! contained at the call site; only [`ConfigError`] during startup and
//! [`RuntimeError`] from a control loop terminate the process.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while discovering and parsing tenant configuration.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Neither the configured directory nor the fallback path exists.
    #[error("no tenant configuration directory found (searched {searched:?})")]
    ConfDirMissing {
        /// Paths that were checked, in order.
        searched: Vec<PathBuf>,
    },

    /// A config file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A required key is absent from a tenant section.
    #[error("section [{section}] is missing required key '{key}'")]
    MissingKey { section: String, key: String },

    /// A key is present but its value does not parse.
    #[error("section [{section}] has invalid value '{value}' for key '{key}'")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
    },

    /// Every configured tenant failed to load.
    #[error("no tenant could be loaded from {dir}")]
    NoTenants { dir: PathBuf },
}

/// Errors raised while decoding a queue message.
///
/// The wire format is a serialized positional sequence of 6 or 7 fields.
/// Anything else is rejected with a typed error rather than guessed at.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum CodecError {
    /// The payload is not a serialized sequence at all.
    #[error("malformed message payload: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The sequence has an unsupported number of fields.
    #[error("unsupported message arity {0} (expected 6 or 7 fields)")]
    Arity(usize),

    /// A required field has the wrong type.
    #[error("message field {index} is not a {expected}")]
    Field {
        index: usize,
        expected: &'static str,
    },
}

impl CodecError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            CodecError::Malformed(_) => "codec_malformed",
            CodecError::Arity(_) => "codec_arity",
            CodecError::Field { .. } => "codec_field",
        }
    }
}

/// Errors raised by the queue backend.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum QueueError {
    /// The underlying store rejected a command or the connection dropped.
    #[error("queue backend error: {0}")]
    Backend(#[from] redis::RedisError),

    /// The worker event channel is closed.
    #[error("worker event channel closed")]
    EventsClosed,
}

/// Error raised when a tenant subprocess cannot be created.
///
/// Spawn failures are contained per-tenant: the tenant yields no worker this
/// cycle and the dispatcher keeps running.
#[derive(Error, Debug)]
#[error("failed to spawn '{program}': {source}")]
pub struct SpawnError {
    /// The executable that could not be started.
    pub program: String,
    #[source]
    pub source: std::io::Error,
}

/// Errors produced by the control loops themselves.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// OS signal listener registration failed.
    #[error("failed to register signal handlers: {0}")]
    Signals(#[from] std::io::Error),
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::Signals(_) => "runtime_signals",
        }
    }
}
