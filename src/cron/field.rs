//! # Single cron field.
//!
//! Grammar per field:
//! - `*` matches any value;
//! - a bare integer matches only that exact value;
//! - `*/N` matches values congruent to 0 mod N.
//!
//! Anything else (including `*/0`) is malformed. Malformed input produces
//! [`CronField::Invalid`], which never matches; the problem is reported once
//! via `tracing` at parse time instead of surfacing an error to the caller.

use std::fmt;

use tracing::warn;

/// One of the five temporal fields of a cron entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CronField {
    /// `*`: matches any value.
    Any,
    /// Bare integer: matches exactly this value.
    Exact(u32),
    /// `*/N`: matches values divisible by N.
    Every(u32),
    /// Malformed syntax: matches nothing.
    Invalid,
}

impl CronField {
    /// Parses a single field token.
    ///
    /// Never fails; malformed tokens are logged and collapse to
    /// [`CronField::Invalid`].
    pub fn parse(token: &str) -> Self {
        let token = token.trim();
        if token == "*" {
            return CronField::Any;
        }
        if let Some(step) = token.strip_prefix("*/") {
            return match step.parse::<u32>() {
                Ok(n) if n > 0 => CronField::Every(n),
                _ => {
                    warn!(token, "malformed cron step field");
                    CronField::Invalid
                }
            };
        }
        match token.parse::<u32>() {
            Ok(n) => CronField::Exact(n),
            Err(_) => {
                warn!(token, "malformed cron field");
                CronField::Invalid
            }
        }
    }

    /// Evaluates this field against one component of an instant.
    pub fn matches(&self, value: u32) -> bool {
        match *self {
            CronField::Any => true,
            CronField::Exact(n) => value == n,
            CronField::Every(n) => value % n == 0,
            CronField::Invalid => false,
        }
    }
}

impl fmt::Display for CronField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            CronField::Any => write!(f, "*"),
            CronField::Exact(n) => write!(f, "{n}"),
            CronField::Every(n) => write!(f, "*/{n}"),
            CronField::Invalid => write!(f, "<invalid>"),
        }
    }
}
