//! Worker stopping policies.
//!
//! Controls **when** a claimed worker subprocess is told to stop. One
//! consumer-slot implementation is parameterized by an explicit
//! [`StopPolicy`] value; there is no per-policy type hierarchy.

mod stop;

pub use stop::StopPolicy;
