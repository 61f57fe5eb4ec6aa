//! Cron predicate evaluation for periodic tasks.
//!
//! A schedule entry carries five temporal fields (minute, hour, day-of-week,
//! day, month). [`CronField`] evaluates one field; [`CronSpec`] bundles all
//! five and matches an instant when every field matches.
//!
//! Malformed field syntax is logged at parse time and evaluates as
//! never-matching. Parsing a schedule can therefore never crash the
//! scheduler, no matter what a tenant writes into its schedule file.

mod field;
mod spec;

pub use field::CronField;
pub use spec::CronSpec;
