//! # Schedule descriptor parsing.
//!
//! The bootstrap command writes a plain-text descriptor, one periodic task
//! per line, six whitespace-separated tokens:
//!
//! ```text
//! minute hour day_of_week day month dotted.command.path
//! ```
//!
//! Line rules, in order:
//! - trimmed; blank lines are skipped;
//! - `;` or `#` prefix marks a comment, skipped;
//! - exactly 6 tokens: accepted and registered;
//! - more than 1 but not 6 tokens: logged as invalid, skipped;
//! - a single token: silently skipped.
//!
//! Nothing in a schedule file can fail tenant startup.

use tracing::{info, warn};

use crate::cron::CronSpec;
use crate::registry::PeriodicTask;

/// Parses a schedule descriptor into periodic tasks.
pub(crate) fn parse_schedule(text: &str, tenant: &str) -> Vec<PeriodicTask> {
    let mut tasks = Vec::new();
    for raw in text.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
            continue;
        }
        let tokens: Vec<&str> = line.split_whitespace().collect();
        match tokens.len() {
            6 => {
                info!(tenant, line, "registered periodic task");
                tasks.push(PeriodicTask::new(
                    tokens[5],
                    CronSpec::parse(tokens[0], tokens[1], tokens[2], tokens[3], tokens[4]),
                ));
            }
            n if n > 1 => {
                warn!(tenant, line, "invalid schedule line");
            }
            _ => {}
        }
    }
    tasks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cron::CronField;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_comments_and_seven_tokens_register_nothing() {
        let text = "; comment\n# comment\n0 * * * * * pkg.task\n";
        let tasks = parse_schedule(text, "shop");
        assert!(tasks.is_empty());
    }

    #[test]
    fn test_valid_line_registers() {
        let tasks = parse_schedule("*/5 * * * * app.tasks.heartbeat\n", "shop");
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].command, "app.tasks.heartbeat");
        assert_eq!(tasks[0].cron.minute, CronField::Every(5));
    }

    #[test]
    fn test_single_token_silently_skipped() {
        assert!(parse_schedule("loneword\n", "shop").is_empty());
    }

    #[test]
    fn test_blank_and_whitespace_lines_skipped() {
        assert!(parse_schedule("\n   \n\t\n", "shop").is_empty());
    }

    #[test]
    fn test_malformed_cron_field_registers_but_never_fires() {
        let tasks = parse_schedule("bogus * * * * app.tasks.job\n", "shop");
        assert_eq!(tasks.len(), 1);
        let noon = Utc.with_ymd_and_hms(2024, 6, 3, 12, 0, 0).unwrap();
        assert!(!tasks[0].cron.matches(&noon));
    }

    #[test]
    fn test_mixed_file() {
        let text = "\
# nightly jobs
0 3 * * * app.tasks.rebuild_index
*/15 * * * * app.tasks.heartbeat
too few
one two three
";
        let tasks = parse_schedule(text, "shop");
        let commands: Vec<&str> = tasks.iter().map(|t| t.command.as_str()).collect();
        assert_eq!(
            commands,
            vec!["app.tasks.rebuild_index", "app.tasks.heartbeat"]
        );
    }
}
