//! # Five-field cron predicate.
//!
//! [`CronSpec`] evaluates an instant against all five fields; the overall
//! predicate is the logical AND. Day-of-week is numbered 0-6 with Sunday as
//! 0, matching the schedule-file convention of the tenant-side framework.

use chrono::{DateTime, Datelike, TimeZone, Timelike};

use super::CronField;

/// Parsed cron entry: minute, hour, day-of-week, day, month.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CronSpec {
    pub minute: CronField,
    pub hour: CronField,
    pub day_of_week: CronField,
    pub day: CronField,
    pub month: CronField,
}

impl CronSpec {
    /// Parses the five field tokens in schedule-file order.
    ///
    /// Field-level syntax errors degrade to never-matching fields; see
    /// [`CronField::parse`].
    pub fn parse(minute: &str, hour: &str, day_of_week: &str, day: &str, month: &str) -> Self {
        Self {
            minute: CronField::parse(minute),
            hour: CronField::parse(hour),
            day_of_week: CronField::parse(day_of_week),
            day: CronField::parse(day),
            month: CronField::parse(month),
        }
    }

    /// A spec that matches every minute.
    pub fn every_minute() -> Self {
        Self {
            minute: CronField::Any,
            hour: CronField::Any,
            day_of_week: CronField::Any,
            day: CronField::Any,
            month: CronField::Any,
        }
    }

    /// Evaluates the predicate against `instant`.
    pub fn matches<Tz: TimeZone>(&self, instant: &DateTime<Tz>) -> bool {
        self.minute.matches(instant.minute())
            && self.hour.matches(instant.hour())
            && self.day_of_week.matches(instant.weekday().num_days_from_sunday())
            && self.day.matches(instant.day())
            && self.month.matches(instant.month())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[test]
    fn test_quarter_hour_minutes() {
        let spec = CronSpec::parse("*/15", "*", "*", "*", "*");
        for minute in 0..60 {
            let expected = minute % 15 == 0;
            assert_eq!(
                spec.matches(&at(2024, 6, 3, 12, minute)),
                expected,
                "minute {minute}"
            );
        }
    }

    #[test]
    fn test_all_fields_must_match() {
        // 2024-06-03 is a Monday (day_of_week 1).
        let spec = CronSpec::parse("30", "4", "1", "3", "6");
        assert!(spec.matches(&at(2024, 6, 3, 4, 30)));
        assert!(!spec.matches(&at(2024, 6, 3, 4, 31)));
        assert!(!spec.matches(&at(2024, 6, 3, 5, 30)));
        assert!(!spec.matches(&at(2024, 6, 4, 4, 30)));
        assert!(!spec.matches(&at(2024, 7, 3, 4, 30)));
    }

    #[test]
    fn test_sunday_is_zero() {
        // 2024-06-02 is a Sunday.
        let spec = CronSpec::parse("*", "*", "0", "*", "*");
        assert!(spec.matches(&at(2024, 6, 2, 10, 0)));
        assert!(!spec.matches(&at(2024, 6, 3, 10, 0)));
    }

    #[test]
    fn test_invalid_field_poisons_the_spec() {
        let spec = CronSpec::parse("not-a-minute", "*", "*", "*", "*");
        for minute in 0..60 {
            assert!(!spec.matches(&at(2024, 6, 3, 12, minute)));
        }
    }

    #[test]
    fn test_every_minute_matches_everything() {
        let spec = CronSpec::every_minute();
        assert!(spec.matches(&at(2024, 1, 1, 0, 0)));
        assert!(spec.matches(&at(2024, 12, 31, 23, 59)));
    }
}
