// Five-field cron recurrence rules
// Supports the subset the platform schedules: numeric values or '*' per field.

use chrono::{DateTime, Datelike, Duration, DurationRound, Timelike, Utc};
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum CronError {
    #[error("Expected 5 fields, got {0}")]
    FieldCount(usize),

    #[error("Invalid value for {field}: {value}")]
    InvalidField { field: &'static str, value: String },

    #[error("No occurrence within the next year for '{0}'")]
    NoOccurrence(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Any,
    Exact(u32),
}

impl Field {
    fn parse(raw: &str, name: &'static str, min: u32, max: u32) -> Result<Self, CronError> {
        if raw == "*" {
            return Ok(Field::Any);
        }
        let value: u32 = raw.parse().map_err(|_| CronError::InvalidField {
            field: name,
            value: raw.to_string(),
        })?;
        if value < min || value > max {
            return Err(CronError::InvalidField {
                field: name,
                value: raw.to_string(),
            });
        }
        Ok(Field::Exact(value))
    }

    fn matches(&self, value: u32) -> bool {
        match self {
            Field::Any => true,
            Field::Exact(v) => *v == value,
        }
    }
}

/// A parsed five-field cron expression: minute, hour, day-of-month, month,
/// day-of-week (0-6, Sunday = 0; 7 accepted as Sunday).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronSchedule {
    source: String,
    minute: Field,
    hour: Field,
    day_of_month: Field,
    month: Field,
    day_of_week: Field,
}

impl CronSchedule {
    pub fn parse(expression: &str) -> Result<Self, CronError> {
        let fields: Vec<&str> = expression.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(CronError::FieldCount(fields.len()));
        }

        let day_of_week = match Field::parse(fields[4], "day-of-week", 0, 7)? {
            // Both 0 and 7 mean Sunday in standard cron
            Field::Exact(7) => Field::Exact(0),
            f => f,
        };

        Ok(Self {
            source: expression.to_string(),
            minute: Field::parse(fields[0], "minute", 0, 59)?,
            hour: Field::parse(fields[1], "hour", 0, 23)?,
            day_of_month: Field::parse(fields[2], "day-of-month", 1, 31)?,
            month: Field::parse(fields[3], "month", 1, 12)?,
            day_of_week,
        })
    }

    /// The original expression text
    pub fn source(&self) -> &str {
        &self.source
    }

    fn matches(&self, at: DateTime<Utc>) -> bool {
        // Standard cron: when both day fields are restricted the rule fires
        // if EITHER matches; otherwise both are ANDed.
        let dom_restricted = self.day_of_month != Field::Any;
        let dow_restricted = self.day_of_week != Field::Any;
        let dom_match = self.day_of_month.matches(at.day());
        let dow_match = self
            .day_of_week
            .matches(at.weekday().num_days_from_sunday());

        let day_match = if dom_restricted && dow_restricted {
            dom_match || dow_match
        } else {
            dom_match && dow_match
        };

        self.minute.matches(at.minute())
            && self.hour.matches(at.hour())
            && self.month.matches(at.month())
            && day_match
    }

    /// First occurrence strictly after `after`, at minute granularity.
    pub fn next_after(&self, after: DateTime<Utc>) -> Result<DateTime<Utc>, CronError> {
        let mut candidate = (after + Duration::minutes(1))
            .duration_trunc(Duration::minutes(1))
            .expect("minute truncation cannot fail");

        // A valid expression recurs at least yearly (plus leap slack)
        let limit = after + Duration::days(367);
        while candidate <= limit {
            if self.matches(candidate) {
                return Ok(candidate);
            }
            // Skip ahead a day at a time once the day can't match at all
            candidate = if self.matches_day(candidate) {
                candidate + Duration::minutes(1)
            } else {
                (candidate + Duration::days(1))
                    .duration_trunc(Duration::days(1))
                    .expect("day truncation cannot fail")
            };
        }
        Err(CronError::NoOccurrence(self.source.clone()))
    }

    fn matches_day(&self, at: DateTime<Utc>) -> bool {
        let dom_restricted = self.day_of_month != Field::Any;
        let dow_restricted = self.day_of_week != Field::Any;
        let dom_match = self.day_of_month.matches(at.day());
        let dow_match = self
            .day_of_week
            .matches(at.weekday().num_days_from_sunday());

        let day_match = if dom_restricted && dow_restricted {
            dom_match || dow_match
        } else {
            dom_match && dow_match
        };

        day_match && self.month.matches(at.month())
    }
}
