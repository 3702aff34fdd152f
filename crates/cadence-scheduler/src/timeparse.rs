use chrono::{DateTime, NaiveDateTime, Utc};

use crate::error::{Result, SchedulerError};

/// Formats tried, in order, after RFC 3339. Covers the date styles users
/// actually write in schedule tables, including the US `11/29/2017 4:00pm`
/// form. Naive timestamps are read as UTC.
const FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %I:%M:%S%p",
    "%m/%d/%Y %I:%M:%S %p",
    "%m/%d/%Y %I:%M%p",
    "%m/%d/%Y %I:%M %p",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

/// Parse an absolute timestamp from any accepted format.
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    let trimmed = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.with_timezone(&Utc));
    }
    for fmt in FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Ok(naive.and_utc());
        }
    }
    Err(SchedulerError::InvalidTimestamp {
        value: value.to_string(),
    })
}

/// Parse with an explicit strftime format (the `once_fmt` option).
pub fn parse_with_format(value: &str, fmt: &str) -> Result<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value.trim(), fmt)
        .map(|naive| naive.and_utc())
        .map_err(|_| SchedulerError::InvalidTimestamp {
            value: value.to_string(),
        })
}
