use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};

use cadence_core::JobSpec;

use crate::error::{Result, SchedulerError};
use crate::timeparse;

/// Default strftime format for the `once` trigger.
const ONCE_FMT: &str = "%Y-%m-%dT%H:%M:%S";

/// A job's trigger, resolved from its spec fields.
#[derive(Debug, Clone)]
pub enum Trigger {
    /// Ordered absolute instants; each listed time fires once.
    When(Vec<DateTime<Utc>>),
    /// Parsed cron schedule.
    Cron(Box<cron::Schedule>),
    /// Single absolute instant; fires at most one time, ever.
    Once(DateTime<Utc>),
    /// Fixed period, counted from the first evaluation.
    Interval(Duration),
}

/// Resolve the trigger family for `spec`.
///
/// Exactly one of `when`, `cron`, `once`, or the interval fields must be
/// present. The interval fields themselves combine (`minutes = 1` plus
/// `seconds = 30` is a 90-second period).
pub fn resolve(name: &str, spec: &JobSpec) -> Result<Trigger> {
    let has_interval = spec.seconds.is_some()
        || spec.minutes.is_some()
        || spec.hours.is_some()
        || spec.days.is_some();

    let families = [
        spec.when.is_some(),
        spec.cron.is_some(),
        spec.once.is_some(),
        has_interval,
    ]
    .iter()
    .filter(|present| **present)
    .count();

    if families == 0 {
        return Err(invalid(name, "no trigger configured"));
    }
    if families > 1 {
        return Err(invalid(
            name,
            "conflicting trigger options; use only one of when/cron/once/interval",
        ));
    }

    if let Some(when) = &spec.when {
        let mut instants = when
            .entries()
            .iter()
            .map(|s| timeparse::parse_timestamp(s))
            .collect::<Result<Vec<_>>>()?;
        instants.sort_unstable();
        return Ok(Trigger::When(instants));
    }

    if let Some(expr) = &spec.cron {
        return Ok(Trigger::Cron(Box::new(parse_cron(expr)?)));
    }

    if let Some(once) = &spec.once {
        let fmt = spec.once_fmt.as_deref().unwrap_or(ONCE_FMT);
        return Ok(Trigger::Once(timeparse::parse_with_format(once, fmt)?));
    }

    let secs = spec.seconds.unwrap_or(0)
        + spec.minutes.unwrap_or(0) * 60
        + spec.hours.unwrap_or(0) * 3600
        + spec.days.unwrap_or(0) * 86_400;
    if secs == 0 {
        return Err(invalid(name, "interval period must be positive"));
    }
    Ok(Trigger::Interval(Duration::seconds(secs as i64)))
}

/// Parse a cron expression, accepting the 5-field minute-resolution form by
/// prepending a seconds column.
pub fn parse_cron(expr: &str) -> Result<cron::Schedule> {
    let trimmed = expr.trim();
    let normalized = if trimmed.split_whitespace().count() == 5 {
        format!("0 {trimmed}")
    } else {
        trimmed.to_string()
    };
    cron::Schedule::from_str(&normalized).map_err(|source| SchedulerError::InvalidCron {
        expr: expr.to_string(),
        source,
    })
}

/// Next occurrence strictly after `after`.
pub fn next_cron_occurrence(
    schedule: &cron::Schedule,
    after: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    schedule.after(&after).next()
}

fn invalid(name: &str, reason: &str) -> SchedulerError {
    SchedulerError::InvalidSchedule {
        name: name.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_core::config::WhenSpec;
    use chrono::TimeZone;

    #[test]
    fn five_field_cron_is_normalized() {
        let schedule = parse_cron("0 16 29 11 *").unwrap();
        let next = next_cron_occurrence(
            &schedule,
            Utc.with_ymd_and_hms(2017, 11, 29, 15, 59, 59).unwrap(),
        )
        .unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2017, 11, 29, 16, 0, 0).unwrap());
    }

    #[test]
    fn six_field_cron_is_accepted_as_is() {
        assert!(parse_cron("30 0 4 * * *").is_ok());
    }

    #[test]
    fn bad_cron_reports_the_original_expression() {
        let err = parse_cron("not a cron").unwrap_err();
        match err {
            SchedulerError::InvalidCron { expr, .. } => assert_eq!(expr, "not a cron"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn interval_fields_combine() {
        let mut spec = JobSpec::new("test.ping");
        spec.minutes = Some(1);
        spec.seconds = Some(30);
        match resolve("job", &spec).unwrap() {
            Trigger::Interval(period) => assert_eq!(period.num_seconds(), 90),
            other => panic!("unexpected trigger: {other:?}"),
        }
    }

    #[test]
    fn when_entries_come_out_sorted() {
        let mut spec = JobSpec::new("test.ping");
        spec.when = Some(WhenSpec::Many(vec![
            "2017-11-29T17:00:00".into(),
            "2017-11-29T16:00:00".into(),
        ]));
        match resolve("job", &spec).unwrap() {
            Trigger::When(instants) => {
                assert_eq!(instants[0], Utc.with_ymd_and_hms(2017, 11, 29, 16, 0, 0).unwrap());
                assert_eq!(instants[1], Utc.with_ymd_and_hms(2017, 11, 29, 17, 0, 0).unwrap());
            }
            other => panic!("unexpected trigger: {other:?}"),
        }
    }

    #[test]
    fn conflicting_families_are_rejected() {
        let mut spec = JobSpec::new("test.ping");
        spec.when = Some(WhenSpec::One("2017-11-29T16:00:00".into()));
        spec.seconds = Some(30);
        assert!(matches!(
            resolve("job", &spec),
            Err(SchedulerError::InvalidSchedule { .. })
        ));
    }

    #[test]
    fn missing_trigger_is_rejected() {
        let spec = JobSpec::new("test.ping");
        assert!(matches!(
            resolve("job", &spec),
            Err(SchedulerError::InvalidSchedule { .. })
        ));
    }

    #[test]
    fn zero_interval_is_rejected() {
        let mut spec = JobSpec::new("test.ping");
        spec.seconds = Some(0);
        assert!(resolve("job", &spec).is_err());
    }
}
