use chrono::{DateTime, Utc};

use crate::types::SkipReason;

/// Per-job runtime record.
///
/// Created the first time an evaluation considers the job, mutated by every
/// evaluation after that, and dropped only when the job leaves the table.
#[derive(Debug, Clone, Default)]
pub struct JobState {
    /// Most recent firing, absent if the job has never fired.
    pub last_run: Option<DateTime<Utc>>,
    /// Next scheduled firing; `None` when nothing further is scheduled.
    pub next_fire_time: Option<DateTime<Utc>>,
    pub skip_reason: Option<SkipReason>,
    pub skipped_time: Option<DateTime<Utc>>,
    /// Offset drawn for the current target instant, keyed by that instant so
    /// re-evaluating near the same occurrence never redraws.
    pub splay_applied: Option<(DateTime<Utc>, i64)>,
    /// Resolved interval period in seconds.
    pub period_secs: Option<i64>,
    /// Latest `when` entry already consumed, whether fired or missed.
    pub when_cursor: Option<DateTime<Utc>>,
    /// A `once` trigger that has fired never fires again.
    pub once_fired: bool,
    /// `run_on_start` firing still owed.
    pub run_on_start_pending: bool,
}

impl JobState {
    pub fn new(run_on_start: bool) -> Self {
        Self {
            run_on_start_pending: run_on_start,
            ..Default::default()
        }
    }

    /// Record a skip. Leaves `last_run` untouched.
    pub fn skip(&mut self, reason: SkipReason, now: DateTime<Utc>) {
        self.skip_reason = Some(reason);
        self.skipped_time = Some(now);
    }

    pub fn clear_skip(&mut self) {
        self.skip_reason = None;
        self.skipped_time = None;
    }
}
