use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use cadence_core::JobSpec;

/// Why a considered job did not fire. A queryable state, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The job (or the whole schedule) is disabled.
    Disabled,
    /// `after` is set and has not been reached yet.
    AfterNotPassed,
    /// `until` is set and has passed. Effectively terminal.
    UntilPassed,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SkipReason::Disabled => "disabled",
            SkipReason::AfterNotPassed => "after_not_passed",
            SkipReason::UntilPassed => "until_passed",
        };
        write!(f, "{s}")
    }
}

/// Handle for a single firing, handed to the external dispatcher.
///
/// The scheduler's contract ends here: looking up and invoking `function`
/// is the dispatcher's job.
#[derive(Debug, Clone, Serialize)]
pub struct Firing {
    /// Unique identifier for this firing.
    pub id: Uuid,
    /// Job name in the schedule table.
    pub name: String,
    /// Callable identifier, passed through untouched.
    pub function: String,
    /// Pass-through flag; the dispatcher decides what it means.
    pub dry_run: bool,
    /// The `now` the firing was decided at.
    pub fired_at: DateTime<Utc>,
}

/// Merged job spec + runtime state, as returned by `job_status`.
///
/// Runtime keys keep the underscore-prefixed naming used throughout the
/// agent's status output.
#[derive(Debug, Clone, Serialize)]
pub struct JobStatusView {
    #[serde(flatten)]
    pub spec: JobSpec,
    #[serde(rename = "_last_run", skip_serializing_if = "Option::is_none")]
    pub last_run: Option<DateTime<Utc>>,
    #[serde(rename = "_next_fire_time")]
    pub next_fire_time: Option<DateTime<Utc>>,
    #[serde(rename = "_skip_reason", skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<SkipReason>,
    #[serde(rename = "_skipped_time", skip_serializing_if = "Option::is_none")]
    pub skipped_time: Option<DateTime<Utc>>,
    /// Splay offset (seconds) drawn for the pending fire instant.
    #[serde(rename = "_splay_applied", skip_serializing_if = "Option::is_none")]
    pub splay_applied: Option<i64>,
}
