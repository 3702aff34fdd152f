use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use cadence_core::{JobSpec, ScheduleConfig, Splay};

use crate::error::{Result, SchedulerError};
use crate::splay::{Jitter, RandomJitter};
use crate::state::JobState;
use crate::timeparse;
use crate::trigger::{self, Trigger};
use crate::types::{Firing, JobStatusView, SkipReason};

/// The schedule evaluator: owns the job table and one runtime record per
/// job, and decides on each `eval(now)` which jobs are due.
///
/// Single-threaded by design. The clock is never read here; callers supply
/// `now` explicitly, and calls must use monotonically non-decreasing values
/// (behaviour with a clock moving backwards is undefined).
pub struct Evaluator {
    schedule: ScheduleConfig,
    states: HashMap<String, JobState>,
    jitter: Box<dyn Jitter>,
    /// Width of the hit window for absolute-instant triggers. With the
    /// default 1 s an instant is only matched to the second.
    loop_interval: Duration,
}

impl Evaluator {
    pub fn new(schedule: ScheduleConfig, loop_interval_secs: u64) -> Self {
        Self::with_jitter(
            schedule,
            loop_interval_secs,
            Box::new(RandomJitter::from_entropy()),
        )
    }

    /// Like [`Evaluator::new`] but with an explicit splay source, for
    /// deterministic tests or reproducible jitter.
    pub fn with_jitter(
        schedule: ScheduleConfig,
        loop_interval_secs: u64,
        jitter: Box<dyn Jitter>,
    ) -> Self {
        Self {
            schedule,
            states: HashMap::new(),
            jitter,
            loop_interval: Duration::seconds(loop_interval_secs.max(1) as i64),
        }
    }

    pub fn loop_interval(&self) -> Duration {
        self.loop_interval
    }

    /// Evaluate every job in the table against `now`.
    ///
    /// Returns the set of firings due this tick; its cardinality is the
    /// caller-visible "how many jobs ran". Runtime state is updated for
    /// every job considered, due or not. Re-evaluating with the same `now`
    /// never refires a job.
    pub fn eval(&mut self, now: DateTime<Utc>) -> Result<Vec<Firing>> {
        let Self {
            schedule,
            states,
            jitter,
            loop_interval,
        } = self;

        // A job removed from the table is cancelled; its state goes with it.
        states.retain(|name, _| schedule.jobs.contains_key(name));

        let schedule_enabled = schedule.enabled.unwrap_or(true);
        let default_splay = schedule.splay;
        let mut fired = Vec::new();

        for (name, spec) in &schedule.jobs {
            let st = states
                .entry(name.clone())
                .or_insert_with(|| JobState::new(spec.run_on_start));

            let due = eval_job(
                name,
                spec,
                st,
                schedule_enabled,
                default_splay,
                *loop_interval,
                jitter.as_mut(),
                now,
            )?;

            if due {
                debug!(job = %name, function = %spec.function, "job due");
                fired.push(Firing {
                    id: Uuid::new_v4(),
                    name: name.clone(),
                    function: spec.function.clone(),
                    dry_run: spec.dry_run,
                    fired_at: now,
                });
            }
        }

        Ok(fired)
    }

    /// Merged spec + runtime view for one job. Pure read.
    pub fn job_status(&self, name: &str) -> Option<JobStatusView> {
        let spec = self.schedule.jobs.get(name)?;
        let st = self.states.get(name).cloned().unwrap_or_default();
        Some(JobStatusView {
            spec: spec.clone(),
            last_run: st.last_run,
            next_fire_time: st.next_fire_time,
            skip_reason: st.skip_reason,
            skipped_time: st.skipped_time,
            splay_applied: st.splay_applied.map(|(_, off)| off),
        })
    }

    /// Next scheduled fire time for one job, if any is known yet.
    pub fn next_fire_time(&self, name: &str) -> Option<DateTime<Utc>> {
        self.states.get(name)?.next_fire_time
    }

    pub fn jobs(&self) -> &std::collections::BTreeMap<String, JobSpec> {
        &self.schedule.jobs
    }

    // --- job table management ----------------------------------------------

    /// Add a job, or replace it if the name already exists. The spec's
    /// trigger is validated up front; runtime state starts fresh either way.
    pub fn add_job(&mut self, name: impl Into<String>, spec: JobSpec) -> Result<()> {
        let name = name.into();
        trigger::resolve(&name, &spec)?;
        if self.schedule.jobs.insert(name.clone(), spec).is_some() {
            info!(job = %name, "job updated");
        } else {
            info!(job = %name, "job added");
        }
        self.states.remove(&name);
        Ok(())
    }

    /// Replace an existing job's definition.
    pub fn modify_job(&mut self, name: &str, spec: JobSpec) -> Result<()> {
        if !self.schedule.jobs.contains_key(name) {
            return Err(SchedulerError::JobNotFound {
                name: name.to_string(),
            });
        }
        self.add_job(name.to_string(), spec)
    }

    pub fn delete_job(&mut self, name: &str) -> Result<()> {
        if self.schedule.jobs.remove(name).is_none() {
            return Err(SchedulerError::JobNotFound {
                name: name.to_string(),
            });
        }
        self.states.remove(name);
        info!(job = %name, "job removed");
        Ok(())
    }

    /// Remove every job whose name starts with `prefix`. Returns how many
    /// were removed.
    pub fn delete_jobs_prefix(&mut self, prefix: &str) -> usize {
        let before = self.schedule.jobs.len();
        self.schedule.jobs.retain(|name, _| !name.starts_with(prefix));
        self.states.retain(|name, _| !name.starts_with(prefix));
        before - self.schedule.jobs.len()
    }

    pub fn enable_job(&mut self, name: &str) -> Result<()> {
        self.set_job_enabled(name, true)
    }

    pub fn disable_job(&mut self, name: &str) -> Result<()> {
        self.set_job_enabled(name, false)
    }

    fn set_job_enabled(&mut self, name: &str, enabled: bool) -> Result<()> {
        let spec = self
            .schedule
            .jobs
            .get_mut(name)
            .ok_or_else(|| SchedulerError::JobNotFound {
                name: name.to_string(),
            })?;
        spec.enabled = Some(enabled);
        info!(job = %name, enabled, "job toggled");
        Ok(())
    }

    pub fn enable_schedule(&mut self) {
        self.schedule.enabled = Some(true);
    }

    pub fn disable_schedule(&mut self) {
        self.schedule.enabled = Some(false);
    }

    /// Replace the whole job table, e.g. after a config reload. All runtime
    /// state is reset.
    pub fn reload(&mut self, schedule: ScheduleConfig) {
        self.schedule = schedule;
        self.states.clear();
    }

    /// Force-fire a job right now, bypassing trigger computation and the
    /// enable/window checks. The trigger's own cadence is not advanced.
    pub fn run_job(&mut self, name: &str, now: DateTime<Utc>) -> Result<Firing> {
        let (function, dry_run, run_on_start) = {
            let spec = self
                .schedule
                .jobs
                .get(name)
                .ok_or_else(|| SchedulerError::JobNotFound {
                    name: name.to_string(),
                })?;
            (spec.function.clone(), spec.dry_run, spec.run_on_start)
        };
        let st = self
            .states
            .entry(name.to_string())
            .or_insert_with(|| JobState::new(run_on_start));
        st.last_run = Some(now);
        st.clear_skip();
        info!(job = %name, "job force-run");
        Ok(Firing {
            id: Uuid::new_v4(),
            name: name.to_string(),
            function,
            dry_run,
            fired_at: now,
        })
    }
}

/// One job, one tick. Returns whether the job is due.
#[allow(clippy::too_many_arguments)]
fn eval_job(
    name: &str,
    spec: &JobSpec,
    st: &mut JobState,
    schedule_enabled: bool,
    default_splay: Option<Splay>,
    loop_interval: Duration,
    jitter: &mut dyn Jitter,
    now: DateTime<Utc>,
) -> Result<bool> {
    // Per-job value wins over the schedule-wide flag; absent both, enabled.
    let enabled = spec.enabled.unwrap_or(schedule_enabled);
    if !enabled {
        st.skip(SkipReason::Disabled, now);
        return Ok(false);
    }

    // Validity window checks come before any trigger computation: a job
    // outside its window never fires even if its trigger says due.
    if let Some(after) = &spec.after {
        let after = timeparse::parse_timestamp(after)?;
        if now < after {
            st.skip(SkipReason::AfterNotPassed, now);
            return Ok(false);
        }
    }
    if let Some(until) = &spec.until {
        let until = timeparse::parse_timestamp(until)?;
        if now >= until {
            st.skip(SkipReason::UntilPassed, now);
            return Ok(false);
        }
    }
    // Back inside the valid window: pending again.
    st.clear_skip();

    let splay = spec.splay.or(default_splay);
    let mut due = match trigger::resolve(name, spec)? {
        Trigger::Interval(period) => eval_interval(name, splay, st, period, jitter, now)?,
        Trigger::When(instants) => {
            eval_when(name, splay, st, instants, loop_interval, jitter, now)?
        }
        Trigger::Once(at) => eval_once(name, splay, st, at, loop_interval, jitter, now)?,
        Trigger::Cron(schedule) => eval_cron(name, splay, st, &schedule, jitter, now)?,
    };

    // The first evaluation after the job appeared is due unconditionally
    // when run_on_start is set. The trigger computation above still ran, so
    // next_fire_time is primed normally.
    if st.run_on_start_pending {
        st.run_on_start_pending = false;
        due = true;
    }

    if due {
        st.last_run = Some(now);
        st.clear_skip();
        st.splay_applied = None;
    }
    Ok(due)
}

/// Splay offset for `target`, drawn once per distinct target instant.
fn splay_offset(
    name: &str,
    splay: Option<Splay>,
    st: &mut JobState,
    target: DateTime<Utc>,
    jitter: &mut dyn Jitter,
) -> Result<i64> {
    let Some(splay) = splay else { return Ok(0) };

    if let Some((cached_target, offset)) = st.splay_applied {
        if cached_target == target {
            return Ok(offset);
        }
    }

    let (start, end) = match splay {
        Splay::Secs(n) => (0, n),
        Splay::Range { start, end } if end >= start => (start, end),
        Splay::Range { start, end } => {
            return Err(SchedulerError::InvalidSchedule {
                name: name.to_string(),
                reason: format!("splay end ({end}) must not be less than start ({start})"),
            })
        }
    };
    let offset = jitter.draw(start, end) as i64;
    debug!(job = %name, offset, "splay drawn for next fire");
    st.splay_applied = Some((target, offset));
    Ok(offset)
}

fn eval_interval(
    name: &str,
    splay: Option<Splay>,
    st: &mut JobState,
    period: Duration,
    jitter: &mut dyn Jitter,
    now: DateTime<Utc>,
) -> Result<bool> {
    st.period_secs = Some(period.num_seconds());

    let Some(next) = st.next_fire_time else {
        // Priming pass: first fire lands one period out.
        st.next_fire_time = Some(now + period);
        return Ok(false);
    };

    let offset = splay_offset(name, splay, st, next, jitter)?;
    if now >= next + Duration::seconds(offset) {
        // Advance from the scheduled instant, not from `now`, so a late
        // evaluation does not push the whole cadence forward.
        st.next_fire_time = Some(next + period);
        Ok(true)
    } else {
        Ok(false)
    }
}

fn eval_when(
    name: &str,
    splay: Option<Splay>,
    st: &mut JobState,
    instants: Vec<DateTime<Utc>>,
    loop_interval: Duration,
    jitter: &mut dyn Jitter,
    now: DateTime<Utc>,
) -> Result<bool> {
    // Entries at or before the cursor are consumed, fired or missed.
    let cursor = st.when_cursor;
    let mut candidates = instants
        .into_iter()
        .filter(move |t| cursor.map_or(true, |c| *t > c));

    loop {
        let Some(target) = candidates.next() else {
            // Nothing unconsumed is left; drop any offset drawn for a
            // consumed entry.
            st.splay_applied = None;
            st.next_fire_time = None;
            return Ok(false);
        };
        let offset = splay_offset(name, splay, st, target, jitter)?;
        let effective = target + Duration::seconds(offset);

        if now < effective {
            st.next_fire_time = Some(target);
            return Ok(false);
        }
        if now < effective + loop_interval {
            st.when_cursor = Some(target);
            st.next_fire_time = candidates.next();
            return Ok(true);
        }
        // The (splayed) window was skipped over: occurrence missed.
        debug!(job = %name, target = %target, "fire window missed");
        st.when_cursor = Some(target);
    }
}

fn eval_once(
    name: &str,
    splay: Option<Splay>,
    st: &mut JobState,
    at: DateTime<Utc>,
    loop_interval: Duration,
    jitter: &mut dyn Jitter,
    now: DateTime<Utc>,
) -> Result<bool> {
    if st.once_fired {
        st.next_fire_time = None;
        return Ok(false);
    }

    let offset = splay_offset(name, splay, st, at, jitter)?;
    let effective = at + Duration::seconds(offset);

    if now < effective {
        st.next_fire_time = Some(at);
        return Ok(false);
    }
    if now < effective + loop_interval {
        st.once_fired = true;
        st.next_fire_time = None;
        return Ok(true);
    }
    // Its only window has passed; the drawn offset goes with it.
    st.splay_applied = None;
    st.next_fire_time = None;
    Ok(false)
}

fn eval_cron(
    name: &str,
    splay: Option<Splay>,
    st: &mut JobState,
    schedule: &cron::Schedule,
    jitter: &mut dyn Jitter,
    now: DateTime<Utc>,
) -> Result<bool> {
    let Some(target) = st.next_fire_time else {
        // Never computed, or consumed by the previous firing: schedule the
        // next occurrence strictly after this evaluation.
        st.next_fire_time = trigger::next_cron_occurrence(schedule, now);
        return Ok(false);
    };

    let offset = splay_offset(name, splay, st, target, jitter)?;
    if now >= target + Duration::seconds(offset) {
        st.next_fire_time = None;
        Ok(true)
    } else {
        Ok(false)
    }
}
