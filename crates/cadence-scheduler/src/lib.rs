//! Job schedule evaluation for the Cadence agent.
//!
//! # Overview
//!
//! The [`evaluator::Evaluator`] owns the job table and one runtime record
//! per job. Callers hand it an explicit `now`; it answers with the jobs due
//! at that instant. The [`engine::SchedulerEngine`] is the only place the
//! wall clock is read: it ticks every loop interval and forwards each
//! [`types::Firing`] to the dispatcher over mpsc. Running the fired function
//! is the dispatcher's business, not ours.
//!
//! # Trigger families
//!
//! | Trigger    | Behaviour                                               |
//! |------------|---------------------------------------------------------|
//! | `when`     | One or more absolute instants, each fires once          |
//! | `cron`     | 5-field cron expression, next occurrence per tick       |
//! | `once`     | Single absolute instant, fires at most one time ever    |
//! | interval   | `seconds`/`minutes`/`hours`/`days`, fixed period from   |
//! |            | the first evaluation                                    |
//!
//! `splay` adds jitter drawn once per fire instant; `until`/`after` bound
//! the validity window; `enabled` toggles evaluation per job or
//! schedule-wide. Jobs outside their window or disabled report a queryable
//! skip reason instead of firing.

pub mod engine;
pub mod error;
pub mod evaluator;
pub mod splay;
pub mod state;
pub mod timeparse;
pub mod trigger;
pub mod types;

pub use engine::SchedulerEngine;
pub use error::{Result, SchedulerError};
pub use evaluator::Evaluator;
pub use splay::{FixedJitter, Jitter, RandomJitter};
pub use trigger::Trigger;
pub use types::{Firing, JobStatusView, SkipReason};
