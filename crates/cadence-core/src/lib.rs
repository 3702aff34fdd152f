//! Shared types for the Cadence agent.
//!
//! Holds the configuration model (TOML file + `CADENCE_*` env overrides via
//! figment) and the agent-wide error type. The schedule table lives here
//! because it is user-supplied configuration; the machinery that evaluates it
//! is in `cadence-scheduler`.

pub mod config;
pub mod error;

pub use config::{CadenceConfig, JobSpec, ScheduleConfig, Splay};
pub use error::{CadenceError, Result};
