use thiserror::Error;

/// Errors that can occur within the scheduler subsystem.
///
/// These are all configuration errors: the evaluator propagates them instead
/// of recovering. Skip conditions (disabled, window not open) are states on
/// the job record, never errors.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The job's trigger fields are malformed or conflict with each other.
    #[error("Invalid schedule for job {name}: {reason}")]
    InvalidSchedule { name: String, reason: String },

    /// The cron expression did not parse.
    #[error("Invalid cron expression {expr:?}: {source}")]
    InvalidCron {
        expr: String,
        #[source]
        source: cron::error::Error,
    },

    /// A timestamp string matched none of the accepted formats.
    #[error("Unparsable timestamp: {value:?}")]
    InvalidTimestamp { value: String },

    /// No job with the given name exists in the table.
    #[error("Job not found: {name}")]
    JobNotFound { name: String },
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
