//! Crate-wide error type.

use thiserror::Error;

use crate::key::Key;

/// Every failure mode the facade can surface.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("object already exists: {0}")]
    ObjectAlreadyExists(Key),

    #[error("job not found: {0}")]
    JobNotFound(Key),

    #[error("trigger not found: {0}")]
    TriggerNotFound(Key),

    #[error("calendar not found: {0}")]
    CalendarNotFound(String),

    #[error("job store error: {0}")]
    JobPersistence(String),

    #[error("unable to interrupt job: {0}")]
    UnableToInterruptJob(String),

    #[error("invalid scheduler configuration: {0}")]
    SchedulerConfig(String),

    #[error("invalid cron expression {expr:?}: {source}")]
    InvalidCronExpression {
        expr: String,
        #[source]
        source: cron::error::Error,
    },

    #[error("job execution failed: {0}")]
    JobExecution(#[from] JobExecutionError),

    #[error("scheduler has not been started")]
    SchedulerNotStarted,

    #[error("scheduler has been shut down")]
    SchedulerShutdown,

    #[error("I/O error reading scheduler configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse scheduler configuration: {0}")]
    TomlDecode(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, SchedulerError>;

/// Error thrown from inside a job's `execute`.
///
/// Carries the same two recovery flags as the distilled specification so the
/// store can decide what to do with the firing trigger once the error has
/// been delivered to listeners.
#[derive(Debug, Error, Clone)]
#[error("{message}")]
pub struct JobExecutionError {
    pub message: String,
    pub unschedule_firing_trigger: bool,
    pub refire_immediately: bool,
}

impl JobExecutionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            unschedule_firing_trigger: false,
            refire_immediately: false,
        }
    }

    pub fn unschedule_firing_trigger(mut self) -> Self {
        self.unschedule_firing_trigger = true;
        self
    }

    pub fn refire_immediately(mut self) -> Self {
        self.refire_immediately = true;
        self
    }
}
