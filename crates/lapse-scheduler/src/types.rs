use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SchedulerError};

/// Defines when and how often a job should run. Fixed for the life of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Schedule {
    /// Run repeatedly with a fixed period in milliseconds.
    Interval { every_ms: u64 },

    /// Run every day at the given hour and minute (host-local time).
    Daily { hour: u8, minute: u8 },
}

impl Schedule {
    pub fn every(period: Duration) -> Self {
        Schedule::Interval {
            every_ms: u64::try_from(period.as_millis()).unwrap_or(u64::MAX),
        }
    }

    pub fn daily(hour: u8, minute: u8) -> Self {
        Schedule::Daily { hour, minute }
    }

    /// Reject definitions that could never fire.
    pub fn validate(&self) -> Result<()> {
        match *self {
            Schedule::Interval { every_ms: 0 } => Err(SchedulerError::InvalidSchedule(
                "interval period must be non-zero".to_string(),
            )),
            Schedule::Interval { .. } => Ok(()),
            Schedule::Daily { hour, minute } if hour > 23 || minute > 59 => {
                Err(SchedulerError::InvalidSchedule(format!(
                    "{hour:02}:{minute:02} is not a time of day"
                )))
            }
            Schedule::Daily { .. } => Ok(()),
        }
    }
}

impl std::fmt::Display for Schedule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Schedule::Interval { every_ms } => write!(f, "every {every_ms}ms"),
            Schedule::Daily { hour, minute } => write!(f, "daily at {hour:02}:{minute:02}"),
        }
    }
}

/// Whether the engine considers a registered job for dispatch.
///
/// A job that is not in the registry at all is "absent"; there is no variant
/// for that state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Fires whenever its next_run arrives.
    Active,
    /// Skipped on every tick until resumed.
    Paused,
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobStatus::Active => "active",
            JobStatus::Paused => "paused",
        };
        write!(f, "{s}")
    }
}

/// Snapshot of a registered job's metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Registry-assigned identifier, unique for the life of the process.
    /// A job cancelled and re-created under the same name gets a new id.
    pub id: u64,
    /// Unique name the job is addressed by.
    pub name: String,
    pub schedule: Schedule,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    /// Start of the most recent dispatched invocation, if any.
    pub last_run: Option<DateTime<Utc>>,
    /// Next planned fire. `None` while paused.
    pub next_run: Option<DateTime<Utc>>,
    /// Invocations dispatched so far.
    pub run_count: u64,
    /// Invocations that returned an error or panicked.
    pub failure_count: u64,
    pub last_error: Option<String>,
    /// True while an invocation is executing.
    pub in_flight: bool,
}
