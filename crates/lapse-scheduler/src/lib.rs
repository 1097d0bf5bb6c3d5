//! `lapse-scheduler`: in-process, name-keyed job scheduler on Tokio.
//!
//! # Overview
//!
//! Jobs live in an in-memory registry shared by a cloneable
//! [`engine::SchedulerHandle`] (control side) and the [`engine::SchedulerEngine`]
//! (timeline side). The engine polls the registry on a fixed tick and spawns
//! every due, active job on its own task. A job never overlaps itself: a fire
//! that comes due while the previous invocation is still running is skipped.
//!
//! Jobs are addressed by name. `ensure_*` creates a job on first use and
//! resumes it afterwards, so repeated start requests never duplicate work.
//!
//! # Schedule variants
//!
//! | Variant    | Behaviour                                   |
//! |------------|---------------------------------------------|
//! | `Interval` | Repeat every N milliseconds                 |
//! | `Daily`    | Fire at HH:MM host-local time every day     |

pub mod action;
pub mod engine;
pub mod error;
pub mod schedule;
pub mod types;

pub use action::{action_fn, BoxError, FnAction, JobAction};
pub use engine::{SchedulerEngine, SchedulerHandle};
pub use error::{Result, SchedulerError};
pub use types::{Job, JobStatus, Schedule};
