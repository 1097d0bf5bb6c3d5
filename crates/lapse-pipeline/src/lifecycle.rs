//! Start/stop state machine for the capture pipeline.
//!
//! The controller is the only writer of the running flag and the only caller
//! of ensure/pause on the two pipeline jobs, so "running" holds exactly when
//! both jobs are registered and active.

use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use lapse_scheduler::{Job, JobAction, Schedule, SchedulerError, SchedulerHandle};
use tracing::{debug, error, info};

pub const CAPTURE_JOB: &str = "capture_job";
pub const CLEANUP_JOB: &str = "cleanup_job";

pub const STARTED_MESSAGE: &str = "Screenshot taking started";
pub const STOPPED_MESSAGE: &str = "Screenshot taking stopped";

/// Cadence of the two pipeline jobs.
#[derive(Debug, Clone, Copy)]
pub struct LifecyclePlan {
    pub capture_every: Duration,
    pub cleanup_hour: u8,
    pub cleanup_minute: u8,
}

impl Default for LifecyclePlan {
    fn default() -> Self {
        Self {
            capture_every: Duration::from_secs(5),
            cleanup_hour: 23,
            cleanup_minute: 42,
        }
    }
}

impl LifecyclePlan {
    fn validate(&self) -> Result<(), SchedulerError> {
        Schedule::every(self.capture_every).validate()?;
        Schedule::daily(self.cleanup_hour, self.cleanup_minute).validate()
    }
}

pub struct LifecycleController {
    scheduler: SchedulerHandle,
    capture: Arc<dyn JobAction>,
    retention: Arc<dyn JobAction>,
    plan: LifecyclePlan,
    running: Mutex<bool>,
}

impl LifecycleController {
    /// Build a stopped controller. The plan is validated here so that
    /// `start` cannot hit a schedule error later.
    pub fn new(
        scheduler: SchedulerHandle,
        capture: Arc<dyn JobAction>,
        retention: Arc<dyn JobAction>,
        plan: LifecyclePlan,
    ) -> Result<Self, SchedulerError> {
        plan.validate()?;
        Ok(Self {
            scheduler,
            capture,
            retention,
            plan,
            running: Mutex::new(false),
        })
    }

    fn state(&self) -> MutexGuard<'_, bool> {
        self.running.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Create-or-resume both jobs. Idempotent; always returns the confirmation.
    pub fn start(&self) -> &'static str {
        let mut running = self.state();
        if *running {
            debug!("start requested while already running");
            return STARTED_MESSAGE;
        }

        match self.activate() {
            Ok(()) => {
                *running = true;
                info!(
                    capture_every_ms = self.plan.capture_every.as_millis() as u64,
                    cleanup_at = %format!("{:02}:{:02}", self.plan.cleanup_hour, self.plan.cleanup_minute),
                    "capture pipeline started"
                );
            }
            Err(e) => {
                // Keep the flag and the jobs in agreement.
                self.scheduler.pause(CAPTURE_JOB);
                self.scheduler.pause(CLEANUP_JOB);
                error!(error = %e, "capture pipeline failed to start");
            }
        }
        STARTED_MESSAGE
    }

    fn activate(&self) -> Result<(), SchedulerError> {
        self.scheduler.ensure_interval(
            CAPTURE_JOB,
            self.plan.capture_every,
            Arc::clone(&self.capture),
        )?;
        self.scheduler.ensure_daily(
            CLEANUP_JOB,
            self.plan.cleanup_hour,
            self.plan.cleanup_minute,
            Arc::clone(&self.retention),
        )?;
        Ok(())
    }

    /// Pause both jobs (never removes them). Idempotent.
    pub fn stop(&self) -> &'static str {
        let mut running = self.state();
        if !*running {
            debug!("stop requested while already stopped");
            return STOPPED_MESSAGE;
        }

        self.scheduler.pause(CAPTURE_JOB);
        self.scheduler.pause(CLEANUP_JOB);
        *running = false;
        info!("capture pipeline stopped");
        STOPPED_MESSAGE
    }

    pub fn is_running(&self) -> bool {
        *self.state()
    }

    /// Snapshots of whichever pipeline jobs have been registered so far.
    pub fn jobs(&self) -> Vec<Job> {
        [CAPTURE_JOB, CLEANUP_JOB]
            .into_iter()
            .filter_map(|name| self.scheduler.get(name))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lapse_scheduler::{action_fn, BoxError, JobStatus};

    fn noop() -> Arc<dyn JobAction> {
        Arc::new(action_fn(|| async { Ok::<(), BoxError>(()) }))
    }

    fn controller() -> (SchedulerHandle, LifecycleController) {
        let scheduler = SchedulerHandle::new();
        let ctl = LifecycleController::new(
            scheduler.clone(),
            noop(),
            noop(),
            LifecyclePlan::default(),
        )
        .unwrap();
        (scheduler, ctl)
    }

    fn both_active(scheduler: &SchedulerHandle) -> bool {
        [CAPTURE_JOB, CLEANUP_JOB].iter().all(|name| {
            scheduler
                .get(name)
                .is_some_and(|j| j.status == JobStatus::Active)
        })
    }

    #[test]
    fn starts_stopped_with_no_jobs() {
        let (scheduler, ctl) = controller();
        assert!(!ctl.is_running());
        assert!(scheduler.is_empty());
        assert!(ctl.jobs().is_empty());
    }

    #[test]
    fn stop_before_start_is_a_no_op() {
        let (scheduler, ctl) = controller();
        assert_eq!(ctl.stop(), STOPPED_MESSAGE);
        assert!(!ctl.is_running());
        assert!(scheduler.is_empty());
    }

    #[test]
    fn start_registers_both_jobs() {
        let (scheduler, ctl) = controller();
        assert_eq!(ctl.start(), STARTED_MESSAGE);
        assert!(ctl.is_running());
        assert!(both_active(&scheduler));

        let capture = scheduler.get(CAPTURE_JOB).unwrap();
        assert_eq!(capture.schedule, Schedule::Interval { every_ms: 5_000 });
        let cleanup = scheduler.get(CLEANUP_JOB).unwrap();
        assert_eq!(cleanup.schedule, Schedule::daily(23, 42));
    }

    #[test]
    fn start_twice_equals_start_once() {
        let (scheduler, ctl) = controller();
        ctl.start();
        let ids: Vec<_> = ctl.jobs().iter().map(|j| j.id).collect();
        ctl.start();
        assert!(ctl.is_running());
        assert_eq!(scheduler.len(), 2);
        assert_eq!(ids, ctl.jobs().iter().map(|j| j.id).collect::<Vec<_>>());
    }

    #[test]
    fn stop_pauses_without_removing() {
        let (scheduler, ctl) = controller();
        ctl.start();
        ctl.stop();
        assert!(!ctl.is_running());
        assert_eq!(scheduler.len(), 2);
        for job in ctl.jobs() {
            assert_eq!(job.status, JobStatus::Paused);
        }
        ctl.stop();
        assert!(!ctl.is_running());
    }

    #[test]
    fn flag_tracks_last_call_across_cycles() {
        let (scheduler, ctl) = controller();
        ctl.start();
        let ids: Vec<_> = ctl.jobs().iter().map(|j| j.id).collect();

        let calls = [true, false, false, true, true, false, true, false, true];
        for start in calls {
            if start {
                ctl.start();
            } else {
                ctl.stop();
            }
            assert_eq!(ctl.is_running(), start);
            assert_eq!(both_active(&scheduler), start);
            assert_eq!(scheduler.len(), 2);
        }
        assert_eq!(ids, ctl.jobs().iter().map(|j| j.id).collect::<Vec<_>>());
    }

    #[test]
    fn concurrent_starts_register_once() {
        let (scheduler, ctl) = controller();
        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| ctl.start());
            }
        });
        assert!(ctl.is_running());
        assert_eq!(scheduler.len(), 2);
        assert!(both_active(&scheduler));
    }

    #[test]
    fn invalid_plan_is_rejected_up_front() {
        let plan = LifecyclePlan {
            capture_every: Duration::ZERO,
            ..LifecyclePlan::default()
        };
        assert!(LifecycleController::new(SchedulerHandle::new(), noop(), noop(), plan).is_err());

        let plan = LifecyclePlan {
            cleanup_hour: 25,
            ..LifecyclePlan::default()
        };
        assert!(LifecycleController::new(SchedulerHandle::new(), noop(), noop(), plan).is_err());
    }
}
