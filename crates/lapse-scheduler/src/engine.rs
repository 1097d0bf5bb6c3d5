use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
    time::Duration,
};

use chrono::{DateTime, Utc};
use tokio::{sync::watch, time::MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::{
    action::JobAction,
    error::{Result, SchedulerError},
    schedule::{compute_next_run, next_slot_after},
    types::{Job, JobStatus, Schedule},
};

struct Entry {
    job: Job,
    action: Arc<dyn JobAction>,
}

type Registry = HashMap<String, Entry>;

fn lock(registry: &Mutex<Registry>) -> MutexGuard<'_, Registry> {
    // Entries are updated field by field, so a poisoned registry is still usable.
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Shared handle for job management while the engine loop runs.
///
/// Cheap to clone; every clone addresses the same registry. All methods are
/// synchronous and never wait on job execution.
#[derive(Clone, Default)]
pub struct SchedulerHandle {
    registry: Arc<Mutex<Registry>>,
    next_id: Arc<AtomicU64>,
}

impl SchedulerHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an active interval job named `name`, or resume the existing one.
    ///
    /// An existing job keeps its original schedule and action.
    pub fn ensure_interval(
        &self,
        name: &str,
        period: Duration,
        action: Arc<dyn JobAction>,
    ) -> Result<Job> {
        self.ensure(name, Schedule::every(period), action)
    }

    /// Create an active once-a-day job named `name`, or resume the existing one.
    pub fn ensure_daily(
        &self,
        name: &str,
        hour: u8,
        minute: u8,
        action: Arc<dyn JobAction>,
    ) -> Result<Job> {
        self.ensure(name, Schedule::daily(hour, minute), action)
    }

    fn ensure(&self, name: &str, schedule: Schedule, action: Arc<dyn JobAction>) -> Result<Job> {
        schedule.validate()?;
        let now = Utc::now();
        let mut registry = lock(&self.registry);

        if let Some(entry) = registry.get_mut(name) {
            if resume_entry(&mut entry.job, now) {
                info!(job = %name, next_run = ?entry.job.next_run, "job resumed");
            }
            return Ok(entry.job.clone());
        }

        let job = Job {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            name: name.to_string(),
            schedule,
            status: JobStatus::Active,
            created_at: now,
            last_run: None,
            next_run: compute_next_run(&schedule, now),
            run_count: 0,
            failure_count: 0,
            last_error: None,
            in_flight: false,
        };
        info!(job = %name, %schedule, next_run = ?job.next_run, "job added");
        registry.insert(
            name.to_string(),
            Entry {
                job: job.clone(),
                action,
            },
        );
        Ok(job)
    }

    /// Stop dispatching `name` until resumed. Returns `true` if the job was
    /// active; absent or already-paused jobs are left alone.
    ///
    /// An invocation already in flight is allowed to finish.
    pub fn pause(&self, name: &str) -> bool {
        let mut registry = lock(&self.registry);
        match registry.get_mut(name) {
            Some(entry) if entry.job.status == JobStatus::Active => {
                entry.job.status = JobStatus::Paused;
                entry.job.next_run = None;
                info!(job = %name, "job paused");
                true
            }
            _ => false,
        }
    }

    /// Reactivate a paused job. Returns `true` if the job was paused.
    ///
    /// The next fire is computed from now, so time spent paused is never made
    /// up with a burst of runs.
    pub fn resume(&self, name: &str) -> bool {
        let mut registry = lock(&self.registry);
        match registry.get_mut(name) {
            Some(entry) => {
                let resumed = resume_entry(&mut entry.job, Utc::now());
                if resumed {
                    info!(job = %name, next_run = ?entry.job.next_run, "job resumed");
                }
                resumed
            }
            None => false,
        }
    }

    pub fn exists(&self, name: &str) -> bool {
        lock(&self.registry).contains_key(name)
    }

    /// Remove a job. Returns `JobNotFound` if nothing was registered under `name`.
    pub fn cancel(&self, name: &str) -> Result<()> {
        match lock(&self.registry).remove(name) {
            Some(_) => {
                info!(job = %name, "job cancelled");
                Ok(())
            }
            None => Err(SchedulerError::JobNotFound {
                name: name.to_string(),
            }),
        }
    }

    pub fn get(&self, name: &str) -> Option<Job> {
        lock(&self.registry).get(name).map(|e| e.job.clone())
    }

    /// Return all registered jobs ordered by creation.
    pub fn list_jobs(&self) -> Vec<Job> {
        let mut jobs: Vec<Job> = lock(&self.registry)
            .values()
            .map(|e| e.job.clone())
            .collect();
        jobs.sort_by_key(|j| j.id);
        jobs
    }

    pub fn len(&self) -> usize {
        lock(&self.registry).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn resume_entry(job: &mut Job, now: DateTime<Utc>) -> bool {
    if job.status == JobStatus::Active {
        return false;
    }
    job.status = JobStatus::Active;
    job.next_run = compute_next_run(&job.schedule, now);
    true
}

/// Drives execution of registered jobs at `tick` precision.
pub struct SchedulerEngine {
    handle: SchedulerHandle,
    tick: Duration,
}

impl SchedulerEngine {
    pub fn new(handle: SchedulerHandle, tick: Duration) -> Self {
        Self { handle, tick }
    }

    /// Main event loop. Polls every `tick` until `shutdown` broadcasts `true`.
    ///
    /// Must run inside a Tokio runtime; each invocation is spawned on it.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(tick_ms = self.tick.as_millis() as u64, "scheduler engine started");

        let mut interval = tokio::time::interval(self.tick);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.dispatch_due();
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("scheduler engine shutting down");
                        break;
                    }
                }
            }
        }
    }

    // --- private helpers ---------------------------------------------------

    /// Dispatch every active job whose next_run has arrived. Returns the
    /// number of invocations started.
    fn dispatch_due(&self) -> usize {
        let now = Utc::now();
        let mut registry = lock(&self.handle.registry);
        let mut started = 0;

        for entry in registry.values_mut() {
            let job = &mut entry.job;
            let due = match job.next_run {
                Some(due) if job.status == JobStatus::Active && due <= now => due,
                _ => continue,
            };

            // Advance past now from the due slot: one fire per tick, no drift.
            job.next_run = next_slot_after(&job.schedule, due, now);

            if job.in_flight {
                debug!(job = %job.name, "previous run still in flight, skipping fire");
                continue;
            }

            job.in_flight = true;
            job.last_run = Some(now);
            job.run_count += 1;
            started += 1;

            debug!(job = %job.name, run = job.run_count, "executing job");
            spawn_invocation(
                Arc::clone(&self.handle.registry),
                job.name.clone(),
                job.id,
                Arc::clone(&entry.action),
            );
        }
        started
    }
}

/// Run one invocation on its own task and record the outcome.
///
/// The action runs on a nested task so a panic surfaces here as a `JoinError`
/// instead of tearing down the supervisor.
fn spawn_invocation(
    registry: Arc<Mutex<Registry>>,
    name: String,
    id: u64,
    action: Arc<dyn JobAction>,
) {
    tokio::spawn(async move {
        let started = std::time::Instant::now();
        let outcome = tokio::spawn(async move { action.run().await }).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let failure = match outcome {
            Ok(Ok(())) => {
                debug!(job = %name, elapsed_ms, "job finished");
                None
            }
            Ok(Err(e)) => {
                warn!(job = %name, elapsed_ms, error = %e, "job failed");
                Some(e.to_string())
            }
            Err(e) if e.is_panic() => {
                error!(job = %name, elapsed_ms, "job panicked");
                Some("job panicked".to_string())
            }
            Err(e) => {
                warn!(job = %name, error = %e, "job task cancelled");
                Some(e.to_string())
            }
        };

        let mut registry = lock(&registry);
        // The job may have been cancelled (and possibly re-created) meanwhile.
        if let Some(entry) = registry.get_mut(&name).filter(|e| e.job.id == id) {
            entry.job.in_flight = false;
            if let Some(reason) = failure {
                entry.job.failure_count += 1;
                entry.job.last_error = Some(reason);
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{action_fn, BoxError};
    use std::sync::atomic::AtomicUsize;

    fn counter_action(count: Arc<AtomicUsize>) -> Arc<dyn JobAction> {
        Arc::new(action_fn(move || {
            let count = Arc::clone(&count);
            async move {
                count.fetch_add(1, Ordering::SeqCst);
                Ok::<(), BoxError>(())
            }
        }))
    }

    fn noop() -> Arc<dyn JobAction> {
        counter_action(Arc::new(AtomicUsize::new(0)))
    }

    fn start_engine(handle: &SchedulerHandle, tick_ms: u64) -> watch::Sender<bool> {
        let (tx, rx) = watch::channel(false);
        let engine = SchedulerEngine::new(handle.clone(), Duration::from_millis(tick_ms));
        tokio::spawn(engine.run(rx));
        tx
    }

    async fn sleep_ms(ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    #[test]
    fn ensure_interval_is_idempotent() {
        let handle = SchedulerHandle::new();
        let first = handle
            .ensure_interval("capture_job", Duration::from_secs(5), noop())
            .unwrap();
        for _ in 0..3 {
            let again = handle
                .ensure_interval("capture_job", Duration::from_secs(5), noop())
                .unwrap();
            assert_eq!(again.id, first.id);
        }
        assert_eq!(handle.len(), 1);
        assert_eq!(handle.get("capture_job").unwrap().status, JobStatus::Active);
    }

    #[test]
    fn ensure_resumes_existing_job_and_keeps_its_schedule() {
        let handle = SchedulerHandle::new();
        handle
            .ensure_interval("capture_job", Duration::from_secs(5), noop())
            .unwrap();
        assert!(handle.pause("capture_job"));

        let job = handle
            .ensure_interval("capture_job", Duration::from_secs(60), noop())
            .unwrap();
        assert_eq!(job.status, JobStatus::Active);
        assert_eq!(job.schedule, Schedule::Interval { every_ms: 5_000 });
        assert!(job.next_run.is_some());
    }

    #[test]
    fn ensure_daily_registers_calendar_job() {
        let handle = SchedulerHandle::new();
        let job = handle.ensure_daily("cleanup_job", 23, 42, noop()).unwrap();
        assert_eq!(job.schedule, Schedule::daily(23, 42));
        assert!(job.next_run.unwrap() > job.created_at);
        assert!(handle.exists("cleanup_job"));
    }

    #[test]
    fn invalid_schedules_are_rejected() {
        let handle = SchedulerHandle::new();
        let err = handle
            .ensure_interval("zero", Duration::ZERO, noop())
            .unwrap_err();
        assert!(matches!(err, SchedulerError::InvalidSchedule(_)));
        assert!(handle.ensure_daily("late", 24, 0, noop()).is_err());
        assert!(handle.is_empty());
    }

    #[test]
    fn pause_and_resume_are_no_ops_when_nothing_changes() {
        let handle = SchedulerHandle::new();
        assert!(!handle.pause("missing"));
        assert!(!handle.resume("missing"));

        handle
            .ensure_interval("capture_job", Duration::from_secs(5), noop())
            .unwrap();
        assert!(!handle.resume("capture_job"));
        assert!(handle.pause("capture_job"));
        assert!(!handle.pause("capture_job"));

        let paused = handle.get("capture_job").unwrap();
        assert_eq!(paused.status, JobStatus::Paused);
        assert!(paused.next_run.is_none());

        assert!(handle.resume("capture_job"));
        assert_eq!(handle.get("capture_job").unwrap().status, JobStatus::Active);
    }

    #[test]
    fn cancel_removes_job() {
        let handle = SchedulerHandle::new();
        handle.ensure_daily("cleanup_job", 23, 42, noop()).unwrap();
        handle.cancel("cleanup_job").unwrap();
        assert!(!handle.exists("cleanup_job"));

        let err = handle.cancel("cleanup_job").unwrap_err();
        assert!(matches!(err, SchedulerError::JobNotFound { .. }));
    }

    #[test]
    fn list_jobs_in_creation_order() {
        let handle = SchedulerHandle::new();
        handle
            .ensure_interval("capture_job", Duration::from_secs(5), noop())
            .unwrap();
        handle.ensure_daily("cleanup_job", 23, 42, noop()).unwrap();
        let names: Vec<_> = handle.list_jobs().into_iter().map(|j| j.name).collect();
        assert_eq!(names, vec!["capture_job", "cleanup_job"]);
    }

    #[tokio::test]
    async fn engine_fires_due_jobs_repeatedly() {
        let handle = SchedulerHandle::new();
        let count = Arc::new(AtomicUsize::new(0));
        handle
            .ensure_interval("tick", Duration::from_millis(30), counter_action(count.clone()))
            .unwrap();
        let shutdown = start_engine(&handle, 5);

        sleep_ms(250).await;
        assert!(count.load(Ordering::SeqCst) >= 3);
        assert!(handle.get("tick").unwrap().run_count as usize >= count.load(Ordering::SeqCst));
        let _ = shutdown.send(true);
    }

    #[tokio::test]
    async fn interval_fires_stay_on_their_first_grid() {
        let handle = SchedulerHandle::new();
        handle
            .ensure_interval("grid", Duration::from_millis(50), noop())
            .unwrap();
        let first = handle.get("grid").unwrap().next_run.unwrap();
        let shutdown = start_engine(&handle, 7);

        sleep_ms(400).await;
        let job = handle.get("grid").unwrap();
        let _ = shutdown.send(true);

        assert!(job.run_count >= 3, "got {} runs", job.run_count);
        let offset_ms = (job.next_run.unwrap() - first).num_milliseconds();
        assert!(offset_ms > 0);
        assert_eq!(offset_ms % 50, 0, "next_run drifted off the grid by {offset_ms}ms");
    }

    #[tokio::test]
    async fn paused_job_is_skipped_and_resume_does_not_catch_up() {
        let handle = SchedulerHandle::new();
        let count = Arc::new(AtomicUsize::new(0));
        handle
            .ensure_interval("tick", Duration::from_millis(200), counter_action(count.clone()))
            .unwrap();
        handle.pause("tick");
        let shutdown = start_engine(&handle, 5);

        // Three full periods while paused.
        sleep_ms(650).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);

        handle.resume("tick");
        sleep_ms(50).await;
        assert_eq!(count.load(Ordering::SeqCst), 0, "no catch-up burst on resume");

        sleep_ms(250).await;
        let after = count.load(Ordering::SeqCst);
        assert!(after >= 1 && after <= 2, "got {after} runs");
        let _ = shutdown.send(true);
    }

    #[tokio::test]
    async fn failing_action_keeps_its_schedule() {
        let handle = SchedulerHandle::new();
        let action: Arc<dyn JobAction> = Arc::new(action_fn(|| async {
            Err::<(), BoxError>("upload rejected".into())
        }));
        handle
            .ensure_interval("flaky", Duration::from_millis(20), action)
            .unwrap();
        let shutdown = start_engine(&handle, 5);

        sleep_ms(200).await;
        let job = handle.get("flaky").unwrap();
        assert!(job.run_count >= 2);
        assert!(job.failure_count >= 2);
        assert_eq!(job.last_error.as_deref(), Some("upload rejected"));
        assert_eq!(job.status, JobStatus::Active);
        let _ = shutdown.send(true);
    }

    #[tokio::test]
    async fn panicking_action_does_not_stop_other_jobs() {
        let handle = SchedulerHandle::new();
        let action: Arc<dyn JobAction> = Arc::new(action_fn(|| async {
            if true {
                panic!("frame grab exploded");
            }
            Ok::<(), BoxError>(())
        }));
        let count = Arc::new(AtomicUsize::new(0));
        handle
            .ensure_interval("panics", Duration::from_millis(20), action)
            .unwrap();
        handle
            .ensure_interval("healthy", Duration::from_millis(20), counter_action(count.clone()))
            .unwrap();
        let shutdown = start_engine(&handle, 5);

        sleep_ms(200).await;
        let job = handle.get("panics").unwrap();
        assert!(job.run_count >= 2);
        assert!(job.failure_count >= 2);
        assert!(count.load(Ordering::SeqCst) >= 2);
        let _ = shutdown.send(true);
    }

    #[tokio::test]
    async fn slow_action_never_overlaps_itself() {
        let handle = SchedulerHandle::new();
        let current = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let runs = Arc::new(AtomicUsize::new(0));

        let action: Arc<dyn JobAction> = {
            let (current, peak, runs) = (current.clone(), peak.clone(), runs.clone());
            Arc::new(action_fn(move || {
                let (current, peak, runs) = (current.clone(), peak.clone(), runs.clone());
                async move {
                    let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(80)).await;
                    current.fetch_sub(1, Ordering::SeqCst);
                    runs.fetch_add(1, Ordering::SeqCst);
                    Ok::<(), BoxError>(())
                }
            }))
        };
        handle
            .ensure_interval("slow", Duration::from_millis(15), action)
            .unwrap();
        let shutdown = start_engine(&handle, 5);

        sleep_ms(400).await;
        assert_eq!(peak.load(Ordering::SeqCst), 1);
        assert!(runs.load(Ordering::SeqCst) >= 2);
        let _ = shutdown.send(true);
    }

    #[tokio::test]
    async fn engine_stops_on_shutdown() {
        let handle = SchedulerHandle::new();
        let count = Arc::new(AtomicUsize::new(0));
        handle
            .ensure_interval("tick", Duration::from_millis(20), counter_action(count.clone()))
            .unwrap();

        let (tx, rx) = watch::channel(false);
        let engine = SchedulerEngine::new(handle.clone(), Duration::from_millis(5));
        let task = tokio::spawn(engine.run(rx));
        sleep_ms(60).await;
        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("engine exits")
            .unwrap();
        sleep_ms(30).await;

        let before = count.load(Ordering::SeqCst);
        sleep_ms(100).await;
        assert_eq!(count.load(Ordering::SeqCst), before);
    }
}
