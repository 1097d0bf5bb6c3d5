use chrono::{DateTime, Days, Local, NaiveTime, TimeZone, Utc};

use crate::types::Schedule;

/// Compute the next UTC execution time for `schedule` strictly *after* `from`,
/// evaluating daily schedules in the host's local time zone.
pub fn compute_next_run(schedule: &Schedule, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
    compute_next_run_in(schedule, from, &Local)
}

/// Same as [`compute_next_run`] with an explicit zone for `Daily` schedules.
///
/// Returns `None` only when the result is unrepresentable (interval overflow
/// or an out-of-range time of day).
pub fn compute_next_run_in<Tz: TimeZone>(
    schedule: &Schedule,
    from: DateTime<Utc>,
    tz: &Tz,
) -> Option<DateTime<Utc>> {
    match *schedule {
        Schedule::Interval { every_ms } => {
            let period = chrono::Duration::from_std(std::time::Duration::from_millis(every_ms))
                .ok()?;
            from.checked_add_signed(period)
        }

        Schedule::Daily { hour, minute } => {
            let at = NaiveTime::from_hms_opt(hour as u32, minute as u32, 0)?;
            let today = from.with_timezone(tz).date_naive();

            // Today, tomorrow, and one spare day for when a DST gap swallows
            // HH:MM (`earliest()` is None inside a gap).
            (0..=2u64).find_map(|offset| {
                let day = today.checked_add_days(Days::new(offset))?;
                let candidate = tz
                    .from_local_datetime(&day.and_time(at))
                    .earliest()?
                    .with_timezone(&Utc);
                (candidate > from).then_some(candidate)
            })
        }
    }
}

/// Next fire after a due slot has been dispatched at `now`.
///
/// Interval jobs step forward from `due` in whole periods until past `now`,
/// so a late tick neither stretches the period nor queues extra fires.
/// Daily jobs are recomputed from `now`.
pub fn next_slot_after(
    schedule: &Schedule,
    due: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    next_slot_after_in(schedule, due, now, &Local)
}

/// Same as [`next_slot_after`] with an explicit zone for `Daily` schedules.
pub fn next_slot_after_in<Tz: TimeZone>(
    schedule: &Schedule,
    due: DateTime<Utc>,
    now: DateTime<Utc>,
    tz: &Tz,
) -> Option<DateTime<Utc>> {
    match *schedule {
        Schedule::Interval { every_ms } if every_ms > 0 => {
            let late_ms = u64::try_from((now - due).num_milliseconds()).unwrap_or(0);
            let periods = late_ms / every_ms + 1;
            let offset = chrono::Duration::from_std(std::time::Duration::from_millis(
                every_ms.checked_mul(periods)?,
            ))
            .ok()?;
            due.checked_add_signed(offset)
        }
        _ => compute_next_run_in(schedule, now, tz),
    }
}
