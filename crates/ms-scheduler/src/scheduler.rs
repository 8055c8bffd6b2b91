//! Time scheduler
//!
//! Recurring jobs run as one task each: compute the next occurrence against
//! the wall clock, sleep until then, fire, repeat. One-shot jobs sleep once.
//! Handlers run inside the owning unit's [`UnitDomain`].

use chrono::{DateTime, Local};
use ms_core::{validate_delay, ApiError, ApiResult, TimerHandler, UnitDomain};
use std::sync::Mutex;
use std::time::{Duration, TryFromFloatSecsError};
use tokio::task::AbortHandle;
use tracing::{debug, trace, warn};

use crate::cron::CronSchedule;
use crate::pattern::{IntoPatterns, Plan};

/// Options of a time schedule
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ScheduleOptions {
    /// Upper bound in seconds of a random delay drawn before every firing
    pub random: f64,
}

impl ScheduleOptions {
    pub fn random(seconds: f64) -> Self {
        Self { random: seconds }
    }
}

/// Handle of a scheduled job or timer
#[derive(Debug, Clone)]
pub struct JobHandle {
    abort: Option<AbortHandle>,
}

impl JobHandle {
    /// Wrap the abort handle of a spawned task
    pub fn new(abort: AbortHandle) -> Self {
        Self { abort: Some(abort) }
    }

    /// A handle for a job that will never fire
    pub fn inert() -> Self {
        Self { abort: None }
    }

    /// Stop the job; a firing already in progress completes
    pub fn cancel(&self) {
        if let Some(abort) = &self.abort {
            abort.abort();
        }
    }

    /// Whether the job can no longer fire
    pub fn is_finished(&self) -> bool {
        self.abort.as_ref().map_or(true, AbortHandle::is_finished)
    }
}

/// Uniform random delay in `[0, random_secs)`; zero when `random_secs <= 0`
///
/// Fails when the drawn delay does not fit a [`Duration`].
pub fn jitter(random_secs: f64) -> Result<Duration, TryFromFloatSecsError> {
    if random_secs > 0.0 {
        Duration::try_from_secs_f64(rand::random::<f64>() * random_secs)
    } else {
        Ok(Duration::ZERO)
    }
}

/// Time until `at`, zero if already past
pub fn until(at: DateTime<Local>) -> Duration {
    (at - Local::now()).to_std().unwrap_or(Duration::ZERO)
}

/// Run `tick` on every occurrence of `schedule`
pub fn spawn_recurring<F>(schedule: CronSchedule, mut tick: F) -> JobHandle
where
    F: FnMut() + Send + 'static,
{
    let task = tokio::spawn(async move {
        let mut last = Local::now();
        loop {
            let from = Local::now().max(last);
            let Some(next) = schedule.next_after(&from) else {
                debug!(schedule = %schedule, "Schedule has no further occurrences");
                break;
            };
            trace!(schedule = %schedule, next = %next, "Waiting for next occurrence");
            tokio::time::sleep(until(next)).await;
            last = next;
            tick();
        }
    });
    JobHandle::new(task.abort_handle())
}

/// Run `tick` once at `at`
pub fn spawn_once<F>(at: DateTime<Local>, tick: F) -> JobHandle
where
    F: FnOnce() + Send + 'static,
{
    spawn_after(until(at), tick)
}

/// Run `tick` once after `delay`
pub fn spawn_after<F>(delay: Duration, tick: F) -> JobHandle
where
    F: FnOnce() + Send + 'static,
{
    let task = tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        tick();
    });
    JobHandle::new(task.abort_handle())
}

/// Registers time-based jobs for units
#[derive(Default)]
pub struct TimeScheduler {
    jobs: Mutex<Vec<JobHandle>>,
}

impl TimeScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `handler` on every pattern
    ///
    /// All patterns are validated before any job is registered.
    pub fn schedule(
        &self,
        domain: &UnitDomain,
        patterns: impl IntoPatterns,
        options: ScheduleOptions,
        handler: TimerHandler,
    ) -> ApiResult<Vec<JobHandle>> {
        let patterns = patterns.into_patterns();
        if patterns.is_empty() {
            return Err(ApiError::PatternMissing);
        }
        validate_delay("random", options.random)?;

        let plans = patterns
            .iter()
            .map(|pattern| {
                pattern.plan().map_err(|message| ApiError::InvalidPattern {
                    pattern: pattern.to_string(),
                    message,
                })
            })
            .collect::<ApiResult<Vec<Plan>>>()?;

        let mut handles = Vec::with_capacity(plans.len());
        for plan in plans {
            let handle = match plan {
                Plan::Recurring(schedule) => {
                    debug!(unit = %domain.name(), schedule = %schedule, "Scheduling recurring job");
                    let domain = domain.clone();
                    let handler = handler.clone();
                    spawn_recurring(schedule, move || fire(&domain, &handler, options.random))
                }
                Plan::Once(at) if at <= Local::now() => {
                    warn!(unit = %domain.name(), at = %at, "Schedule date is in the past, it will not fire");
                    JobHandle::inert()
                }
                Plan::Once(at) => {
                    debug!(unit = %domain.name(), at = %at, "Scheduling one-shot job");
                    let domain = domain.clone();
                    let handler = handler.clone();
                    spawn_once(at, move || fire(&domain, &handler, options.random))
                }
            };
            handles.push(handle);
        }

        let mut jobs = self.jobs.lock().unwrap_or_else(|e| e.into_inner());
        jobs.retain(|job| !job.is_finished());
        jobs.extend(handles.iter().filter(|job| !job.is_finished()).cloned());
        Ok(handles)
    }

    /// Number of job handles currently tracked
    pub fn tracked_jobs(&self) -> usize {
        self.jobs.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Number of jobs that can still fire
    pub fn active_jobs(&self) -> usize {
        self.jobs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|job| !job.is_finished())
            .count()
    }

    /// Cancel every job
    pub fn shutdown(&self) {
        let jobs = std::mem::take(&mut *self.jobs.lock().unwrap_or_else(|e| e.into_inner()));
        debug!(count = jobs.len(), "Cancelling scheduled jobs");
        for job in jobs {
            job.cancel();
        }
    }
}

fn fire(domain: &UnitDomain, handler: &TimerHandler, random: f64) {
    if random > 0.0 {
        let handler = handler.clone();
        domain.spawn("schedule", async move {
            tokio::time::sleep(jitter(random)?).await;
            handler()
        });
    } else {
        domain.run("schedule", || handler());
    }
}
