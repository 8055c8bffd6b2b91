//! Sun-relative scheduling
//!
//! Every registered sun event is evaluated once per day against a freshly
//! computed [`SunTable`]. A midnight job recomputes the table and evaluates
//! all events again.

use chrono::{DateTime, Local};
use ms_core::{
    validate_delay, ApiError, ApiResult, OneOrMany, TimerHandler, UnitDomain, MAX_SUN_SHIFT_SECS,
};
use ms_scheduler::{spawn_after, spawn_recurring, CronResult, CronSchedule, JobHandle};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tracing::{debug, info, trace};

use crate::suncalc::SunEvent;
use crate::table::{plan, Decision, SunTable};

/// Re-anchor schedule: every local midnight
const MIDNIGHT: &str = "0 0 * * *";

/// Options of a sun schedule
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SunOptions {
    /// Signed offset in seconds applied to the event time
    pub shift: f64,
    /// Upper bound in seconds of a forward random delay
    pub random: f64,
}

impl SunOptions {
    pub fn shift(seconds: f64) -> Self {
        Self {
            shift: seconds,
            ..Self::default()
        }
    }

    pub fn with_random(mut self, seconds: f64) -> Self {
        self.random = seconds;
        self
    }
}

struct Registration {
    event: SunEvent,
    options: SunOptions,
    domain: UnitDomain,
    handler: TimerHandler,
}

/// Source of the current local time
pub type Clock = Arc<dyn Fn() -> DateTime<Local> + Send + Sync>;

/// Registers handlers on solar events
pub struct SolarScheduler {
    latitude: f64,
    longitude: f64,
    clock: Clock,
    table: RwLock<SunTable>,
    events: RwLock<Vec<Arc<Registration>>>,
    timers: Mutex<Vec<JobHandle>>,
}

impl SolarScheduler {
    /// Create a scheduler for a location, with the table computed for today
    pub fn new(latitude: f64, longitude: f64) -> Self {
        let today = Local::now().date_naive();
        Self {
            latitude,
            longitude,
            clock: Arc::new(Local::now),
            table: RwLock::new(SunTable::compute(today, latitude, longitude)),
            events: RwLock::new(Vec::new()),
            timers: Mutex::new(Vec::new()),
        }
    }

    /// Read the time from `clock` instead of the system clock
    ///
    /// The table is recomputed for the clock's date.
    pub fn with_clock(
        mut self,
        clock: impl Fn() -> DateTime<Local> + Send + Sync + 'static,
    ) -> Self {
        self.clock = Arc::new(clock);
        let today = (self.clock)().date_naive();
        self.table = RwLock::new(SunTable::compute(today, self.latitude, self.longitude));
        self
    }

    /// Current event table
    pub fn table(&self) -> SunTable {
        self.table.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Number of registered sun events
    pub fn event_count(&self) -> usize {
        self.events.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Register `handler` on one or more named events
    ///
    /// All names and options are validated before anything is registered.
    /// Each event is evaluated for today immediately.
    pub fn sun_schedule(
        &self,
        domain: &UnitDomain,
        names: impl Into<OneOrMany<String>>,
        options: SunOptions,
        handler: TimerHandler,
    ) -> ApiResult<()> {
        let names = names.into();
        if names.is_empty() {
            return Err(ApiError::PatternMissing);
        }
        if !options.shift.is_finite() || options.shift.abs() > MAX_SUN_SHIFT_SECS {
            return Err(ApiError::ShiftOutOfRange(options.shift));
        }
        validate_delay("random", options.random)?;
        if options.random > MAX_SUN_SHIFT_SECS {
            return Err(ApiError::RandomOutOfRange(options.random));
        }

        let events = names
            .into_iter()
            .map(|name| name.parse::<SunEvent>().map_err(ApiError::UnknownSunEvent))
            .collect::<ApiResult<Vec<_>>>()?;

        let registrations: Vec<Arc<Registration>> = events
            .into_iter()
            .map(|event| {
                debug!(
                    unit = %domain.name(),
                    event = %event,
                    shift = options.shift,
                    "Registering sun event"
                );
                Arc::new(Registration {
                    event,
                    options,
                    domain: domain.clone(),
                    handler: handler.clone(),
                })
            })
            .collect();
        self.events
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .extend(registrations.iter().cloned());

        for registration in &registrations {
            self.evaluate(registration);
        }
        Ok(())
    }

    /// Decide today's firing of one registration inside its unit's domain
    fn evaluate(&self, registration: &Registration) {
        let table = self.table();
        let now = (self.clock)();
        registration.domain.run("sunSchedule", || {
            let decision = plan(
                &table,
                registration.event,
                registration.options.shift,
                registration.options.random,
                now,
                rand::random::<f64>(),
            );
            trace!(unit = %registration.domain.name(), event = %registration.event, ?decision, "Evaluated sun event");

            match decision {
                Decision::NotToday | Decision::Missed => {}
                Decision::FireNow => {
                    registration.domain.run("sunSchedule", || (registration.handler)());
                }
                Decision::FireAt(at) => {
                    let delay = (at - now).to_std().unwrap_or(Duration::ZERO);
                    let domain = registration.domain.clone();
                    let handler = registration.handler.clone();
                    let timer = spawn_after(delay, move || {
                        domain.run("sunSchedule", || handler());
                    });
                    self.timers
                        .lock()
                        .unwrap_or_else(|e| e.into_inner())
                        .push(timer);
                }
            }
            Ok(())
        });
    }

    /// Recompute the table for the current date and evaluate every event
    ///
    /// Returns the number of events evaluated.
    pub fn reanchor(&self) -> usize {
        let today = (self.clock)().date_naive();
        *self.table.write().unwrap_or_else(|e| e.into_inner()) =
            SunTable::compute(today, self.latitude, self.longitude);
        self.timers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .retain(|timer| !timer.is_finished());

        let events = self.events.read().unwrap_or_else(|e| e.into_inner()).clone();
        for registration in &events {
            self.evaluate(registration);
        }
        info!("re-scheduled {} sun events", events.len());
        events.len()
    }

    /// Run [`reanchor`](Self::reanchor) every local midnight
    pub fn start_midnight_job(self: &Arc<Self>) -> CronResult<JobHandle> {
        let schedule = CronSchedule::parse(MIDNIGHT)?;
        let scheduler = Arc::clone(self);
        Ok(spawn_recurring(schedule, move || {
            scheduler.reanchor();
        }))
    }

    /// Cancel all armed timers
    pub fn shutdown(&self) {
        let timers = std::mem::take(&mut *self.timers.lock().unwrap_or_else(|e| e.into_inner()));
        for timer in timers {
            timer.cancel();
        }
    }
}
