//! Time scheduling for mqtt-scripts
//!
//! This crate provides:
//! - [`CronSchedule`]: 5/6-field cron expressions with next-occurrence search
//! - [`RecurrenceRule`]: object-style recurrence (`hour`, `minute`, `day_of_week`, ...)
//! - [`TimeScheduler`]: recurring and one-shot jobs with optional jitter, run
//!   inside the owning unit's isolation boundary

mod cron;
mod error;
mod pattern;
mod rule;
mod scheduler;

pub use cron::CronSchedule;
pub use error::{CronError, CronResult};
pub use pattern::{IntoPatterns, SchedulePattern};
pub use rule::RecurrenceRule;
pub use scheduler::{
    jitter, spawn_after, spawn_once, spawn_recurring, until, JobHandle, ScheduleOptions, TimeScheduler,
};
