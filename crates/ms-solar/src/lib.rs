//! Solar events for mqtt-scripts
//!
//! - [`get_times`]: sunrise, sunset, twilight and golden-hour times for a date
//! - [`SunTable`]: the yesterday/today/tomorrow table and the per-day [`plan`]
//! - [`SolarScheduler`]: sun-relative handlers with shift, jitter and midnight
//!   re-anchoring

mod scheduler;
mod suncalc;
mod table;

pub use scheduler::{Clock, SolarScheduler, SunOptions};
pub use suncalc::{get_times, SunEvent, SunTimes};
pub use table::{plan, Decision, SunTable};
