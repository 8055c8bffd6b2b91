//! Execution unit host for mqtt-scripts
//!
//! This crate provides:
//! - [`AutomationUnit`] / [`FnUnit`]: the shape of a loadable unit
//! - [`UnitHost`]: per-unit isolation and top-level execution
//! - [`UnitApi`]: subscribe, schedule, sun_schedule, publish, state access,
//!   timers, logging and `require`
//! - The helper library (`link`, `combine_*`, `timer`) on [`UnitApi`]
//! - [`Globals`]: a store shared across units, reached through [`UnitApi::global`]

mod api;
mod error;
mod host;
mod logger;
mod modules;
mod stdlib;
mod unit;

pub use api::{Globals, HostContext, UnitApi};
pub use error::{HostError, HostResult, ModuleError, ModuleResult};
pub use host::UnitHost;
pub use logger::UnitLogger;
pub use modules::{Module, ModuleCache};
pub use stdlib::{LinkValue, TimerOptions};
pub use unit::{AutomationUnit, FnUnit};
