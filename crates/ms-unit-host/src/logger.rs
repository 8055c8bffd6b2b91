use std::fmt::Display;
use tracing::{debug, error, info, warn};

/// Logger handed to a unit
///
/// Every line is emitted with target `unit` and prefixed with the unit name.
#[derive(Debug, Clone)]
pub struct UnitLogger {
    name: String,
}

impl UnitLogger {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn debug(&self, message: impl Display) {
        debug!(target: "unit", unit = %self.name, "{}: {}", self.name, message);
    }

    pub fn info(&self, message: impl Display) {
        info!(target: "unit", unit = %self.name, "{}: {}", self.name, message);
    }

    pub fn warn(&self, message: impl Display) {
        warn!(target: "unit", unit = %self.name, "{}: {}", self.name, message);
    }

    pub fn error(&self, message: impl Display) {
        error!(target: "unit", unit = %self.name, "{}: {}", self.name, message);
    }
}
