//! Schedule expression errors

use thiserror::Error;

/// Result type for schedule expression parsing
pub type CronResult<T> = Result<T, CronError>;

/// Errors raised while parsing a cron expression or recurrence rule
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CronError {
    #[error("expected 5 or 6 fields, got {0}")]
    FieldCount(usize),

    #[error("invalid {field} value '{value}'")]
    InvalidValue { field: &'static str, value: String },

    #[error("{field} value {value} is outside {min}..={max}")]
    OutOfRange {
        field: &'static str,
        value: u32,
        min: u32,
        max: u32,
    },

    #[error("invalid {field} step in '{value}'")]
    InvalidStep { field: &'static str, value: String },

    #[error("{0} list is empty")]
    EmptyField(&'static str),
}
