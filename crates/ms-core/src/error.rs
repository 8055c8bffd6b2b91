//! Argument errors raised synchronously by the unit API

use thiserror::Error;

/// Result type for unit API calls
pub type ApiResult<T> = Result<T, ApiError>;

/// Errors returned to a unit when an API call is invalid
///
/// These are raised at the call site; the owning unit's domain reports them
/// if the unit lets them escape.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ApiError {
    #[error("argument topic missing")]
    TopicMissing,

    #[error("invalid topic '{topic}': {reason}")]
    InvalidTopic { topic: String, reason: &'static str },

    #[error("argument pattern missing")]
    PatternMissing,

    #[error("options.condition string must be one-line")]
    MultiLineCondition,

    #[error("invalid condition expression '{expression}': {message}")]
    InvalidCondition { expression: String, message: String },

    #[error("unknown sun event {0}")]
    UnknownSunEvent(String),

    #[error("options.shift out of range: {0}")]
    ShiftOutOfRange(f64),

    #[error("options.random out of range: {0}")]
    RandomOutOfRange(f64),

    #[error("options.{option} must be a finite, non-negative number of seconds: {value}")]
    InvalidDelay { option: &'static str, value: f64 },

    #[error("invalid schedule pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("payload could not be serialized: {0}")]
    Serialize(String),

    #[error("publisher is closed")]
    PublisherClosed,
}

/// Check a delay option in seconds: finite and not negative
pub fn validate_delay(option: &'static str, value: f64) -> ApiResult<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(ApiError::InvalidDelay { option, value });
    }
    Ok(())
}
