//! Schedule patterns accepted by the time scheduler

use chrono::{DateTime, Local, Utc};
use std::fmt;

use crate::cron::CronSchedule;
use crate::rule::RecurrenceRule;

/// When a scheduled job fires
#[derive(Debug, Clone, PartialEq)]
pub enum SchedulePattern {
    /// A cron expression, fires on every match
    Cron(String),
    /// An absolute instant, fires once
    At(DateTime<Local>),
    /// A recurrence rule, fires on every match
    Rule(RecurrenceRule),
}

/// A pattern after validation
#[derive(Debug, Clone)]
pub(crate) enum Plan {
    Recurring(CronSchedule),
    Once(DateTime<Local>),
}

impl SchedulePattern {
    pub(crate) fn plan(&self) -> Result<Plan, String> {
        match self {
            SchedulePattern::Cron(expr) => CronSchedule::parse(expr)
                .map(Plan::Recurring)
                .map_err(|e| e.to_string()),
            SchedulePattern::At(at) => Ok(Plan::Once(*at)),
            SchedulePattern::Rule(rule) => rule
                .to_schedule()
                .map(Plan::Recurring)
                .map_err(|e| e.to_string()),
        }
    }
}

impl fmt::Display for SchedulePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchedulePattern::Cron(expr) => f.write_str(expr),
            SchedulePattern::At(at) => write!(f, "{}", at.to_rfc3339()),
            SchedulePattern::Rule(rule) => write!(f, "{:?}", rule),
        }
    }
}

impl From<&str> for SchedulePattern {
    fn from(expr: &str) -> Self {
        SchedulePattern::Cron(expr.to_string())
    }
}

impl From<String> for SchedulePattern {
    fn from(expr: String) -> Self {
        SchedulePattern::Cron(expr)
    }
}

impl From<DateTime<Local>> for SchedulePattern {
    fn from(at: DateTime<Local>) -> Self {
        SchedulePattern::At(at)
    }
}

impl From<DateTime<Utc>> for SchedulePattern {
    fn from(at: DateTime<Utc>) -> Self {
        SchedulePattern::At(at.with_timezone(&Local))
    }
}

impl From<RecurrenceRule> for SchedulePattern {
    fn from(rule: RecurrenceRule) -> Self {
        SchedulePattern::Rule(rule)
    }
}

/// One pattern or a list of patterns
pub trait IntoPatterns {
    fn into_patterns(self) -> Vec<SchedulePattern>;
}

macro_rules! single_pattern {
    ($($ty:ty),*) => {
        $(
            impl IntoPatterns for $ty {
                fn into_patterns(self) -> Vec<SchedulePattern> {
                    vec![self.into()]
                }
            }
        )*
    };
}

single_pattern!(
    SchedulePattern,
    &str,
    String,
    DateTime<Local>,
    DateTime<Utc>,
    RecurrenceRule
);

impl<T: Into<SchedulePattern>> IntoPatterns for Vec<T> {
    fn into_patterns(self) -> Vec<SchedulePattern> {
        self.into_iter().map(Into::into).collect()
    }
}

impl<T: Into<SchedulePattern>, const N: usize> IntoPatterns for [T; N] {
    fn into_patterns(self) -> Vec<SchedulePattern> {
        self.into_iter().map(Into::into).collect()
    }
}
