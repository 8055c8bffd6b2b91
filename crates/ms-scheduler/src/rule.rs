//! Object-style recurrence rules

use ms_core::OneOrMany;

use crate::cron::{
    fold_sunday, CronSchedule, DayMatch, Field, DAY, HOUR, MINUTE, MONTH, SECOND, WEEKDAY,
};
use crate::error::{CronError, CronResult};

/// A recurrence described field by field
///
/// Unset fields match every value, except `second` which defaults to `0`.
/// Months are `1..=12`, weekdays `0..=6` starting on Sunday. When both `date`
/// and `day_of_week` are set, a day must match both.
///
/// ```ignore
/// // 07:30:00 on weekends
/// RecurrenceRule::new().hour(7).minute(30).day_of_week([0, 6])
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecurrenceRule {
    pub second: Option<Vec<u32>>,
    pub minute: Option<Vec<u32>>,
    pub hour: Option<Vec<u32>>,
    pub date: Option<Vec<u32>>,
    pub month: Option<Vec<u32>>,
    pub year: Option<Vec<i32>>,
    pub day_of_week: Option<Vec<u32>>,
}

impl RecurrenceRule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn second(mut self, value: impl Into<OneOrMany<u32>>) -> Self {
        self.second = Some(value.into().into_vec());
        self
    }

    pub fn minute(mut self, value: impl Into<OneOrMany<u32>>) -> Self {
        self.minute = Some(value.into().into_vec());
        self
    }

    pub fn hour(mut self, value: impl Into<OneOrMany<u32>>) -> Self {
        self.hour = Some(value.into().into_vec());
        self
    }

    pub fn date(mut self, value: impl Into<OneOrMany<u32>>) -> Self {
        self.date = Some(value.into().into_vec());
        self
    }

    pub fn month(mut self, value: impl Into<OneOrMany<u32>>) -> Self {
        self.month = Some(value.into().into_vec());
        self
    }

    pub fn year(mut self, value: impl Into<OneOrMany<i32>>) -> Self {
        self.year = Some(value.into().into_vec());
        self
    }

    pub fn day_of_week(mut self, value: impl Into<OneOrMany<u32>>) -> Self {
        self.day_of_week = Some(value.into().into_vec());
        self
    }

    /// Convert into a schedule usable for next-occurrence search
    pub fn to_schedule(&self) -> CronResult<CronSchedule> {
        let seconds = match &self.second {
            Some(values) => mask(&SECOND, values)?,
            None => 1,
        };
        let years = match &self.year {
            Some(values) if values.is_empty() => return Err(CronError::EmptyField("year")),
            other => other.clone(),
        };

        Ok(CronSchedule {
            seconds,
            minutes: optional_mask(&MINUTE, &self.minute)?,
            hours: optional_mask(&HOUR, &self.hour)?,
            days: optional_mask(&DAY, &self.date)?,
            months: optional_mask(&MONTH, &self.month)?,
            weekdays: fold_sunday(optional_mask(&WEEKDAY, &self.day_of_week)?),
            years,
            day_match: DayMatch::Both,
            source: format!("{:?}", self),
        })
    }
}

fn optional_mask(field: &Field, values: &Option<Vec<u32>>) -> CronResult<u64> {
    match values {
        Some(values) => mask(field, values),
        None => Ok(field.full()),
    }
}

fn mask(field: &Field, values: &[u32]) -> CronResult<u64> {
    if values.is_empty() {
        return Err(CronError::EmptyField(field.name));
    }
    values
        .iter()
        .try_fold(0u64, |acc, v| Ok(acc | (1u64 << field.check(*v)?)))
}
