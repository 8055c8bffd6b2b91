//! Cron expression parser
//!
//! Supports `MIN HOUR DOM MON DOW` and `SEC MIN HOUR DOM MON DOW`.
//! Each field accepts `*`, `N`, `A-B`, lists (`1,15,30`) and steps (`*/5`,
//! `10-40/10`, `5/15`). Months and weekdays also accept three-letter names;
//! weekday `7` is Sunday. When both day-of-month and day-of-week are
//! restricted, a day matches if either does.

use chrono::{DateTime, Datelike, NaiveDate, TimeZone};
use std::fmt;

use crate::error::{CronError, CronResult};

/// Upper bound of the next-occurrence search (covers leap-day-only schedules)
const MAX_SEARCH_DAYS: u32 = 366 * 8;

const MONTH_NAMES: &[&str] = &[
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];
const WEEKDAY_NAMES: &[&str] = &["sun", "mon", "tue", "wed", "thu", "fri", "sat"];

pub(crate) struct Field {
    pub(crate) name: &'static str,
    pub(crate) min: u32,
    pub(crate) max: u32,
    names: &'static [&'static str],
    name_base: u32,
}

pub(crate) const SECOND: Field = Field {
    name: "second",
    min: 0,
    max: 59,
    names: &[],
    name_base: 0,
};
pub(crate) const MINUTE: Field = Field {
    name: "minute",
    min: 0,
    max: 59,
    names: &[],
    name_base: 0,
};
pub(crate) const HOUR: Field = Field {
    name: "hour",
    min: 0,
    max: 23,
    names: &[],
    name_base: 0,
};
pub(crate) const DAY: Field = Field {
    name: "day of month",
    min: 1,
    max: 31,
    names: &[],
    name_base: 0,
};
pub(crate) const MONTH: Field = Field {
    name: "month",
    min: 1,
    max: 12,
    names: MONTH_NAMES,
    name_base: 1,
};
pub(crate) const WEEKDAY: Field = Field {
    name: "day of week",
    min: 0,
    max: 7,
    names: WEEKDAY_NAMES,
    name_base: 0,
};

impl Field {
    /// Bitmask with every allowed value set
    pub(crate) fn full(&self) -> u64 {
        self.range_mask(self.min, self.max, 1)
    }

    fn range_mask(&self, start: u32, end: u32, step: usize) -> u64 {
        (start..=end).step_by(step).fold(0, |mask, v| mask | (1u64 << v))
    }

    /// Check a numeric value against the field range
    pub(crate) fn check(&self, value: u32) -> CronResult<u32> {
        if value < self.min || value > self.max {
            return Err(CronError::OutOfRange {
                field: self.name,
                value,
                min: self.min,
                max: self.max,
            });
        }
        Ok(value)
    }

    fn value(&self, text: &str) -> CronResult<u32> {
        if let Ok(n) = text.parse::<u32>() {
            return self.check(n);
        }
        let lower = text.to_lowercase();
        self.names
            .iter()
            .position(|name| *name == lower)
            .map(|i| i as u32 + self.name_base)
            .ok_or_else(|| CronError::InvalidValue {
                field: self.name,
                value: text.to_string(),
            })
    }

    fn parse(&self, text: &str) -> CronResult<u64> {
        let mut mask = 0u64;
        for item in text.split(',') {
            let (range, step) = match item.split_once('/') {
                Some((range, step)) => {
                    let step = step
                        .parse::<u32>()
                        .ok()
                        .filter(|s| *s > 0)
                        .ok_or_else(|| CronError::InvalidStep {
                            field: self.name,
                            value: item.to_string(),
                        })?;
                    (range, Some(step))
                }
                None => (item, None),
            };

            let (start, end) = if range == "*" {
                (self.min, self.max)
            } else if let Some((a, b)) = range.split_once('-') {
                (self.value(a)?, self.value(b)?)
            } else {
                let v = self.value(range)?;
                (v, if step.is_some() { self.max } else { v })
            };

            if start > end {
                return Err(CronError::InvalidValue {
                    field: self.name,
                    value: item.to_string(),
                });
            }
            mask |= self.range_mask(start, end, step.unwrap_or(1) as usize);
        }
        Ok(mask)
    }
}

/// Fold weekday 7 onto 0 (both mean Sunday)
pub(crate) fn fold_sunday(mask: u64) -> u64 {
    if mask & (1 << 7) != 0 {
        (mask | 1) & !(1 << 7)
    } else {
        mask
    }
}

fn has(mask: u64, value: u32) -> bool {
    mask & (1u64 << value) != 0
}

fn values(mask: u64) -> impl Iterator<Item = u32> {
    (0..64u32).filter(move |v| has(mask, *v))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DayMatch {
    /// Day of month and day of week must both match
    Both,
    /// Either day of month or day of week must match
    Either,
}

/// A parsed recurring schedule
///
/// Produced from a cron expression ([`CronSchedule::parse`]) or from a
/// [`RecurrenceRule`](crate::RecurrenceRule).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronSchedule {
    pub(crate) seconds: u64,
    pub(crate) minutes: u64,
    pub(crate) hours: u64,
    pub(crate) days: u64,
    pub(crate) months: u64,
    pub(crate) weekdays: u64,
    pub(crate) years: Option<Vec<i32>>,
    pub(crate) day_match: DayMatch,
    pub(crate) source: String,
}

impl CronSchedule {
    /// Parse a 5- or 6-field cron expression
    pub fn parse(expression: &str) -> CronResult<Self> {
        let parts: Vec<&str> = expression.split_whitespace().collect();
        let (second, rest) = match parts.len() {
            5 => ("0", &parts[..]),
            6 => (parts[0], &parts[1..]),
            n => return Err(CronError::FieldCount(n)),
        };

        let day_restricted = !rest[2].starts_with('*');
        let weekday_restricted = !rest[4].starts_with('*');

        Ok(Self {
            seconds: SECOND.parse(second)?,
            minutes: MINUTE.parse(rest[0])?,
            hours: HOUR.parse(rest[1])?,
            days: DAY.parse(rest[2])?,
            months: MONTH.parse(rest[3])?,
            weekdays: fold_sunday(WEEKDAY.parse(rest[4])?),
            years: None,
            day_match: if day_restricted && weekday_restricted {
                DayMatch::Either
            } else {
                DayMatch::Both
            },
            source: expression.trim().to_string(),
        })
    }

    /// Whether the schedule has any occurrence on `date`
    pub fn matches_date(&self, date: NaiveDate) -> bool {
        let day = has(self.days, date.day());
        let weekday = has(self.weekdays, date.weekday().num_days_from_sunday());
        let day_ok = match self.day_match {
            DayMatch::Both => day && weekday,
            DayMatch::Either => day || weekday,
        };
        day_ok
            && has(self.months, date.month())
            && self
                .years
                .as_ref()
                .map_or(true, |years| years.contains(&date.year()))
    }

    /// The first occurrence strictly after `after`, in the same time zone
    ///
    /// Local times that do not exist (DST gaps) are skipped; ambiguous local
    /// times resolve to their earlier instant.
    pub fn next_after<Tz: TimeZone>(&self, after: &DateTime<Tz>) -> Option<DateTime<Tz>> {
        let tz = after.timezone();
        let start = after.naive_local();
        let mut date = start.date();

        for _ in 0..MAX_SEARCH_DAYS {
            if self.matches_date(date) {
                for hour in values(self.hours) {
                    for minute in values(self.minutes) {
                        for second in values(self.seconds) {
                            let Some(naive) = date.and_hms_opt(hour, minute, second) else {
                                continue;
                            };
                            if naive < start {
                                continue;
                            }
                            if let Some(candidate) = tz.from_local_datetime(&naive).earliest() {
                                if candidate > *after {
                                    return Some(candidate);
                                }
                            }
                        }
                    }
                }
            }
            date = date.succ_opt()?;
        }
        None
    }
}

impl fmt::Display for CronSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}
