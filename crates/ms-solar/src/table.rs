//! Yesterday/today/tomorrow event table and the per-day firing decision

use chrono::{DateTime, Duration, Local, NaiveDate, NaiveTime, TimeZone, Utc};

use crate::suncalc::{get_times, SunEvent, SunTimes};

/// Within this window an event counts as "now"
const GRACE_MS: i64 = 1000;

/// Sun event times for the day before, the day of and the day after a date
#[derive(Debug, Clone)]
pub struct SunTable {
    today: NaiveDate,
    days: [SunTimes; 3],
}

impl SunTable {
    /// Compute the table around `today`, each day evaluated at local noon
    pub fn compute(today: NaiveDate, latitude: f64, longitude: f64) -> Self {
        let noon = local_noon(today);
        let day = Duration::days(1);
        Self {
            today,
            days: [
                get_times(noon - day, latitude, longitude),
                get_times(noon, latitude, longitude),
                get_times(noon + day, latitude, longitude),
            ],
        }
    }

    /// Build a table from precomputed days
    pub fn from_days(today: NaiveDate, days: [SunTimes; 3]) -> Self {
        Self { today, days }
    }

    /// The date the table is anchored on
    pub fn today(&self) -> NaiveDate {
        self.today
    }

    /// Event time on the day at `offset` (-1, 0, 1) from today
    pub fn get(&self, offset: i32, event: SunEvent) -> Option<DateTime<Utc>> {
        let index = usize::try_from(1 + offset).ok()?;
        self.days.get(index)?.get(event)
    }
}

fn local_noon(date: NaiveDate) -> DateTime<Utc> {
    date.and_hms_opt(12, 0, 0)
        .and_then(|noon| Local.from_local_datetime(&noon).earliest())
        .map(|noon| noon.with_timezone(&Utc))
        .unwrap_or_else(|| {
            Utc.from_utc_datetime(&date.and_time(NaiveTime::default())) + Duration::hours(12)
        })
}

/// What to do with a sun event today
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// The event does not occur on the selected day
    NotToday,
    /// The event passed more than a second ago
    Missed,
    /// Fire right away
    FireNow,
    /// Arm a one-shot timer
    FireAt(DateTime<Local>),
}

/// Decide how to fire `event` relative to `now`
///
/// `shift_secs` moves the event; if that puts it on another calendar day than
/// `now`, the neighbouring day's slot is used instead (tomorrow's if the
/// shifted time has already passed, yesterday's otherwise). The correction is
/// applied at most once. `draw` is a uniform sample in `[0, 1)` scaling the
/// `random_secs` jitter, which is added in whole seconds.
pub fn plan(
    table: &SunTable,
    event: SunEvent,
    shift_secs: f64,
    random_secs: f64,
    now: DateTime<Local>,
    draw: f64,
) -> Decision {
    let shift = Duration::milliseconds((shift_secs * 1000.0).round() as i64);
    let mut offset = 0;
    let mut corrected = false;

    loop {
        let Some(base) = table.get(offset, event) else {
            return Decision::NotToday;
        };
        let at = base.with_timezone(&Local) + shift;

        if !corrected && at.date_naive() != now.date_naive() {
            corrected = true;
            // A shifted time that has already passed belongs to yesterday
            // (sunrise shifted earlier past midnight), so today's occurrence
            // is tomorrow's event with the same shift. Only a time still
            // ahead, on tomorrow's date, falls back to yesterday's event.
            offset = if at < now { 1 } else { -1 };
            continue;
        }

        if (now - at).num_milliseconds() >= GRACE_MS {
            return Decision::Missed;
        }

        let jitter_secs = (random_secs * draw).floor();
        let Some(at) = at.checked_add_signed(Duration::milliseconds((jitter_secs * 1000.0) as i64))
        else {
            return Decision::Missed;
        };
        return if (at - now).num_milliseconds() < GRACE_MS {
            Decision::FireNow
        } else {
            Decision::FireAt(at)
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local(d: u32, h: u32, m: u32, s: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 6, d, h, m, s).single().unwrap()
    }

    fn utc(t: DateTime<Local>) -> DateTime<Utc> {
        t.with_timezone(&Utc)
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 6, 21).unwrap()
    }

    /// Sunrise shortly after midnight, sunset shortly before
    fn table() -> SunTable {
        SunTable::from_days(
            today(),
            [
                SunTimes::new()
                    .with(SunEvent::Sunrise, utc(local(20, 1, 10, 0)))
                    .with(SunEvent::Sunset, utc(local(20, 23, 2, 0))),
                SunTimes::new()
                    .with(SunEvent::Sunrise, utc(local(21, 1, 5, 0)))
                    .with(SunEvent::Sunset, utc(local(21, 23, 0, 0)))
                    .with(SunEvent::SolarNoon, utc(local(21, 12, 0, 0))),
                SunTimes::new()
                    .with(SunEvent::Sunrise, utc(local(22, 1, 0, 0)))
                    .with(SunEvent::Sunset, utc(local(22, 22, 58, 0))),
            ],
        )
    }

    #[test]
    fn test_upcoming_event_arms_timer() {
        let decision = plan(&table(), SunEvent::SolarNoon, 0.0, 0.0, local(21, 8, 0, 0), 0.0);
        assert_eq!(decision, Decision::FireAt(local(21, 12, 0, 0)));
    }

    #[test]
    fn test_shift_is_applied() {
        let decision = plan(&table(), SunEvent::SolarNoon, -1800.0, 0.0, local(21, 8, 0, 0), 0.0);
        assert_eq!(decision, Decision::FireAt(local(21, 11, 30, 0)));
    }

    #[test]
    fn test_grace_window() {
        let t = local(21, 12, 0, 0);
        let decision = plan(
            &table(),
            SunEvent::SolarNoon,
            0.0,
            0.0,
            t + Duration::milliseconds(500),
            0.0,
        );
        assert_eq!(decision, Decision::FireNow);

        let decision = plan(
            &table(),
            SunEvent::SolarNoon,
            0.0,
            0.0,
            t - Duration::milliseconds(500),
            0.0,
        );
        assert_eq!(decision, Decision::FireNow);

        let decision = plan(&table(), SunEvent::SolarNoon, 0.0, 0.0, t + Duration::seconds(5), 0.0);
        assert_eq!(decision, Decision::Missed);
    }

    #[test]
    fn test_jitter_is_forward_whole_seconds() {
        let decision = plan(&table(), SunEvent::SolarNoon, 0.0, 100.0, local(21, 8, 0, 0), 0.505);
        assert_eq!(decision, Decision::FireAt(local(21, 12, 0, 50)));
    }

    #[test]
    fn test_jitter_can_rescue_just_passed_event() {
        let t = local(21, 12, 0, 0);
        let decision = plan(
            &table(),
            SunEvent::SolarNoon,
            0.0,
            60.0,
            t + Duration::milliseconds(200),
            0.5,
        );
        assert_eq!(decision, Decision::FireAt(local(21, 12, 0, 30)));
    }

    #[test]
    fn test_earlier_shift_across_midnight_uses_tomorrow() {
        // Today's sunrise minus 2h is yesterday 23:05 and already past, so
        // tomorrow's sunrise minus 2h (today 23:00) is the one for today.
        let decision = plan(&table(), SunEvent::Sunrise, -7200.0, 0.0, local(21, 0, 30, 0), 0.0);
        assert_eq!(decision, Decision::FireAt(local(21, 23, 0, 0)));
    }

    #[test]
    fn test_later_shift_across_midnight_uses_yesterday() {
        // Today's sunset plus 2h is tomorrow 01:00, so yesterday's sunset
        // plus 2h (today 01:02) is the one for today.
        let decision = plan(&table(), SunEvent::Sunset, 7200.0, 0.0, local(21, 0, 30, 0), 0.0);
        assert_eq!(decision, Decision::FireAt(local(21, 1, 2, 0)));

        let decision = plan(&table(), SunEvent::Sunset, 7200.0, 0.0, local(21, 9, 0, 0), 0.0);
        assert_eq!(decision, Decision::Missed);
    }

    #[test]
    fn test_correction_happens_once() {
        // A full-day shift lands on another day for every slot; the corrected
        // slot is used as-is instead of correcting again.
        let decision = plan(&table(), SunEvent::Sunrise, 86_400.0, 0.0, local(21, 0, 30, 0), 0.0);
        assert_eq!(decision, Decision::FireAt(local(21, 1, 10, 0)));
    }

    #[test]
    fn test_jitter_overflow_is_missed() {
        let decision = plan(&table(), SunEvent::SolarNoon, 0.0, 1e300, local(21, 8, 0, 0), 0.5);
        assert_eq!(decision, Decision::Missed);
    }

    #[test]
    fn test_missing_event() {
        let decision = plan(&table(), SunEvent::Dawn, 0.0, 0.0, local(21, 0, 30, 0), 0.0);
        assert_eq!(decision, Decision::NotToday);

        // Adjacent day lacks the event
        let decision = plan(&table(), SunEvent::SolarNoon, -43_200.0 - 60.0, 0.0, local(21, 8, 0, 0), 0.0);
        assert_eq!(decision, Decision::NotToday);
    }

    #[test]
    fn test_table_offsets() {
        let table = table();
        assert!(table.get(-1, SunEvent::Sunrise).is_some());
        assert!(table.get(2, SunEvent::Sunrise).is_none());
        assert!(table.get(-2, SunEvent::Sunrise).is_none());
        assert_eq!(table.today(), today());
    }

    #[test]
    fn test_compute_spans_three_days() {
        let table = SunTable::compute(today(), 48.7408, 9.1778);
        let yesterday = table.get(-1, SunEvent::SolarNoon).unwrap();
        let now = table.get(0, SunEvent::SolarNoon).unwrap();
        let tomorrow = table.get(1, SunEvent::SolarNoon).unwrap();
        assert!((now - yesterday - Duration::days(1)).num_minutes().abs() < 2);
        assert!((tomorrow - now - Duration::days(1)).num_minutes().abs() < 2);
    }
}
