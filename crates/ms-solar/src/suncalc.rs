//! Sun event times for a date and location
//!
//! Low-precision solar position formulas (about a minute of accuracy), after
//! the astronomy answers at aa.quae.nl. Events that do not occur on a date
//! (polar day or night) are absent from the result.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

const RAD: f64 = PI / 180.0;
const DAY_MS: f64 = 86_400_000.0;
const J1970: f64 = 2_440_588.0;
const J2000: f64 = 2_451_545.0;
const J0: f64 = 0.0009;
/// Obliquity of the earth
const OBLIQUITY: f64 = RAD * 23.4397;

/// A named solar event
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SunEvent {
    SolarNoon,
    Nadir,
    Sunrise,
    Sunset,
    SunriseEnd,
    SunsetStart,
    Dawn,
    Dusk,
    NauticalDawn,
    NauticalDusk,
    NightEnd,
    Night,
    GoldenHourEnd,
    GoldenHour,
}

impl SunEvent {
    pub const ALL: [SunEvent; 14] = [
        SunEvent::SolarNoon,
        SunEvent::Nadir,
        SunEvent::Sunrise,
        SunEvent::Sunset,
        SunEvent::SunriseEnd,
        SunEvent::SunsetStart,
        SunEvent::Dawn,
        SunEvent::Dusk,
        SunEvent::NauticalDawn,
        SunEvent::NauticalDusk,
        SunEvent::NightEnd,
        SunEvent::Night,
        SunEvent::GoldenHourEnd,
        SunEvent::GoldenHour,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SunEvent::SolarNoon => "solarNoon",
            SunEvent::Nadir => "nadir",
            SunEvent::Sunrise => "sunrise",
            SunEvent::Sunset => "sunset",
            SunEvent::SunriseEnd => "sunriseEnd",
            SunEvent::SunsetStart => "sunsetStart",
            SunEvent::Dawn => "dawn",
            SunEvent::Dusk => "dusk",
            SunEvent::NauticalDawn => "nauticalDawn",
            SunEvent::NauticalDusk => "nauticalDusk",
            SunEvent::NightEnd => "nightEnd",
            SunEvent::Night => "night",
            SunEvent::GoldenHourEnd => "goldenHourEnd",
            SunEvent::GoldenHour => "goldenHour",
        }
    }
}

impl fmt::Display for SunEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SunEvent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SunEvent::ALL
            .iter()
            .find(|event| event.as_str() == s)
            .copied()
            .ok_or_else(|| s.to_string())
    }
}

/// Sun altitude (degrees) with the morning and evening event crossing it
const ALTITUDE_EVENTS: [(f64, SunEvent, SunEvent); 6] = [
    (-0.833, SunEvent::Sunrise, SunEvent::Sunset),
    (-0.3, SunEvent::SunriseEnd, SunEvent::SunsetStart),
    (-6.0, SunEvent::Dawn, SunEvent::Dusk),
    (-12.0, SunEvent::NauticalDawn, SunEvent::NauticalDusk),
    (-18.0, SunEvent::NightEnd, SunEvent::Night),
    (6.0, SunEvent::GoldenHourEnd, SunEvent::GoldenHour),
];

/// Event times of one date
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SunTimes {
    times: BTreeMap<SunEvent, DateTime<Utc>>,
}

impl SunTimes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the time of an event
    pub fn with(mut self, event: SunEvent, time: DateTime<Utc>) -> Self {
        self.times.insert(event, time);
        self
    }

    /// Time of an event, `None` if it does not occur
    pub fn get(&self, event: SunEvent) -> Option<DateTime<Utc>> {
        self.times.get(&event).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (SunEvent, DateTime<Utc>)> + '_ {
        self.times.iter().map(|(e, t)| (*e, *t))
    }
}

fn to_days(ms: f64) -> f64 {
    ms / DAY_MS - 0.5 + J1970 - J2000
}

fn from_julian(j: f64) -> Option<DateTime<Utc>> {
    let ms = (j + 0.5 - J1970) * DAY_MS;
    if !ms.is_finite() {
        return None;
    }
    Utc.timestamp_millis_opt(ms.round() as i64).single()
}

fn solar_mean_anomaly(d: f64) -> f64 {
    RAD * (357.5291 + 0.985_600_28 * d)
}

fn ecliptic_longitude(m: f64) -> f64 {
    let center = RAD * (1.9148 * m.sin() + 0.02 * (2.0 * m).sin() + 0.0003 * (3.0 * m).sin());
    let perihelion = RAD * 102.9372;
    m + center + perihelion + PI
}

fn declination(l: f64) -> f64 {
    (OBLIQUITY.sin() * l.sin()).asin()
}

fn approx_transit(ht: f64, lw: f64, n: f64) -> f64 {
    J0 + (ht + lw) / (2.0 * PI) + n
}

fn solar_transit(ds: f64, m: f64, l: f64) -> f64 {
    J2000 + ds + 0.0053 * m.sin() - 0.0069 * (2.0 * l).sin()
}

fn hour_angle(h: f64, phi: f64, dec: f64) -> f64 {
    ((h.sin() - phi.sin() * dec.sin()) / (phi.cos() * dec.cos())).acos()
}

/// Compute the event times of the solar day containing `at`
pub fn get_times(at: DateTime<Utc>, latitude: f64, longitude: f64) -> SunTimes {
    let lw = RAD * -longitude;
    let phi = RAD * latitude;

    let d = to_days(at.timestamp_millis() as f64);
    let n = (d - J0 - lw / (2.0 * PI)).round();
    let ds = approx_transit(0.0, lw, n);

    let m = solar_mean_anomaly(ds);
    let l = ecliptic_longitude(m);
    let dec = declination(l);

    let j_noon = solar_transit(ds, m, l);

    let mut times = SunTimes::new();
    if let Some(t) = from_julian(j_noon) {
        times = times.with(SunEvent::SolarNoon, t);
    }
    if let Some(t) = from_julian(j_noon - 0.5) {
        times = times.with(SunEvent::Nadir, t);
    }

    for (altitude, rise, set) in ALTITUDE_EVENTS {
        let w = hour_angle(altitude * RAD, phi, dec);
        let j_set = solar_transit(approx_transit(w, lw, n), m, l);
        let j_rise = j_noon - (j_set - j_noon);

        if let Some(t) = from_julian(j_rise) {
            times = times.with(rise, t);
        }
        if let Some(t) = from_julian(j_set) {
            times = times.with(set, t);
        }
    }
    times
}
