//! Wall-clock helpers for a single local workday.

use chrono::{DateTime, Duration, Local, NaiveDate, NaiveTime, TimeZone, Timelike, Utc};

use crate::error::{PlanError, Result};

/// Parse a 24-hour `HH:MM` string.
pub fn parse_hhmm(s: &str) -> Result<NaiveTime> {
    let (hh, mm) = s
        .trim()
        .split_once(':')
        .ok_or_else(|| PlanError::InvalidTime(s.to_string()))?;
    let hour: u32 = hh.parse().map_err(|_| PlanError::InvalidTime(s.to_string()))?;
    let minute: u32 = mm.parse().map_err(|_| PlanError::InvalidTime(s.to_string()))?;
    NaiveTime::from_hms_opt(hour, minute, 0).ok_or_else(|| PlanError::InvalidTime(s.to_string()))
}

/// Minutes from `start` to `end`. An `end` at or before `start` wraps past midnight.
pub fn minutes_between(start: NaiveTime, end: NaiveTime) -> i64 {
    let delta = (end - start).num_minutes();
    if delta <= 0 { delta + 24 * 60 } else { delta }
}

/// Add minutes, wrapping at midnight and truncating to the minute.
pub fn add_minutes(t: NaiveTime, minutes: i64) -> NaiveTime {
    let (shifted, _) = t.overflowing_add_signed(Duration::minutes(minutes));
    shifted
        .with_second(0)
        .and_then(|x| x.with_nanosecond(0))
        .unwrap_or(shifted)
}

pub fn fmt_hhmm(t: NaiveTime) -> String {
    t.format("%H:%M").to_string()
}

/// Local midnight at the start of `day`, as UTC.
pub fn local_day_start_utc(day: NaiveDate) -> DateTime<Utc> {
    let midnight = day.and_time(NaiveTime::MIN);
    Local
        .from_local_datetime(&midnight)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&midnight))
}
