//! Time types for calendar events.
//!
//! This module provides [`EventTime`] for representing event start/end times
//! (which may be either a specific datetime or an all-day date), and
//! [`DayWindow`] for the `[start, end)` range of one local calendar day.

use chrono::{
    DateTime, Duration, FixedOffset, Local, NaiveDate, NaiveTime, Offset, TimeZone, Utc,
};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Represents the time of a calendar event.
///
/// Calendar events can have two types of times:
/// - **DateTime**: A specific point in time (with timezone, stored as UTC)
/// - **AllDay**: A date without a specific time (all-day events)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum EventTime {
    /// A specific datetime, stored in UTC.
    DateTime(DateTime<Utc>),
    /// An all-day event date (no specific time).
    AllDay(NaiveDate),
}

impl EventTime {
    /// Creates a new `EventTime::DateTime` from a datetime in any timezone.
    pub fn from_local<Tz: TimeZone>(dt: DateTime<Tz>) -> Self {
        Self::DateTime(dt.with_timezone(&Utc))
    }

    /// Creates a new `EventTime::AllDay` from a date.
    pub fn from_date(date: NaiveDate) -> Self {
        Self::AllDay(date)
    }

    /// Returns `true` if this is an all-day event time.
    pub fn is_all_day(&self) -> bool {
        matches!(self, Self::AllDay(_))
    }

    /// Converts to a UTC datetime for comparison purposes.
    ///
    /// For all-day events, returns midnight UTC on that date.
    pub fn to_utc_datetime(&self) -> DateTime<Utc> {
        match self {
            Self::DateTime(dt) => *dt,
            Self::AllDay(date) => date.and_time(NaiveTime::MIN).and_utc(),
        }
    }

    /// Formats the time of day in the given timezone, or `"all day"`.
    pub fn display_in<Tz: TimeZone>(&self, tz: &Tz) -> String
    where
        Tz::Offset: std::fmt::Display,
    {
        match self {
            Self::DateTime(dt) => dt.with_timezone(tz).format("%H:%M").to_string(),
            Self::AllDay(_) => "all day".to_string(),
        }
    }
}

impl PartialOrd for EventTime {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for EventTime {
    fn cmp(&self, other: &Self) -> Ordering {
        self.to_utc_datetime().cmp(&other.to_utc_datetime())
    }
}

/// The `[start, end)` range of one local calendar day.
///
/// Both endpoints are local midnights carrying the zone's UTC offset at that
/// instant. On a DST transition day the two offsets differ, so the absolute
/// span is 23 or 25 hours while the local span stays 24 hours.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayWindow {
    /// The calendar date this window covers.
    pub date: NaiveDate,
    /// Local midnight at the start of `date` (inclusive).
    pub start: DateTime<FixedOffset>,
    /// Local midnight at the start of the following date (exclusive).
    pub end: DateTime<FixedOffset>,
}

impl DayWindow {
    /// Creates the window for `date` in the given timezone.
    ///
    /// Returns `None` at the edges of the representable calendar, where the
    /// following midnight cannot be expressed.
    pub fn for_date<Tz: TimeZone>(date: NaiveDate, tz: &Tz) -> Option<Self> {
        let next = date.succ_opt()?;
        Some(Self {
            date,
            start: local_midnight(date, tz)?,
            end: local_midnight(next, tz)?,
        })
    }

    /// Creates the window for today in the system's local timezone.
    pub fn today() -> Option<Self> {
        Self::for_date(Local::now().date_naive(), &Local)
    }

    /// Returns the absolute duration of this window.
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Returns the span measured on the local wall clock.
    pub fn local_span(&self) -> Duration {
        self.end.naive_local() - self.start.naive_local()
    }

    /// Checks if an instant falls within this window (half-open).
    pub fn contains(&self, dt: DateTime<Utc>) -> bool {
        self.start <= dt && dt < self.end
    }
}

/// Resolves local midnight of `date` to an offset-aware instant.
///
/// An ambiguous midnight resolves to the earliest instant. A midnight that
/// falls inside a DST gap resolves to the end of the gap.
fn local_midnight<Tz: TimeZone>(date: NaiveDate, tz: &Tz) -> Option<DateTime<FixedOffset>> {
    let naive = date.and_time(NaiveTime::MIN);
    if let Some(dt) = tz.from_local_datetime(&naive).earliest() {
        return Some(dt.fixed_offset());
    }

    let before = naive
        .checked_sub_signed(Duration::hours(24))
        .and_then(|day_before| tz.from_local_datetime(&day_before).earliest())
        .map(|dt| dt.offset().fix())
        .unwrap_or_else(|| Utc.fix());
    let transition =
        naive.checked_sub_signed(Duration::seconds(i64::from(before.local_minus_utc())))?;
    Some(tz.from_utc_datetime(&transition).fixed_offset())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Timelike, TimeZone};

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    mod event_time {
        use super::*;

        #[test]
        fn to_utc_datetime() {
            let dt = utc(2025, 2, 5, 10, 30, 0);
            assert_eq!(EventTime::DateTime(dt).to_utc_datetime(), dt);

            let et_ad = EventTime::from_date(date(2025, 2, 5));
            assert_eq!(et_ad.to_utc_datetime(), utc(2025, 2, 5, 0, 0, 0));
        }

        #[test]
        fn from_local_converts_to_utc() {
            let offset = FixedOffset::east_opt(2 * 3600).unwrap();
            let local = offset.with_ymd_and_hms(2025, 2, 5, 12, 0, 0).unwrap();
            assert_eq!(
                EventTime::from_local(local),
                EventTime::DateTime(utc(2025, 2, 5, 10, 0, 0))
            );
        }

        #[test]
        fn ordering() {
            let et1 = EventTime::DateTime(utc(2025, 2, 5, 10, 0, 0));
            let et2 = EventTime::DateTime(utc(2025, 2, 5, 11, 0, 0));
            let et3 = EventTime::from_date(date(2025, 2, 5));

            assert!(et3 < et1);
            assert!(et1 < et2);
        }

        #[test]
        fn display_in_timezone() {
            let et = EventTime::DateTime(utc(2025, 2, 5, 10, 30, 0));
            assert_eq!(et.display_in(&Utc), "10:30");
            let plus_one = FixedOffset::east_opt(3600).unwrap();
            assert_eq!(et.display_in(&plus_one), "11:30");
            assert_eq!(EventTime::from_date(date(2025, 2, 5)).display_in(&Utc), "all day");
        }

        #[test]
        fn serde_roundtrip() {
            let et_dt = EventTime::DateTime(utc(2025, 2, 5, 10, 30, 0));
            let json = serde_json::to_string(&et_dt).unwrap();
            let parsed: EventTime = serde_json::from_str(&json).unwrap();
            assert_eq!(et_dt, parsed);
        }
    }

    mod day_window {
        use super::*;
        use chrono_tz::America::{New_York, Santiago};
        use chrono_tz::Europe::Berlin;

        #[test]
        fn utc_day() {
            let window = DayWindow::for_date(date(2025, 2, 5), &Utc).unwrap();
            assert_eq!(window.start, utc(2025, 2, 5, 0, 0, 0));
            assert_eq!(window.end, utc(2025, 2, 6, 0, 0, 0));
            assert_eq!(window.duration(), Duration::hours(24));
            assert_eq!(window.local_span(), Duration::hours(24));
        }

        #[test]
        fn fixed_offset_keeps_offset_on_both_ends() {
            let tz = FixedOffset::east_opt(-7 * 3600).unwrap();
            let window = DayWindow::for_date(date(2025, 6, 1), &tz).unwrap();
            assert_eq!(window.start.to_rfc3339(), "2025-06-01T00:00:00-07:00");
            assert_eq!(window.end.to_rfc3339(), "2025-06-02T00:00:00-07:00");
        }

        #[test]
        fn spring_forward_day() {
            let window = DayWindow::for_date(date(2024, 3, 10), &New_York).unwrap();
            assert_eq!(window.start.to_rfc3339(), "2024-03-10T00:00:00-05:00");
            assert_eq!(window.end.to_rfc3339(), "2024-03-11T00:00:00-04:00");
            assert_eq!(window.local_span(), Duration::hours(24));
            assert_eq!(window.duration(), Duration::hours(23));
        }

        #[test]
        fn fall_back_day() {
            let window = DayWindow::for_date(date(2024, 10, 27), &Berlin).unwrap();
            assert_eq!(window.start.to_rfc3339(), "2024-10-27T00:00:00+02:00");
            assert_eq!(window.end.to_rfc3339(), "2024-10-28T00:00:00+01:00");
            assert_eq!(window.local_span(), Duration::hours(24));
            assert_eq!(window.duration(), Duration::hours(25));
        }

        #[test]
        fn midnight_inside_gap_moves_to_end_of_gap() {
            // Chile skipped 00:00-01:00 local on 2024-09-08.
            let window = DayWindow::for_date(date(2024, 9, 8), &Santiago).unwrap();
            assert_eq!(window.start.hour(), 1);
            assert_eq!(window.start.offset().local_minus_utc(), -3 * 3600);
            assert_eq!(window.end.to_rfc3339(), "2024-09-09T00:00:00-03:00");
        }

        #[test]
        fn last_representable_date_has_no_window() {
            assert!(DayWindow::for_date(NaiveDate::MAX, &Utc).is_none());
            assert!(DayWindow::for_date(NaiveDate::MAX, &New_York).is_none());
        }

        #[test]
        fn today_has_a_window() {
            let window = DayWindow::today().unwrap();
            assert_eq!(window.local_span(), Duration::hours(24));
        }

        #[test]
        fn contains_is_half_open() {
            let window = DayWindow::for_date(date(2025, 2, 5), &Utc).unwrap();
            assert!(window.contains(utc(2025, 2, 5, 0, 0, 0)));
            assert!(window.contains(utc(2025, 2, 5, 23, 59, 59)));
            assert!(!window.contains(utc(2025, 2, 6, 0, 0, 0)));
            assert!(!window.contains(utc(2025, 2, 4, 23, 59, 59)));
        }
    }
}
