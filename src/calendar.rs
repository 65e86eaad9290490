use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Converts any zoned timestamp into the calendar date it falls on in its own
/// timezone. Every date that enters the engine goes through here.
pub fn normalize_date<Tz: TimeZone>(timestamp: &DateTime<Tz>) -> NaiveDate {
    timestamp.date_naive()
}

/// Today's date in the local timezone.
pub fn today() -> NaiveDate {
    normalize_date(&chrono::Local::now())
}

/// Parses an ISO `YYYY-MM-DD` date, ignoring surrounding whitespace.
pub fn parse_iso_date(input: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d").ok()
}

/// Whole days from `from` to `to`; negative when `to` precedes `from`.
pub fn days_between(from: NaiveDate, to: NaiveDate) -> i64 {
    (to - from).num_days()
}

/// Iterates every calendar day of the inclusive range `[start, end]`.
/// Yields nothing when `start > end`.
pub fn days_in_range(start: NaiveDate, end: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    let mut current = (start <= end).then_some(start);
    std::iter::from_fn(move || {
        let day = current?;
        current = if day < end { day.succ_opt() } else { None };
        Some(day)
    })
}

pub fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// A resolved set of non-working dates on top of the Saturday/Sunday weekend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkCalendar {
    holidays: BTreeSet<NaiveDate>,
}

impl WorkCalendar {
    /// Weekends only, no holidays.
    pub fn weekends_only() -> Self {
        Self::default()
    }

    pub fn with_holidays<I>(holidays: I) -> Self
    where
        I: IntoIterator<Item = NaiveDate>,
    {
        Self {
            holidays: holidays.into_iter().collect(),
        }
    }

    pub fn is_holiday(&self, date: NaiveDate) -> bool {
        self.holidays.contains(&date)
    }

    /// A weekday (Mon-Fri) that is not a holiday.
    pub fn is_business_day(&self, date: NaiveDate) -> bool {
        !is_weekend(date) && !self.is_holiday(date)
    }

    /// Count business days in the inclusive range. Zero when `start > end`.
    pub fn business_days(&self, start: NaiveDate, end: NaiveDate) -> i64 {
        days_in_range(start, end)
            .filter(|day| self.is_business_day(*day))
            .count() as i64
    }
}

/// Weekday count for the range with no holidays applied.
pub fn weekday_count(start: NaiveDate, end: NaiveDate) -> i64 {
    WorkCalendar::weekends_only().business_days(start, end)
}

/// Business days in `[start, end]` under `calendar`.
pub fn business_days(start: NaiveDate, end: NaiveDate, calendar: &WorkCalendar) -> i64 {
    calendar.business_days(start, end)
}
