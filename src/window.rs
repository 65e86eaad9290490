use crate::calendar::parse_iso_date;
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

pub const DEFAULT_WINDOW_DAYS: i64 = 14;

/// An inclusive reporting window `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// Builds a window from optional request filters. Missing or malformed
    /// values fall back to `today .. today + default_days` instead of failing.
    pub fn from_filters(
        start: Option<&str>,
        end: Option<&str>,
        today: NaiveDate,
        default_days: i64,
    ) -> Self {
        let start = parse_filter("start", start).unwrap_or(today);
        let end = parse_filter("end", end).unwrap_or_else(|| default_end(start, default_days));
        Self::new(start, end)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

impl fmt::Display for DateWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

fn parse_filter(name: &str, raw: Option<&str>) -> Option<NaiveDate> {
    let raw = raw.map(str::trim).filter(|value| !value.is_empty())?;
    let parsed = parse_iso_date(raw);
    if parsed.is_none() {
        warn!(filter = name, value = raw, "ignoring malformed date filter");
    }
    parsed
}

/// `start + days`, capped at the last date chrono can represent.
fn default_end(start: NaiveDate, days: i64) -> NaiveDate {
    match Duration::try_days(days).and_then(|span| start.checked_add_signed(span)) {
        Some(end) => end,
        None => {
            warn!(%start, days, "default window end out of range; capping");
            NaiveDate::MAX
        }
    }
}
