//! Resolves the non-working dates of one assignee (or of nobody in
//! particular) inside a window.

use crate::calendar::WorkCalendar;
use crate::model::Holiday;
use crate::persistence::HolidayStore;
use crate::window::DateWindow;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, warn};

/// Holiday dates for a window plus whether any lookup failed on the way.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedHolidays {
    pub dates: BTreeSet<NaiveDate>,
    /// Set when a lookup failed and the calendar fell back to fewer holidays.
    pub degraded: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee_id: Option<i64>,
}

impl ResolvedHolidays {
    pub fn calendar(&self) -> WorkCalendar {
        WorkCalendar::with_holidays(self.dates.iter().copied())
    }
}

/// Adds every day of each holiday that lands inside the window. Ranges are
/// expanded over their own span first, so a range that starts before the
/// window still contributes its in-window days.
pub fn expand_into_window<'a, I>(holidays: I, window: &DateWindow, dates: &mut BTreeSet<NaiveDate>)
where
    I: IntoIterator<Item = &'a Holiday>,
{
    for holiday in holidays {
        dates.extend(holiday.days().filter(|day| window.contains(*day)));
    }
}

/// Public holidays, plus the named assignee's single-day and range holidays,
/// inside the window. An unknown name or an assignee without holiday rows
/// yields public holidays only. Store failures never propagate: the affected
/// part is dropped, `degraded` is set and a warning is logged.
pub fn resolve_holidays<S>(store: &S, assignee: Option<&str>, window: &DateWindow) -> ResolvedHolidays
where
    S: HolidayStore + ?Sized,
{
    let mut resolved = public_holidays(store, window);
    if resolved.degraded {
        return resolved;
    }

    let Some(name) = assignee.map(str::trim).filter(|name| !name.is_empty()) else {
        return resolved;
    };

    match store.find_assignee_id_by_name(name) {
        Ok(Some(id)) => add_personal_holidays(store, id, window, &mut resolved),
        Ok(None) => debug!(assignee = name, "no assignee row; using public holidays only"),
        Err(err) => {
            warn!(assignee = name, error = %err, "assignee lookup failed; ignoring personal holidays");
            resolved.degraded = true;
        }
    }
    resolved
}

/// Same as [`resolve_holidays`] for an assignee whose id is already known.
pub fn resolve_holidays_for_id<S>(
    store: &S,
    assignee_id: Option<i64>,
    window: &DateWindow,
) -> ResolvedHolidays
where
    S: HolidayStore + ?Sized,
{
    let mut resolved = public_holidays(store, window);
    if let (false, Some(id)) = (resolved.degraded, assignee_id) {
        add_personal_holidays(store, id, window, &mut resolved);
    }
    resolved
}

fn public_holidays<S>(store: &S, window: &DateWindow) -> ResolvedHolidays
where
    S: HolidayStore + ?Sized,
{
    let mut resolved = ResolvedHolidays::default();
    match store.list_public_holidays(window) {
        Ok(public) => expand_into_window(&public, window, &mut resolved.dates),
        Err(err) => {
            warn!(%window, error = %err, "public holiday lookup failed; counting weekends only");
            resolved.degraded = true;
        }
    }
    resolved
}

fn add_personal_holidays<S>(
    store: &S,
    assignee_id: i64,
    window: &DateWindow,
    resolved: &mut ResolvedHolidays,
) where
    S: HolidayStore + ?Sized,
{
    resolved.assignee_id = Some(assignee_id);
    match store.list_assignee_holidays(assignee_id, window) {
        Ok(personal) => expand_into_window(&personal, window, &mut resolved.dates),
        Err(err) => {
            warn!(assignee_id, error = %err, "assignee holiday lookup failed; ignoring personal holidays");
            resolved.degraded = true;
        }
    }
}
