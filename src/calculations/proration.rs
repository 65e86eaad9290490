use crate::calendar::days_between;
use crate::window::DateWindow;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Share of a task's remaining effort that falls inside a window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Proration {
    pub effective_start: NaiveDate,
    pub proportion: f64,
    pub prorated: f64,
}

/// `max(task_start, window_start)`; the window start for unscheduled tasks.
pub fn effective_start(task_start: Option<NaiveDate>, window: &DateWindow) -> NaiveDate {
    task_start.map_or(window.start, |start| start.max(window.start))
}

/// A task due inside the window must finish there, so all of its remaining
/// effort counts. A task due later counts in proportion to how much of its
/// inclusive `effective_start..=due` span the window covers.
pub fn prorate(
    days_remaining: f64,
    task_start: Option<NaiveDate>,
    due_date: NaiveDate,
    window: &DateWindow,
) -> Proration {
    let effective_start = effective_start(task_start, window);
    if days_remaining <= 0.0 {
        return Proration {
            effective_start,
            proportion: 0.0,
            prorated: 0.0,
        };
    }
    if due_date <= window.end {
        return Proration {
            effective_start,
            proportion: 1.0,
            prorated: days_remaining,
        };
    }

    let total_span = (days_between(effective_start, due_date) + 1).max(1);
    let window_span = (days_between(effective_start, window.end) + 1).max(1);
    let proportion = (window_span as f64 / total_span as f64).min(1.0);
    Proration {
        effective_start,
        proportion,
        prorated: days_remaining * proportion,
    }
}
