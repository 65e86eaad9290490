use super::proration::prorate;
use crate::config::AllocationThresholds;
use crate::holiday::ResolvedHolidays;
use crate::model::{Assignee, Task};
use crate::window::DateWindow;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

/// Reported percentage when work is allocated against zero capacity.
pub const ZERO_CAPACITY_SENTINEL: i64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AllocationStatus {
    Overallocated,
    Full,
    Balanced,
    Underallocated,
}

impl AllocationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AllocationStatus::Overallocated => "Overallocated",
            AllocationStatus::Full => "Full",
            AllocationStatus::Balanced => "Balanced",
            AllocationStatus::Underallocated => "Underallocated",
        }
    }
}

impl fmt::Display for AllocationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn round_to_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Business days scaled by the share of a five-day week worked, rounded to
/// one decimal.
pub fn capacity(business_days: i64, working_days_per_week: f64) -> f64 {
    round_to_tenth(business_days as f64 * (working_days_per_week / 5.0))
}

/// Whole-number percentage of capacity in use. Allocation against zero
/// capacity reports [`ZERO_CAPACITY_SENTINEL`].
pub fn allocation_percentage(allocated: f64, capacity: f64) -> i64 {
    if capacity > 0.0 {
        (allocated / capacity * 100.0).round() as i64
    } else if allocated > 0.0 {
        ZERO_CAPACITY_SENTINEL
    } else {
        0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportFilters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<i64>,
}

impl ReportFilters {
    fn assignee_name(&self) -> Option<&str> {
        self.assignee
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }
}

/// An assignee together with their resolved holidays for the window.
#[derive(Debug, Clone, PartialEq)]
pub struct AssigneeCalendar {
    pub assignee: Assignee,
    pub holidays: ResolvedHolidays,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskAllocation {
    pub task_id: i64,
    pub task_name: String,
    pub project_id: i64,
    pub days_remaining: f64,
    pub effective_start: NaiveDate,
    pub due_date: NaiveDate,
    pub proportion: f64,
    pub prorated: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssigneeAllocation {
    pub assignee_id: i64,
    pub assignee: String,
    pub working_days_per_week: f64,
    pub business_days: i64,
    pub capacity: f64,
    pub allocated: f64,
    pub allocation_percentage: i64,
    pub allocation_status: AllocationStatus,
    pub active_tasks: usize,
    pub tasks: Vec<TaskAllocation>,
    /// Personal or public holidays could not be loaded for this assignee.
    pub degraded_calendar: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamAllocation {
    pub capacity: f64,
    pub allocated: f64,
    pub allocation_percentage: i64,
    pub allocation_status: AllocationStatus,
    pub active_tasks: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationReport {
    pub window: DateWindow,
    pub assignees: Vec<AssigneeAllocation>,
    pub team: TeamAllocation,
    /// Active tasks whose assignee name matches no assignee record. They are
    /// left out of every capacity figure.
    pub unmatched_task_ids: Vec<i64>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Default)]
struct WorkloadAccumulator {
    allocated: f64,
    tasks: Vec<TaskAllocation>,
}

/// True when the task carries effort that can land in the window: not
/// completed, remaining effort above zero, due on or after the window start
/// and not starting after the window end.
pub fn is_active_in_window(task: &Task, window: &DateWindow) -> bool {
    let Some(due_date) = task.due_date else {
        return false;
    };
    !task.status.is_completed()
        && task.days_remaining() > 0.0
        && due_date >= window.start
        && task.start_date.is_none_or(|start| start <= window.end)
}

/// Builds the capacity/allocation report for a window. Pure: every input,
/// including each assignee's resolved holidays, is passed in.
pub fn build_report(
    window: &DateWindow,
    calendars: &[AssigneeCalendar],
    tasks: &[Task],
    filters: &ReportFilters,
    thresholds: &AllocationThresholds,
) -> AllocationReport {
    let wanted = filters.assignee_name();
    let selected: Vec<&AssigneeCalendar> = calendars
        .iter()
        .filter(|entry| wanted.is_none_or(|name| entry.assignee.name.trim() == name))
        .collect();

    let mut workloads: BTreeMap<&str, WorkloadAccumulator> = selected
        .iter()
        .map(|entry| (entry.assignee.name.trim(), WorkloadAccumulator::default()))
        .collect();
    let mut unmatched_task_ids = Vec::new();

    for task in tasks {
        if filters.project_id.is_some_and(|id| id != task.project_id) {
            continue;
        }
        if !is_active_in_window(task, window) {
            continue;
        }
        let key = task.assignee.trim();
        if wanted.is_some_and(|name| name != key) {
            continue;
        }
        let Some(workload) = workloads.get_mut(key) else {
            unmatched_task_ids.push(task.id);
            continue;
        };
        let Some(due_date) = task.due_date else {
            continue;
        };
        let days_remaining = task.days_remaining();
        let proration = prorate(days_remaining, task.start_date, due_date, window);
        workload.allocated += proration.prorated;
        workload.tasks.push(TaskAllocation {
            task_id: task.id,
            task_name: task.name.clone(),
            project_id: task.project_id,
            days_remaining,
            effective_start: proration.effective_start,
            due_date,
            proportion: proration.proportion,
            prorated: proration.prorated,
        });
    }

    let mut warnings = Vec::new();
    let mut assignees = Vec::with_capacity(selected.len());
    for entry in selected {
        let assignee = &entry.assignee;
        let workload = workloads
            .remove(assignee.name.trim())
            .unwrap_or_default();
        let business_days = entry.holidays.calendar().business_days(window.start, window.end);
        let capacity = capacity(business_days, assignee.working_days_per_week);
        let percentage = allocation_percentage(workload.allocated, capacity);
        if entry.holidays.degraded {
            warnings.push(format!(
                "holidays for '{}' could not be loaded; capacity assumes fewer days off",
                assignee.name
            ));
        }
        debug!(
            assignee = %assignee.name,
            business_days,
            capacity,
            allocated = workload.allocated,
            percentage,
            "computed assignee allocation"
        );
        assignees.push(AssigneeAllocation {
            assignee_id: assignee.id,
            assignee: assignee.name.clone(),
            working_days_per_week: assignee.working_days_per_week,
            business_days,
            capacity,
            allocated: workload.allocated,
            allocation_percentage: percentage,
            allocation_status: thresholds.classify(percentage as f64),
            active_tasks: workload.tasks.len(),
            tasks: workload.tasks,
            degraded_calendar: entry.holidays.degraded,
        });
    }

    let team = team_totals(&assignees, thresholds);
    AllocationReport {
        window: *window,
        assignees,
        team,
        unmatched_task_ids,
        warnings,
    }
}

fn team_totals(assignees: &[AssigneeAllocation], thresholds: &AllocationThresholds) -> TeamAllocation {
    let capacity = round_to_tenth(assignees.iter().map(|a| a.capacity).sum());
    let allocated: f64 = assignees.iter().map(|a| a.allocated).sum();
    let percentage = allocation_percentage(allocated, capacity);
    TeamAllocation {
        capacity,
        allocated,
        allocation_percentage: percentage,
        allocation_status: thresholds.classify(percentage as f64),
        active_tasks: assignees.iter().map(|a| a.active_tasks).sum(),
    }
}
