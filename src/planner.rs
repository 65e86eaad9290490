//! Wires the stores into the pure calculations. Every caller (HTTP, CLI)
//! goes through [`Planner`].

use crate::calculations::allocation::{self, AllocationReport, AssigneeCalendar, ReportFilters};
use crate::calculations::rag::{RagAssessment, RagCalendar, RagClassifier};
use crate::config::{AllocationThresholds, PlannerConfig};
use crate::holiday::{resolve_holidays, resolve_holidays_for_id};
use crate::model::{Rag, Task};
use crate::persistence::{HolidayStore, PersistenceResult, PlannerStore, WorkloadStore};
use crate::window::DateWindow;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusinessDayCount {
    pub window: DateWindow,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    pub business_days: i64,
    pub holidays: Vec<NaiveDate>,
    pub degraded: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRag {
    pub task_id: i64,
    pub calendar: RagCalendar,
    pub stored: Rag,
    #[serde(flatten)]
    pub assessment: RagAssessment,
    pub degraded: bool,
}

impl TaskRag {
    pub fn is_stale(&self) -> bool {
        self.stored != self.assessment.status
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RagChange {
    pub task_id: i64,
    pub from: Rag,
    pub to: Rag,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RagRefreshSummary {
    pub evaluated: usize,
    pub changed: Vec<RagChange>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Planner {
    thresholds: AllocationThresholds,
    classifier: RagClassifier,
    default_window_days: i64,
}

impl Default for Planner {
    fn default() -> Self {
        Self::from_config(&PlannerConfig::default())
    }
}

impl Planner {
    pub fn from_config(config: &PlannerConfig) -> Self {
        Self {
            thresholds: config.thresholds.clone(),
            classifier: RagClassifier::new(config.rag_amber_buffer),
            default_window_days: config.default_window_days,
        }
    }

    pub fn with_thresholds(mut self, thresholds: AllocationThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn thresholds(&self) -> &AllocationThresholds {
        &self.thresholds
    }

    pub fn classifier(&self) -> &RagClassifier {
        &self.classifier
    }

    /// Window from raw request filters, defaulting as configured.
    pub fn window(&self, start: Option<&str>, end: Option<&str>, today: NaiveDate) -> DateWindow {
        DateWindow::from_filters(start, end, today, self.default_window_days)
    }

    pub fn business_days<S>(
        &self,
        store: &S,
        assignee: Option<&str>,
        window: &DateWindow,
    ) -> BusinessDayCount
    where
        S: HolidayStore + ?Sized,
    {
        let resolved = resolve_holidays(store, assignee, window);
        let business_days = resolved.calendar().business_days(window.start, window.end);
        BusinessDayCount {
            window: *window,
            assignee: assignee.map(str::to_string),
            business_days,
            holidays: resolved.dates.into_iter().collect(),
            degraded: resolved.degraded,
        }
    }

    /// Resolves each assignee's calendar and builds the allocation report.
    /// Holiday lookup failures degrade the affected assignee; task and
    /// assignee lookup failures are returned.
    pub fn allocation_report<S>(
        &self,
        store: &S,
        window: &DateWindow,
        filters: &ReportFilters,
    ) -> PersistenceResult<AllocationReport>
    where
        S: HolidayStore + WorkloadStore + ?Sized,
    {
        let tasks = store.list_active_tasks_in_window(window)?;
        let calendars: Vec<AssigneeCalendar> = store
            .list_assignees()?
            .into_iter()
            .map(|assignee| {
                let holidays = resolve_holidays_for_id(store, Some(assignee.id), window);
                AssigneeCalendar { assignee, holidays }
            })
            .collect();
        let report = allocation::build_report(window, &calendars, &tasks, filters, &self.thresholds);
        debug!(
            %window,
            assignees = report.assignees.len(),
            unmatched = report.unmatched_task_ids.len(),
            "built allocation report"
        );
        Ok(report)
    }

    /// RAG for one task measured from `today`; `None` without a due date.
    pub fn task_rag<S>(
        &self,
        store: &S,
        task: &Task,
        calendar: RagCalendar,
        today: NaiveDate,
    ) -> Option<TaskRag>
    where
        S: HolidayStore + ?Sized,
    {
        let due_date = task.due_date?;
        let window = DateWindow::new(today, due_date);
        let assignee = match calendar {
            RagCalendar::Generic => None,
            RagCalendar::Assignee => Some(task.assignee.as_str()),
        };
        let resolved = resolve_holidays(store, assignee, &window);
        let assessment = self
            .classifier
            .classify_task(task, &resolved.calendar(), today)?;
        Some(TaskRag {
            task_id: task.id,
            calendar,
            stored: task.rag,
            assessment,
            degraded: resolved.degraded,
        })
    }

    /// Recomputes the RAG of every open task with a due date and writes the
    /// ones that changed back to the store.
    pub fn refresh_task_rags<S>(
        &self,
        store: &S,
        calendar: RagCalendar,
        today: NaiveDate,
    ) -> PersistenceResult<RagRefreshSummary>
    where
        S: PlannerStore + ?Sized,
    {
        let mut summary = RagRefreshSummary::default();
        for task in store.list_tasks(None)? {
            if task.status.is_completed() {
                continue;
            }
            let Some(rag) = self.task_rag(store, &task, calendar, today) else {
                continue;
            };
            summary.evaluated += 1;
            if rag.is_stale() {
                summary.changed.push(RagChange {
                    task_id: task.id,
                    from: rag.stored,
                    to: rag.assessment.status,
                });
            }
        }
        let updates: Vec<(i64, Rag)> = summary
            .changed
            .iter()
            .map(|change| (change.task_id, change.to))
            .collect();
        if !updates.is_empty() {
            store.update_task_rags(&updates)?;
        }
        info!(
            evaluated = summary.evaluated,
            changed = summary.changed.len(),
            calendar = %calendar,
            "refreshed task rag values"
        );
        Ok(summary)
    }
}

