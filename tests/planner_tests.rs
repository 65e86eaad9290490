#![cfg(feature = "sqlite")]

use capacity_planner::{
    AllocationStatus, AllocationThresholds, Assignee, DateWindow, Holiday, Planner, PlannerStore,
    Project, Rag, RagCalendar, ReportFilters, SqlitePlannerStore, Task, TaskStatus,
};
use chrono::NaiveDate;

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

struct Fixture {
    store: SqlitePlannerStore,
    project_id: i64,
}

impl Fixture {
    fn new() -> Self {
        let store = SqlitePlannerStore::in_memory().unwrap();
        let alice = store.create_assignee(&Assignee::new(0, "Alice")).unwrap();
        let mut bob = Assignee::new(0, "Bob");
        bob.working_days_per_week = 2.5;
        store.create_assignee(&bob).unwrap();
        store.create_holiday(&Holiday::public(d(2025, 6, 4))).unwrap();
        store
            .create_holiday(&Holiday::personal(alice.id, d(2025, 6, 5)))
            .unwrap();
        let project = store.create_project(&Project::new(0, "Apollo")).unwrap();
        Self {
            store,
            project_id: project.id,
        }
    }

    fn add_task(&self, assignee: &str, assigned: f64, taken: f64, due: NaiveDate) -> Task {
        let mut task = Task::new(0, self.project_id, format!("{assignee} work"));
        task.assignee = assignee.to_string();
        task.days_assigned = assigned;
        task.days_taken = taken;
        task.due_date = Some(due);
        self.store.create_task(&task).unwrap()
    }
}

fn june_week() -> DateWindow {
    DateWindow::new(d(2025, 6, 2), d(2025, 6, 6))
}

#[test]
fn business_days_use_public_and_personal_holidays() {
    let fx = Fixture::new();
    let planner = Planner::default();

    let generic = planner.business_days(&fx.store, None, &june_week());
    assert_eq!(generic.business_days, 4);
    assert_eq!(generic.holidays, vec![d(2025, 6, 4)]);
    assert!(!generic.degraded);

    let alice = planner.business_days(&fx.store, Some("Alice"), &june_week());
    assert_eq!(alice.business_days, 3);

    let unknown = planner.business_days(&fx.store, Some("Mallory"), &june_week());
    assert_eq!(unknown.business_days, 4);
}

#[test]
fn allocation_report_from_store() {
    let fx = Fixture::new();
    fx.add_task("Alice", 4.0, 1.0, d(2025, 6, 6));
    fx.add_task("Bob", 2.0, 0.0, d(2025, 6, 6));
    fx.add_task("Ghost", 1.0, 0.0, d(2025, 6, 6));

    let planner = Planner::default();
    let report = planner
        .allocation_report(&fx.store, &june_week(), &ReportFilters::default())
        .unwrap();

    let alice = report.assignees.iter().find(|a| a.assignee == "Alice").unwrap();
    assert_eq!(alice.business_days, 3);
    assert_eq!(alice.capacity, 3.0);
    assert_eq!(alice.allocated, 3.0);
    assert_eq!(alice.allocation_percentage, 100);
    assert_eq!(alice.allocation_status, AllocationStatus::Full);

    let bob = report.assignees.iter().find(|a| a.assignee == "Bob").unwrap();
    assert_eq!(bob.business_days, 4);
    assert_eq!(bob.capacity, 2.0);
    assert_eq!(bob.allocation_percentage, 100);

    assert_eq!(report.unmatched_task_ids.len(), 1);
}

#[test]
fn planner_thresholds_can_be_swapped() {
    let fx = Fixture::new();
    fx.add_task("Bob", 5.0, 0.0, d(2025, 6, 6));
    let planner = Planner::default().with_thresholds(AllocationThresholds::without_overallocated_tier());
    let filters = ReportFilters {
        assignee: Some("Bob".into()),
        project_id: None,
    };
    let report = planner
        .allocation_report(&fx.store, &june_week(), &filters)
        .unwrap();
    assert_eq!(report.assignees[0].allocation_percentage, 250);
    assert_eq!(report.assignees[0].allocation_status, AllocationStatus::Full);
}

#[test]
fn task_rag_depends_on_calendar_choice() {
    let fx = Fixture::new();
    // Monday 2025-06-02 to Friday 2025-06-06: 4 generic days, 3 for Alice
    let task = fx.add_task("Alice", 4.0, 0.0, d(2025, 6, 6));
    let planner = Planner::default();
    let today = d(2025, 6, 2);

    let generic = planner
        .task_rag(&fx.store, &task, RagCalendar::Generic, today)
        .unwrap();
    assert_eq!(generic.assessment.business_days_until_due, 4);
    assert_eq!(generic.assessment.status, Rag::Amber);

    let personal = planner
        .task_rag(&fx.store, &task, RagCalendar::Assignee, today)
        .unwrap();
    assert_eq!(personal.assessment.business_days_until_due, 3);
    assert_eq!(personal.assessment.status, Rag::Red);
    assert!(personal.is_stale());

    let unscheduled = Task::new(99, fx.project_id, "No due date");
    assert!(
        planner
            .task_rag(&fx.store, &unscheduled, RagCalendar::Generic, today)
            .is_none()
    );
}

#[test]
fn refresh_writes_only_changed_rags() {
    let fx = Fixture::new();
    let late = fx.add_task("Alice", 10.0, 4.0, d(2025, 6, 3));
    let fine = fx.add_task("Bob", 1.0, 0.0, d(2025, 6, 30));
    let mut done = fx.add_task("Bob", 10.0, 0.0, d(2025, 6, 3));
    done.status = TaskStatus::Completed;
    fx.store.update_task(&done).unwrap();

    let planner = Planner::default();
    let summary = planner
        .refresh_task_rags(&fx.store, RagCalendar::Generic, d(2025, 6, 2))
        .unwrap();
    assert_eq!(summary.evaluated, 2);
    assert_eq!(summary.changed.len(), 1);
    assert_eq!(summary.changed[0].task_id, late.id);
    assert_eq!(summary.changed[0].to, Rag::Red);

    assert_eq!(fx.store.get_task(late.id).unwrap().unwrap().rag, Rag::Red);
    assert_eq!(fx.store.get_task(fine.id).unwrap().unwrap().rag, Rag::Green);
    assert_eq!(fx.store.get_task(done.id).unwrap().unwrap().rag, Rag::Green);

    let again = planner
        .refresh_task_rags(&fx.store, RagCalendar::Generic, d(2025, 6, 2))
        .unwrap();
    assert!(again.changed.is_empty());
}
