#![cfg(feature = "sqlite")]

use capacity_planner::persistence::{load_snapshot_from_json, save_snapshot_to_json};
use capacity_planner::{
    Assignee, DateWindow, Holiday, HolidayFilter, HolidayStore, PersistenceError, PlannerStore,
    Project, Rag, SqlitePlannerStore, Task, TaskStatus, WorkloadStore,
};
use chrono::NaiveDate;
use tempfile::NamedTempFile;

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn seeded_store() -> (SqlitePlannerStore, i64) {
    let store = SqlitePlannerStore::in_memory().unwrap();
    store.create_assignee(&Assignee::new(0, "Alice")).unwrap();
    let project = store.create_project(&Project::new(0, "Apollo")).unwrap();
    (store, project.id)
}

fn task(project_id: i64, name: &str, assignee: &str, due: Option<NaiveDate>) -> Task {
    let mut task = Task::new(0, project_id, name);
    task.assignee = assignee.to_string();
    task.days_assigned = 3.0;
    task.due_date = due;
    task
}

#[test]
fn assignee_crud_and_duplicate_names() {
    let store = SqlitePlannerStore::in_memory().unwrap();
    let mut alice = store.create_assignee(&Assignee::new(0, " Alice ")).unwrap();
    assert!(alice.id > 0);
    assert_eq!(alice.name, "Alice");
    assert_eq!(alice.working_days_per_week, 5.0);

    let err = store.create_assignee(&Assignee::new(0, "Alice")).unwrap_err();
    assert!(matches!(err, PersistenceError::Conflict(_)));

    alice.working_days_per_week = 3.0;
    let updated = store.update_assignee(&alice).unwrap();
    assert_eq!(updated.working_days_per_week, 3.0);
    assert_eq!(store.find_assignee_id_by_name("Alice").unwrap(), Some(alice.id));

    assert!(store.delete_assignee(alice.id).unwrap());
    assert!(!store.delete_assignee(alice.id).unwrap());
    assert!(store.list_assignees().unwrap().is_empty());
}

#[test]
fn invalid_records_are_rejected() {
    let store = SqlitePlannerStore::in_memory().unwrap();
    let mut assignee = Assignee::new(0, "Zero");
    assignee.working_days_per_week = 0.0;
    let err = store.create_assignee(&assignee).unwrap_err();
    assert!(matches!(err, PersistenceError::Validation(_)));

    let backwards = Holiday::public(d(2025, 6, 10)).with_end(d(2025, 6, 5));
    assert!(matches!(
        store.create_holiday(&backwards).unwrap_err(),
        PersistenceError::Validation(_)
    ));

    let orphan = task(99, "Orphan", "", None);
    assert!(matches!(
        store.create_task(&orphan).unwrap_err(),
        PersistenceError::NotFound(_)
    ));
}

#[test]
fn assignee_referenced_by_tasks_cannot_be_deleted() {
    let (store, project_id) = seeded_store();
    let alice_id = store.find_assignee_id_by_name("Alice").unwrap().unwrap();
    store
        .create_task(&task(project_id, "Design", "Alice", Some(d(2025, 6, 6))))
        .unwrap();
    let err = store.delete_assignee(alice_id).unwrap_err();
    assert!(matches!(err, PersistenceError::Conflict(_)));
}

#[test]
fn renaming_assignee_carries_their_tasks() {
    let (store, project_id) = seeded_store();
    store.create_assignee(&Assignee::new(0, "Bob")).unwrap();
    let mut alice = store
        .get_assignee(store.find_assignee_id_by_name("Alice").unwrap().unwrap())
        .unwrap()
        .unwrap();
    store
        .create_task(&task(project_id, "Design", "Alice", Some(d(2025, 6, 6))))
        .unwrap();
    store
        .create_task(&task(project_id, "Review", "Bob", Some(d(2025, 6, 6))))
        .unwrap();

    alice.name = "Alicia".into();
    let renamed = store.update_assignee(&alice).unwrap();
    assert_eq!(renamed.name, "Alicia");
    assert_eq!(store.find_assignee_id_by_name("Alice").unwrap(), None);

    let tasks = store.list_tasks(Some(project_id)).unwrap();
    let design = tasks.iter().find(|t| t.name == "Design").unwrap();
    let review = tasks.iter().find(|t| t.name == "Review").unwrap();
    assert_eq!(design.assignee, "Alicia");
    assert_eq!(review.assignee, "Bob");
    assert!(store.delete_assignee(alice.id).is_err());

    // A rename onto a taken name changes nothing
    alice.name = "Bob".into();
    let err = store.update_assignee(&alice).unwrap_err();
    assert!(matches!(err, PersistenceError::Conflict(_)));
    let tasks = store.list_tasks(Some(project_id)).unwrap();
    assert_eq!(tasks.iter().filter(|t| t.assignee == "Alicia").count(), 1);
}

#[test]
fn holiday_queries_match_overlapping_ranges() {
    let (store, _) = seeded_store();
    let alice_id = store.find_assignee_id_by_name("Alice").unwrap().unwrap();
    store.create_holiday(&Holiday::public(d(2025, 6, 4))).unwrap();
    store.create_holiday(&Holiday::public(d(2025, 8, 1))).unwrap();
    store
        .create_holiday(
            &Holiday::personal(alice_id, d(2025, 5, 30))
                .with_end(d(2025, 6, 3))
                .with_description("Leave"),
        )
        .unwrap();
    assert!(matches!(
        store.create_holiday(&Holiday::personal(999, d(2025, 6, 4))).unwrap_err(),
        PersistenceError::NotFound(_)
    ));

    let window = DateWindow::new(d(2025, 6, 2), d(2025, 6, 6));
    assert_eq!(store.list_public_holidays(&window).unwrap().len(), 1);
    let personal = store.list_assignee_holidays(alice_id, &window).unwrap();
    assert_eq!(personal.len(), 1);
    assert_eq!(personal[0].description.as_deref(), Some("Leave"));

    let public_only = HolidayFilter {
        public_only: true,
        ..HolidayFilter::default()
    };
    assert_eq!(store.list_holidays(&public_only).unwrap().len(), 2);
    assert_eq!(store.list_holidays(&HolidayFilter::default()).unwrap().len(), 3);
}

#[test]
fn active_task_query_excludes_completed_and_out_of_window() {
    let (store, project_id) = seeded_store();
    let window = DateWindow::new(d(2025, 6, 2), d(2025, 6, 13));

    let active = store
        .create_task(&task(project_id, "Active", "Alice", Some(d(2025, 6, 20))))
        .unwrap();
    let mut done = task(project_id, "Done", "Alice", Some(d(2025, 6, 10)));
    done.status = TaskStatus::Completed;
    store.create_task(&done).unwrap();
    store
        .create_task(&task(project_id, "Past", "Alice", Some(d(2025, 5, 20))))
        .unwrap();
    store
        .create_task(&task(project_id, "Unscheduled", "Alice", None))
        .unwrap();
    let mut future = task(project_id, "Future", "Alice", Some(d(2025, 7, 20)));
    future.start_date = Some(d(2025, 7, 1));
    store.create_task(&future).unwrap();

    let tasks = store.list_active_tasks_in_window(&window).unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].id, active.id);
}

#[test]
fn task_update_and_rag_writes() {
    let (store, project_id) = seeded_store();
    let mut created = store
        .create_task(&task(project_id, "Build", "Alice", Some(d(2025, 6, 6))))
        .unwrap();
    assert_eq!(created.rag, Rag::Green);
    assert_eq!(created.status, TaskStatus::NotStarted);

    created.days_taken = 1.5;
    created.status = TaskStatus::InProgress;
    let updated = store.update_task(&created).unwrap();
    assert_eq!(updated.days_taken, 1.5);
    assert_eq!(updated.status, TaskStatus::InProgress);

    store.update_task_rags(&[(created.id, Rag::Red)]).unwrap();
    assert_eq!(store.get_task(created.id).unwrap().unwrap().rag, Rag::Red);

    assert!(store.delete_task(created.id).unwrap());
    assert!(store.get_task(created.id).unwrap().is_none());
}

#[test]
fn import_inserts_tasks_and_recomputes_progress() {
    let (store, project_id) = seeded_store();
    let mut done = task(0, "Done", "Alice", Some(d(2025, 6, 6)));
    done.status = TaskStatus::Completed;
    let tasks = vec![
        done,
        task(0, "Open 1", "Alice", Some(d(2025, 6, 6))),
        task(0, "Open 2", "Alice", None),
    ];

    let summary = store.import_tasks(project_id, &tasks).unwrap();
    assert_eq!(summary.imported, 3);
    assert_eq!(summary.progress, 33);
    assert_eq!(store.get_project(project_id).unwrap().unwrap().progress, 33);
    assert!(
        store
            .list_tasks(Some(project_id))
            .unwrap()
            .iter()
            .all(|t| t.project_id == project_id)
    );

    let err = store.import_tasks(404, &tasks).unwrap_err();
    assert!(matches!(err, PersistenceError::NotFound(_)));
}

#[test]
fn import_is_all_or_nothing() {
    let (store, project_id) = seeded_store();
    let mut bad = task(0, "Bad", "Alice", None);
    bad.days_assigned = -1.0;
    let tasks = vec![task(0, "Good", "Alice", None), bad];
    assert!(store.import_tasks(project_id, &tasks).is_err());
    assert!(store.list_tasks(Some(project_id)).unwrap().is_empty());
}

#[test]
fn deleting_project_removes_its_tasks() {
    let (store, project_id) = seeded_store();
    store
        .create_task(&task(project_id, "Build", "Alice", None))
        .unwrap();
    assert!(store.delete_project(project_id).unwrap());
    assert!(store.list_tasks(None).unwrap().is_empty());
}

#[test]
fn snapshot_round_trip_through_json_file() {
    let file = NamedTempFile::new().unwrap();
    let db_file = NamedTempFile::new().unwrap();
    let (store, project_id) = seeded_store();
    let alice_id = store.find_assignee_id_by_name("Alice").unwrap().unwrap();
    store
        .create_holiday(&Holiday::personal(alice_id, d(2025, 6, 4)))
        .unwrap();
    store
        .create_task(&task(project_id, "Persisted", "Alice", Some(d(2025, 6, 6))))
        .unwrap();

    save_snapshot_to_json(&store, file.path()).unwrap();
    let snapshot = load_snapshot_from_json(file.path()).unwrap();
    assert_eq!(snapshot.tasks.len(), 1);

    let restored = SqlitePlannerStore::new(db_file.path()).unwrap();
    restored
        .create_project(&Project::new(0, "Throwaway"))
        .unwrap();
    restored.restore(&snapshot).unwrap();
    assert_eq!(restored.snapshot().unwrap(), store.snapshot().unwrap());
}
