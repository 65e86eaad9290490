use crate::model::{Assignee, Holiday, Project, Rag, Task};
use crate::validation::ValidationError;
use crate::window::DateWindow;
use serde::{Deserialize, Serialize};
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[cfg(feature = "sqlite")]
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("invalid data: {0}")]
    InvalidData(String),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("{0} not found")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
}

pub type PersistenceResult<T> = Result<T, PersistenceError>;

/// Holiday lookups the calendar resolver depends on.
pub trait HolidayStore {
    /// Public holidays that touch the window, ranges included.
    fn list_public_holidays(&self, window: &DateWindow) -> PersistenceResult<Vec<Holiday>>;

    /// Holidays owned by one assignee whose span overlaps the window.
    fn list_assignee_holidays(
        &self,
        assignee_id: i64,
        window: &DateWindow,
    ) -> PersistenceResult<Vec<Holiday>>;

    fn find_assignee_id_by_name(&self, name: &str) -> PersistenceResult<Option<i64>>;
}

/// Task and assignee lookups the allocation report depends on.
pub trait WorkloadStore {
    /// Tasks not yet completed, due on or after the window start, and either
    /// unscheduled or starting no later than the window end.
    fn list_active_tasks_in_window(&self, window: &DateWindow) -> PersistenceResult<Vec<Task>>;

    fn list_assignees(&self) -> PersistenceResult<Vec<Assignee>>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HolidayFilter {
    #[serde(default)]
    pub assignee_id: Option<i64>,
    /// Only holidays without an assignee.
    #[serde(default)]
    pub public_only: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub project_id: i64,
    pub imported: usize,
    pub progress: i64,
}

/// Every record in the store, used for JSON export and restore.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlannerSnapshot {
    #[serde(default)]
    pub assignees: Vec<Assignee>,
    #[serde(default)]
    pub holidays: Vec<Holiday>,
    #[serde(default)]
    pub projects: Vec<Project>,
    #[serde(default)]
    pub tasks: Vec<Task>,
}

/// Full read/write access to planning data.
pub trait PlannerStore: HolidayStore + WorkloadStore + Send + Sync {
    fn create_assignee(&self, assignee: &Assignee) -> PersistenceResult<Assignee>;
    fn get_assignee(&self, id: i64) -> PersistenceResult<Option<Assignee>>;
    fn update_assignee(&self, assignee: &Assignee) -> PersistenceResult<Assignee>;
    /// Refused with `Conflict` while any task references the assignee's name.
    fn delete_assignee(&self, id: i64) -> PersistenceResult<bool>;

    fn create_holiday(&self, holiday: &Holiday) -> PersistenceResult<Holiday>;
    fn list_holidays(&self, filter: &HolidayFilter) -> PersistenceResult<Vec<Holiday>>;
    fn delete_holiday(&self, id: i64) -> PersistenceResult<bool>;

    fn create_project(&self, project: &Project) -> PersistenceResult<Project>;
    fn list_projects(&self) -> PersistenceResult<Vec<Project>>;
    fn get_project(&self, id: i64) -> PersistenceResult<Option<Project>>;
    fn update_project(&self, project: &Project) -> PersistenceResult<Project>;
    fn delete_project(&self, id: i64) -> PersistenceResult<bool>;

    fn create_task(&self, task: &Task) -> PersistenceResult<Task>;
    fn list_tasks(&self, project_id: Option<i64>) -> PersistenceResult<Vec<Task>>;
    fn get_task(&self, id: i64) -> PersistenceResult<Option<Task>>;
    fn update_task(&self, task: &Task) -> PersistenceResult<Task>;
    fn delete_task(&self, id: i64) -> PersistenceResult<bool>;
    fn update_task_rags(&self, updates: &[(i64, Rag)]) -> PersistenceResult<()>;

    /// Inserts all tasks into the project in one transaction and recomputes
    /// the project's progress.
    fn import_tasks(&self, project_id: i64, tasks: &[Task]) -> PersistenceResult<ImportSummary>;

    fn snapshot(&self) -> PersistenceResult<PlannerSnapshot>;
    /// Replaces every record with the snapshot's contents, ids preserved.
    fn restore(&self, snapshot: &PlannerSnapshot) -> PersistenceResult<()>;
}

pub mod file;
pub mod import;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use file::{load_snapshot_from_json, save_snapshot_to_json};
pub use import::{ColumnMapping, TaskField, read_tasks_from_csv};
