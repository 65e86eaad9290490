pub mod calculations;
pub mod calendar;
pub mod config;
pub mod holiday;
#[cfg(feature = "http_api")]
pub mod http_api;
pub mod model;
pub mod persistence;
pub mod planner;
pub mod validation;
pub mod window;

pub use calculations::allocation::{
    AllocationReport, AllocationStatus, AssigneeAllocation, AssigneeCalendar, ReportFilters,
    TaskAllocation, TeamAllocation,
};
pub use calculations::proration::Proration;
pub use calculations::rag::{RagAssessment, RagCalendar, RagClassifier};
pub use calendar::WorkCalendar;
pub use config::{AllocationThresholds, ConfigError, PlannerConfig, ThresholdTier};
pub use holiday::ResolvedHolidays;
pub use model::{Assignee, Holiday, Project, ProjectStatus, Rag, Task, TaskStatus};
#[cfg(feature = "sqlite")]
pub use persistence::sqlite::SqlitePlannerStore;
pub use persistence::{
    HolidayFilter, HolidayStore, ImportSummary, PersistenceError, PlannerSnapshot, PlannerStore,
    WorkloadStore,
};
pub use planner::{BusinessDayCount, Planner, RagRefreshSummary, TaskRag};
pub use validation::ValidationError;
pub use window::DateWindow;
