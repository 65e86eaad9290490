use std::{net::SocketAddr, sync::Arc};

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info};

use crate::calendar;
use crate::persistence::{ColumnMapping, HolidayFilter, PersistenceError, read_tasks_from_csv};
use crate::{
    AllocationReport, Assignee, BusinessDayCount, Holiday, ImportSummary, Planner, PlannerStore,
    Project, RagCalendar, RagRefreshSummary, ReportFilters, Task, TaskRag,
};

#[derive(Clone)]
pub struct AppState {
    store: Arc<dyn PlannerStore>,
    planner: Arc<Planner>,
    today: Option<NaiveDate>,
}

impl AppState {
    pub fn new(store: Arc<dyn PlannerStore>, planner: Planner) -> Self {
        Self {
            store,
            planner: Arc::new(planner),
            today: None,
        }
    }

    /// Pins "today" for RAG and default windows instead of the local clock.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    fn today(&self) -> NaiveDate {
        self.today.unwrap_or_else(calendar::today)
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    message: String,
}

#[derive(Debug)]
enum ApiError {
    NotFound(String),
    Conflict(String),
    Invalid(String),
    Internal(String),
}

impl ApiError {
    fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    fn invalid(message: impl Into<String>) -> Self {
        ApiError::Invalid(message.into())
    }
}

impl From<PersistenceError> for ApiError {
    fn from(value: PersistenceError) -> Self {
        match value {
            PersistenceError::NotFound(what) => ApiError::NotFound(format!("{what} not found")),
            PersistenceError::Conflict(message) => ApiError::Conflict(message),
            PersistenceError::Validation(err) => ApiError::Invalid(err.to_string()),
            PersistenceError::InvalidData(message) => ApiError::Invalid(message),
            PersistenceError::Csv(err) => ApiError::Invalid(err.to_string()),
            other => {
                error!(error = %other, "store operation failed");
                ApiError::Internal(other.to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, message) = match self {
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, "not_found", message),
            ApiError::Conflict(message) => (StatusCode::CONFLICT, "conflict", message),
            ApiError::Invalid(message) => (StatusCode::BAD_REQUEST, "invalid_request", message),
            ApiError::Internal(message) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", message)
            }
        };
        (status, Json(ErrorBody { error, message })).into_response()
    }
}

#[derive(Debug, Default, Deserialize)]
struct WindowQuery {
    start: Option<String>,
    end: Option<String>,
    assignee: Option<String>,
    project_id: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
struct HolidayQuery {
    assignee_id: Option<i64>,
    #[serde(default)]
    public: bool,
}

#[derive(Debug, Default, Deserialize)]
struct TaskQuery {
    project_id: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
struct RagQuery {
    calendar: Option<String>,
}

/// Tasks to import, given either as JSON records or as CSV text.
#[derive(Debug, Default, Deserialize)]
struct ImportPayload {
    #[serde(default)]
    tasks: Vec<Task>,
    csv: Option<String>,
    mapping: Option<ColumnMapping>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/assignees", get(list_assignees).post(create_assignee))
        .route(
            "/assignees/:id",
            get(get_assignee).put(update_assignee).delete(delete_assignee),
        )
        .route("/holidays", get(list_holidays).post(create_holiday))
        .route("/holidays/:id", axum::routing::delete(delete_holiday))
        .route("/projects", get(list_projects).post(create_project))
        .route(
            "/projects/:id",
            get(get_project).put(update_project).delete(delete_project),
        )
        .route("/projects/:id/import", post(import_tasks))
        .route("/tasks", get(list_tasks).post(create_task))
        .route("/tasks/rag/refresh", post(refresh_rags))
        .route(
            "/tasks/:id",
            get(get_task).put(update_task).delete(delete_task),
        )
        .route("/tasks/:id/rag", get(task_rag))
        .route("/business-days", get(business_days))
        .route("/resource-allocation", get(resource_allocation))
        .with_state(state)
}

pub async fn serve(addr: SocketAddr, state: AppState) -> std::io::Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "capacity planner HTTP API listening");
    axum::serve(listener, app).await
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

async fn list_assignees(State(state): State<AppState>) -> Result<Json<Vec<Assignee>>, ApiError> {
    Ok(Json(state.store.list_assignees()?))
}

async fn get_assignee(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Assignee>, ApiError> {
    state
        .store
        .get_assignee(id)?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("assignee {id} not found")))
}

async fn create_assignee(
    State(state): State<AppState>,
    Json(assignee): Json<Assignee>,
) -> Result<(StatusCode, Json<Assignee>), ApiError> {
    let created = state.store.create_assignee(&assignee)?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn update_assignee(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(assignee): Json<Assignee>,
) -> Result<Json<Assignee>, ApiError> {
    let assignee = Assignee { id, ..assignee };
    Ok(Json(state.store.update_assignee(&assignee)?))
}

async fn delete_assignee(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    if !state.store.delete_assignee(id)? {
        return Err(ApiError::not_found(format!("assignee {id} not found")));
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn list_holidays(
    State(state): State<AppState>,
    Query(query): Query<HolidayQuery>,
) -> Result<Json<Vec<Holiday>>, ApiError> {
    let filter = HolidayFilter {
        assignee_id: query.assignee_id,
        public_only: query.public,
    };
    Ok(Json(state.store.list_holidays(&filter)?))
}

async fn create_holiday(
    State(state): State<AppState>,
    Json(holiday): Json<Holiday>,
) -> Result<(StatusCode, Json<Holiday>), ApiError> {
    let created = state.store.create_holiday(&holiday)?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn delete_holiday(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    if !state.store.delete_holiday(id)? {
        return Err(ApiError::not_found(format!("holiday {id} not found")));
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn list_projects(State(state): State<AppState>) -> Result<Json<Vec<Project>>, ApiError> {
    Ok(Json(state.store.list_projects()?))
}

async fn get_project(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Project>, ApiError> {
    state
        .store
        .get_project(id)?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("project {id} not found")))
}

async fn create_project(
    State(state): State<AppState>,
    Json(project): Json<Project>,
) -> Result<(StatusCode, Json<Project>), ApiError> {
    let created = state.store.create_project(&project)?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn update_project(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(project): Json<Project>,
) -> Result<Json<Project>, ApiError> {
    let project = Project { id, ..project };
    Ok(Json(state.store.update_project(&project)?))
}

async fn delete_project(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    if !state.store.delete_project(id)? {
        return Err(ApiError::not_found(format!("project {id} not found")));
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn import_tasks(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<ImportPayload>,
) -> Result<Json<ImportSummary>, ApiError> {
    let tasks = match payload.csv {
        Some(csv) => read_tasks_from_csv(csv.as_bytes(), id, payload.mapping.as_ref())?,
        None => payload.tasks,
    };
    if tasks.is_empty() {
        return Err(ApiError::invalid("import contained no tasks"));
    }
    Ok(Json(state.store.import_tasks(id, &tasks)?))
}

async fn list_tasks(
    State(state): State<AppState>,
    Query(query): Query<TaskQuery>,
) -> Result<Json<Vec<Task>>, ApiError> {
    Ok(Json(state.store.list_tasks(query.project_id)?))
}

async fn get_task(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Task>, ApiError> {
    state
        .store
        .get_task(id)?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("task {id} not found")))
}

async fn create_task(
    State(state): State<AppState>,
    Json(task): Json<Task>,
) -> Result<(StatusCode, Json<Task>), ApiError> {
    let created = state.store.create_task(&task)?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn update_task(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(task): Json<Task>,
) -> Result<Json<Task>, ApiError> {
    let task = Task { id, ..task };
    Ok(Json(state.store.update_task(&task)?))
}

async fn delete_task(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    if !state.store.delete_task(id)? {
        return Err(ApiError::not_found(format!("task {id} not found")));
    }
    Ok(StatusCode::NO_CONTENT)
}

fn rag_calendar(raw: Option<&str>) -> Result<RagCalendar, ApiError> {
    raw.unwrap_or_default()
        .parse::<RagCalendar>()
        .map_err(ApiError::invalid)
}

async fn task_rag(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(query): Query<RagQuery>,
) -> Result<Json<TaskRag>, ApiError> {
    let calendar = rag_calendar(query.calendar.as_deref())?;
    let task = state
        .store
        .get_task(id)?
        .ok_or_else(|| ApiError::not_found(format!("task {id} not found")))?;
    state
        .planner
        .task_rag(state.store.as_ref(), &task, calendar, state.today())
        .map(Json)
        .ok_or_else(|| ApiError::invalid(format!("task {id} has no due date")))
}

async fn refresh_rags(
    State(state): State<AppState>,
    Query(query): Query<RagQuery>,
) -> Result<Json<RagRefreshSummary>, ApiError> {
    let calendar = rag_calendar(query.calendar.as_deref())?;
    let summary = state
        .planner
        .refresh_task_rags(state.store.as_ref(), calendar, state.today())?;
    Ok(Json(summary))
}

async fn business_days(
    State(state): State<AppState>,
    Query(query): Query<WindowQuery>,
) -> Json<BusinessDayCount> {
    let window = state
        .planner
        .window(query.start.as_deref(), query.end.as_deref(), state.today());
    let assignee = query.assignee.as_deref().filter(|name| !name.trim().is_empty());
    Json(
        state
            .planner
            .business_days(state.store.as_ref(), assignee, &window),
    )
}

async fn resource_allocation(
    State(state): State<AppState>,
    Query(query): Query<WindowQuery>,
) -> Result<Json<AllocationReport>, ApiError> {
    let window = state
        .planner
        .window(query.start.as_deref(), query.end.as_deref(), state.today());
    let filters = ReportFilters {
        assignee: query.assignee,
        project_id: query.project_id,
    };
    let report = state
        .planner
        .allocation_report(state.store.as_ref(), &window, &filters)?;
    Ok(Json(report))
}
