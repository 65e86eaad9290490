//! Spreadsheet task import: CSV rows mapped onto task fields by header.

use super::{PersistenceError, PersistenceResult};
use crate::model::{Rag, Task, TaskStatus};
use crate::validation;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Read;
use tracing::debug;

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%d/%m/%Y", "%Y/%m/%d"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskField {
    Name,
    Assignee,
    DaysAssigned,
    DaysTaken,
    StartDate,
    DueDate,
    Status,
    Rag,
}

impl TaskField {
    const ALL: [TaskField; 8] = [
        TaskField::Name,
        TaskField::Assignee,
        TaskField::DaysAssigned,
        TaskField::DaysTaken,
        TaskField::StartDate,
        TaskField::DueDate,
        TaskField::Status,
        TaskField::Rag,
    ];

    fn aliases(&self) -> &'static [&'static str] {
        match self {
            TaskField::Name => &["name", "task", "taskname", "title"],
            TaskField::Assignee => &["assignee", "assignedto", "owner", "resource"],
            TaskField::DaysAssigned => &["daysassigned", "estimate", "effort", "days"],
            TaskField::DaysTaken => &["daystaken", "dayspent", "daysspent", "actual"],
            TaskField::StartDate => &["startdate", "start"],
            TaskField::DueDate => &["duedate", "due", "enddate", "deadline"],
            TaskField::Status => &["status", "state"],
            TaskField::Rag => &["rag", "ragstatus"],
        }
    }
}

fn header_key(header: &str) -> String {
    header
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase()
}

/// Which spreadsheet column feeds which task field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMapping {
    columns: HashMap<TaskField, String>,
}

impl ColumnMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn map(mut self, field: TaskField, header: impl Into<String>) -> Self {
        self.columns.insert(field, header.into());
        self
    }

    /// Guesses a mapping from common header spellings ("Task Name",
    /// "Due Date", "days_assigned", ...). Unknown headers are ignored.
    pub fn infer(headers: &[String]) -> Self {
        let mut mapping = Self::new();
        for field in TaskField::ALL {
            if let Some(header) = headers
                .iter()
                .find(|h| field.aliases().contains(&header_key(h).as_str()))
            {
                mapping.columns.insert(field, header.clone());
            }
        }
        mapping
    }

    pub fn header_for(&self, field: TaskField) -> Option<&str> {
        self.columns.get(&field).map(String::as_str)
    }

    fn resolve(&self, headers: &[String]) -> PersistenceResult<HashMap<TaskField, usize>> {
        let mut indices = HashMap::new();
        for (field, header) in &self.columns {
            let wanted = header_key(header);
            let idx = headers
                .iter()
                .position(|h| header_key(h) == wanted)
                .ok_or_else(|| {
                    PersistenceError::InvalidData(format!("column '{header}' not found in file"))
                })?;
            indices.insert(*field, idx);
        }
        if !indices.contains_key(&TaskField::Name) {
            return Err(PersistenceError::InvalidData(
                "no column is mapped to the task name".into(),
            ));
        }
        Ok(indices)
    }
}

/// Reads tasks for `project_id` from CSV. Uses `mapping` when given, otherwise
/// infers one from the header row. Blank rows are skipped.
pub fn read_tasks_from_csv<R: Read>(
    reader: R,
    project_id: i64,
    mapping: Option<&ColumnMapping>,
) -> PersistenceResult<Vec<Task>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);
    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    let inferred;
    let mapping = match mapping {
        Some(mapping) => mapping,
        None => {
            inferred = ColumnMapping::infer(&headers);
            &inferred
        }
    };
    let indices = mapping.resolve(&headers)?;

    let mut tasks = Vec::new();
    for (row_idx, record) in reader.records().enumerate() {
        let record = record?;
        if record.iter().all(str::is_empty) {
            continue;
        }
        let line = row_idx + 2;
        let cell = |field: TaskField| cell_value(&record, &indices, field);

        let mut task = Task::new(0, project_id, cell(TaskField::Name));
        task.assignee = cell(TaskField::Assignee).to_string();
        task.days_assigned = parse_number(cell(TaskField::DaysAssigned), line)?;
        task.days_taken = parse_number(cell(TaskField::DaysTaken), line)?;
        task.start_date = parse_date(cell(TaskField::StartDate), line)?;
        task.due_date = parse_date(cell(TaskField::DueDate), line)?;
        task.status = cell(TaskField::Status)
            .parse::<TaskStatus>()
            .map_err(|err| PersistenceError::InvalidData(format!("row {line}: {err}")))?;
        task.rag = cell(TaskField::Rag)
            .parse::<Rag>()
            .map_err(|err| PersistenceError::InvalidData(format!("row {line}: {err}")))?;
        validation::validate_task(&task)
            .map_err(|err| PersistenceError::InvalidData(format!("row {line}: {err}")))?;
        tasks.push(task);
    }
    debug!(rows = tasks.len(), "parsed task import file");
    Ok(tasks)
}

fn cell_value<'a>(
    record: &'a csv::StringRecord,
    indices: &HashMap<TaskField, usize>,
    field: TaskField,
) -> &'a str {
    indices
        .get(&field)
        .and_then(|idx| record.get(*idx))
        .unwrap_or("")
}

fn parse_number(input: &str, line: usize) -> PersistenceResult<f64> {
    if input.is_empty() {
        return Ok(0.0);
    }
    input.parse::<f64>().map_err(|err| {
        PersistenceError::InvalidData(format!("row {line}: invalid number '{input}': {err}"))
    })
}

fn parse_date(input: &str, line: usize) -> PersistenceResult<Option<NaiveDate>> {
    if input.is_empty() {
        return Ok(None);
    }
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(input, format).ok())
        .map(Some)
        .ok_or_else(|| PersistenceError::InvalidData(format!("row {line}: invalid date '{input}'")))
}
