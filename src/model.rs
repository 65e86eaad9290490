//! Planning records: assignees, holidays, projects and tasks.

use crate::calendar::days_in_range;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_WORKING_DAYS_PER_WEEK: f64 = 5.0;

fn default_working_days_per_week() -> f64 {
    DEFAULT_WORKING_DAYS_PER_WEEK
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignee {
    #[serde(default)]
    pub id: i64,
    pub name: String,
    #[serde(default = "default_working_days_per_week")]
    pub working_days_per_week: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
}

impl Assignee {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            working_days_per_week: DEFAULT_WORKING_DAYS_PER_WEEK,
            start_date: None,
        }
    }
}

/// A non-working day or closed range of days. Without an assignee it is a
/// public holiday that applies to everybody.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Holiday {
    #[serde(default)]
    pub id: i64,
    pub date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_end: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee_id: Option<i64>,
}

impl Holiday {
    pub fn public(date: NaiveDate) -> Self {
        Self {
            id: 0,
            date,
            date_end: None,
            description: None,
            assignee_id: None,
        }
    }

    pub fn personal(assignee_id: i64, date: NaiveDate) -> Self {
        Self {
            assignee_id: Some(assignee_id),
            ..Self::public(date)
        }
    }

    pub fn with_end(mut self, date_end: NaiveDate) -> Self {
        self.date_end = Some(date_end);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Last day covered; equal to `date` for single-day holidays.
    pub fn last_day(&self) -> NaiveDate {
        self.date_end.unwrap_or(self.date)
    }

    /// Every day covered by this holiday, over its own span.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        days_in_range(self.date, self.last_day())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TaskStatus {
    #[default]
    #[serde(rename = "Not Started")]
    NotStarted,
    #[serde(rename = "In Progress")]
    InProgress,
    #[serde(rename = "Completed")]
    Completed,
    #[serde(rename = "On Hold")]
    OnHold,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::NotStarted => "Not Started",
            TaskStatus::InProgress => "In Progress",
            TaskStatus::Completed => "Completed",
            TaskStatus::OnHold => "On Hold",
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, TaskStatus::Completed)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        match key.as_str() {
            "" | "notstarted" | "todo" => Ok(TaskStatus::NotStarted),
            "inprogress" | "started" => Ok(TaskStatus::InProgress),
            "completed" | "complete" | "done" => Ok(TaskStatus::Completed),
            "onhold" | "hold" | "blocked" => Ok(TaskStatus::OnHold),
            _ => Err(format!("unknown task status '{s}'")),
        }
    }
}

/// Red/Amber/Green risk level. Stored as 1, 2 and 3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum Rag {
    #[default]
    Green,
    Amber,
    Red,
}

impl Rag {
    pub fn code(&self) -> i64 {
        match self {
            Rag::Green => 1,
            Rag::Amber => 2,
            Rag::Red => 3,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(Rag::Green),
            2 => Some(Rag::Amber),
            3 => Some(Rag::Red),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Rag::Green => "Green",
            Rag::Amber => "Amber",
            Rag::Red => "Red",
        }
    }
}

impl fmt::Display for Rag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Rag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(code) = trimmed.parse::<i64>() {
            return Rag::from_code(code).ok_or_else(|| format!("unknown rag code {code}"));
        }
        match trimmed.to_ascii_lowercase().as_str() {
            "" | "green" | "g" => Ok(Rag::Green),
            "amber" | "a" => Ok(Rag::Amber),
            "red" | "r" => Ok(Rag::Red),
            _ => Err(format!("unknown rag value '{s}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub project_id: i64,
    pub name: String,
    /// Assignee name. Not a foreign key; it may match no Assignee row.
    #[serde(default)]
    pub assignee: String,
    #[serde(default)]
    pub days_assigned: f64,
    #[serde(default)]
    pub days_taken: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub rag: Rag,
}

impl Task {
    pub fn new(id: i64, project_id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            project_id,
            name: name.into(),
            assignee: String::new(),
            days_assigned: 0.0,
            days_taken: 0.0,
            start_date: None,
            due_date: None,
            status: TaskStatus::NotStarted,
            rag: Rag::Green,
        }
    }

    pub fn days_remaining(&self) -> f64 {
        days_remaining(self.days_assigned, self.days_taken)
    }
}

/// Effort still outstanding; never negative.
pub fn days_remaining(days_assigned: f64, days_taken: f64) -> f64 {
    (days_assigned - days_taken).max(0.0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ProjectStatus {
    #[default]
    #[serde(rename = "Not Started")]
    NotStarted,
    #[serde(rename = "In Progress")]
    InProgress,
    #[serde(rename = "Completed")]
    Completed,
    #[serde(rename = "On Hold")]
    OnHold,
}

impl ProjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectStatus::NotStarted => "Not Started",
            ProjectStatus::InProgress => "In Progress",
            ProjectStatus::Completed => "Completed",
            ProjectStatus::OnHold => "On Hold",
        }
    }
}

impl FromStr for ProjectStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let status = s.parse::<TaskStatus>()?;
        Ok(match status {
            TaskStatus::NotStarted => ProjectStatus::NotStarted,
            TaskStatus::InProgress => ProjectStatus::InProgress,
            TaskStatus::Completed => ProjectStatus::Completed,
            TaskStatus::OnHold => ProjectStatus::OnHold,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    #[serde(default)]
    pub id: i64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub status: ProjectStatus,
    #[serde(default)]
    pub rag: Rag,
    /// Completed tasks as a whole percentage of all tasks.
    #[serde(default)]
    pub progress: i64,
}

impl Project {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            description: None,
            status: ProjectStatus::NotStarted,
            rag: Rag::Green,
            progress: 0,
        }
    }
}

/// `round(completed / total * 100)`, zero for an empty project.
pub fn project_progress(tasks: &[Task]) -> i64 {
    if tasks.is_empty() {
        return 0;
    }
    let completed = tasks.iter().filter(|t| t.status.is_completed()).count();
    (completed as f64 / tasks.len() as f64 * 100.0).round() as i64
}
