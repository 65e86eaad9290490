use crate::model::{Assignee, Holiday, Project, Task};
use std::collections::HashSet;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct ValidationError {
    message: String,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

pub fn validate_assignee(assignee: &Assignee) -> Result<(), ValidationError> {
    if assignee.name.trim().is_empty() {
        return Err(ValidationError::new("assignee name must not be empty"));
    }
    let wdpw = assignee.working_days_per_week;
    if !wdpw.is_finite() || wdpw <= 0.0 || wdpw > 7.0 {
        return Err(ValidationError::new(format!(
            "assignee '{}' has invalid working_days_per_week {} (must be in (0, 7])",
            assignee.name, wdpw
        )));
    }
    Ok(())
}

pub fn validate_assignee_collection(assignees: &[Assignee]) -> Result<(), ValidationError> {
    let mut seen = HashSet::with_capacity(assignees.len());
    for assignee in assignees {
        validate_assignee(assignee)?;
        if !seen.insert(assignee.name.trim().to_string()) {
            return Err(ValidationError::new(format!(
                "duplicate assignee name '{}'",
                assignee.name
            )));
        }
    }
    Ok(())
}

pub fn validate_holiday(holiday: &Holiday) -> Result<(), ValidationError> {
    if let Some(end) = holiday.date_end {
        if end < holiday.date {
            return Err(ValidationError::new(format!(
                "holiday end date {end} is before its start date {}",
                holiday.date
            )));
        }
    }
    Ok(())
}

pub fn validate_project(project: &Project) -> Result<(), ValidationError> {
    if project.name.trim().is_empty() {
        return Err(ValidationError::new("project name must not be empty"));
    }
    if !(0..=100).contains(&project.progress) {
        return Err(ValidationError::new(format!(
            "project '{}' has invalid progress {} (must be between 0 and 100)",
            project.name, project.progress
        )));
    }
    Ok(())
}

pub fn validate_task(task: &Task) -> Result<(), ValidationError> {
    if task.name.trim().is_empty() {
        return Err(ValidationError::new(format!(
            "task {} name must not be empty",
            task.id
        )));
    }
    for (field, value) in [
        ("days_assigned", task.days_assigned),
        ("days_taken", task.days_taken),
    ] {
        if !value.is_finite() || value < 0.0 {
            return Err(ValidationError::new(format!(
                "task '{}' has invalid {field} {value} (must be a non-negative number)",
                task.name
            )));
        }
    }
    Ok(())
}
