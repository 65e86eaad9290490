use crate::calendar::WorkCalendar;
use crate::config::DEFAULT_RAG_AMBER_BUFFER;
use crate::model::{Rag, Task, days_remaining};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which holidays count when measuring time left before a due date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RagCalendar {
    /// Weekends and public holidays.
    #[default]
    Generic,
    /// Weekends, public holidays and the assignee's own holidays.
    Assignee,
}

impl RagCalendar {
    pub fn as_str(&self) -> &'static str {
        match self {
            RagCalendar::Generic => "generic",
            RagCalendar::Assignee => "assignee",
        }
    }
}

impl fmt::Display for RagCalendar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RagCalendar {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "generic" | "public" => Ok(RagCalendar::Generic),
            "assignee" | "personal" => Ok(RagCalendar::Assignee),
            other => Err(format!("unknown rag calendar '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RagAssessment {
    pub status: Rag,
    /// Business days left over once the remaining effort is done.
    pub buffer: f64,
    pub days_remaining: f64,
    pub business_days_until_due: i64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RagClassifier {
    amber_buffer: f64,
}

impl Default for RagClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_RAG_AMBER_BUFFER)
    }
}

impl RagClassifier {
    pub fn new(amber_buffer: f64) -> Self {
        Self { amber_buffer }
    }

    pub fn amber_buffer(&self) -> f64 {
        self.amber_buffer
    }

    /// Red when the remaining effort exceeds the business days left before
    /// the due date, Amber when the buffer is at most `amber_buffer` days,
    /// Green otherwise. Days are counted from `today` through `due_date`
    /// inclusive under `calendar`.
    pub fn classify(
        &self,
        days_assigned: f64,
        days_taken: f64,
        due_date: NaiveDate,
        calendar: &WorkCalendar,
        today: NaiveDate,
    ) -> RagAssessment {
        let days_remaining = days_remaining(days_assigned, days_taken);
        let business_days_until_due = calendar.business_days(today, due_date);
        let buffer = business_days_until_due as f64 - days_remaining;
        let status = if days_remaining > business_days_until_due as f64 {
            Rag::Red
        } else if buffer <= self.amber_buffer {
            Rag::Amber
        } else {
            Rag::Green
        };
        RagAssessment {
            status,
            buffer,
            days_remaining,
            business_days_until_due,
        }
    }

    /// Classifies a task; `None` when it has no due date.
    pub fn classify_task(
        &self,
        task: &Task,
        calendar: &WorkCalendar,
        today: NaiveDate,
    ) -> Option<RagAssessment> {
        let due_date = task.due_date?;
        Some(self.classify(task.days_assigned, task.days_taken, due_date, calendar, today))
    }
}

/// Classification with the default three-day amber buffer.
pub fn classify(
    days_assigned: f64,
    days_taken: f64,
    due_date: NaiveDate,
    calendar: &WorkCalendar,
    today: NaiveDate,
) -> RagAssessment {
    RagClassifier::default().classify(days_assigned, days_taken, due_date, calendar, today)
}
