//! Task entity with embedded recurrence state.

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;
use crate::period::RecurrencePattern;

/// Category of task for organizing work.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TaskCategory {
    /// Active tasks that should be acted on now.
    #[default]
    Active,
    /// Someday/maybe tasks for future consideration.
    Someday,
}

/// Recurrence state embedded in a task.
///
/// `completed_instance_dates` holds one normalized calendar day per
/// recorded occurrence; the `BTreeSet` guarantees uniqueness so recording
/// a day twice cannot duplicate history. `next_due_date` is always derived
/// from the most recent completion (or the original due date when nothing
/// has been completed yet).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Recurrence {
    pub is_recurring: bool,
    pub pattern: RecurrencePattern,
    #[serde(default = "default_interval")]
    pub interval: u32,
    pub end_date: Option<NaiveDate>,
    pub next_due_date: Option<NaiveDate>,
    #[serde(default)]
    pub completed_instance_dates: BTreeSet<NaiveDate>,
}

fn default_interval() -> u32 {
    1
}

impl Recurrence {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.is_recurring {
            return Ok(());
        }
        if self.interval == 0 {
            return Err(ValidationError::ZeroInterval);
        }
        if self.pattern == RecurrencePattern::None {
            return Err(ValidationError::InvalidValue {
                field: "pattern".to_string(),
                message: "recurring task requires a pattern".to_string(),
            });
        }
        Ok(())
    }
}

/// A tracked task. Non-recurring tasks complete once; recurring tasks act
/// as templates that record per-day instance completions and spawn dated
/// instance copies on sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord {
    /// Unique identifier
    pub id: String,
    /// Task title
    pub title: String,
    /// Optional description
    pub description: Option<String>,
    /// Priority (1 = lowest, 5 = highest)
    pub priority: u8,
    /// Task category (active/someday)
    #[serde(default)]
    pub category: TaskCategory,
    /// Due timestamp (null for undated tasks)
    pub due_date: Option<DateTime<Utc>>,
    /// Whether the task is completed (non-recurring path)
    pub completed: bool,
    /// Completion timestamp (null if not completed)
    pub completed_at: Option<DateTime<Utc>>,
    /// Recurrence state
    #[serde(default)]
    pub recurrence: Recurrence,
    /// Root of the instance chain this task was generated from
    pub original_task_id: Option<String>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl TaskRecord {
    /// Create a new task with default values.
    pub fn new(title: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title: title.into(),
            description: None,
            priority: 3,
            category: TaskCategory::Active,
            due_date: None,
            completed: false,
            completed_at: None,
            recurrence: Recurrence::default(),
            original_task_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Configure recurrence, seeding `next_due_date` from the task's due
    /// date (first occurrence is the original due day).
    pub fn with_recurrence(mut self, pattern: RecurrencePattern, interval: u32) -> Self {
        self.recurrence.is_recurring = true;
        self.recurrence.pattern = pattern;
        self.recurrence.interval = interval;
        self.recurrence.next_due_date = self.due_date.map(|d| d.date_naive());
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if !(1..=5).contains(&self.priority) {
            return Err(ValidationError::PriorityOutOfRange {
                value: self.priority,
            });
        }
        self.recurrence.validate()
    }

    /// Whether the task participates in the recurring completion path.
    pub fn is_recurring(&self) -> bool {
        self.recurrence.is_recurring && self.recurrence.pattern != RecurrencePattern::None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap()
    }

    #[test]
    fn new_task_is_pending_and_non_recurring() {
        let task = TaskRecord::new("write report", now());
        assert!(!task.completed);
        assert!(!task.is_recurring());
        assert_eq!(task.priority, 3);
        assert!(task.validate().is_ok());
    }

    #[test]
    fn with_recurrence_seeds_next_due_from_due_date() {
        let mut task = TaskRecord::new("water plants", now());
        task.due_date = Some(now());
        let task = task.with_recurrence(RecurrencePattern::Weekly, 1);
        assert!(task.is_recurring());
        assert_eq!(
            task.recurrence.next_due_date,
            Some(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap())
        );
    }

    #[test]
    fn validate_rejects_bad_priority_and_zero_interval() {
        let mut task = TaskRecord::new("t", now());
        task.priority = 0;
        assert!(matches!(
            task.validate(),
            Err(ValidationError::PriorityOutOfRange { value: 0 })
        ));

        let mut task = TaskRecord::new("t", now()).with_recurrence(RecurrencePattern::Daily, 1);
        task.recurrence.interval = 0;
        assert!(matches!(
            task.validate(),
            Err(ValidationError::ZeroInterval)
        ));
    }

    #[test]
    fn recurring_flag_requires_a_pattern() {
        let mut task = TaskRecord::new("t", now());
        task.recurrence.is_recurring = true;
        assert!(!task.is_recurring());
        assert!(task.validate().is_err());
    }
}
