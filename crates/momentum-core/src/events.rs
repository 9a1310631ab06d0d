//! Completion records and the engine event stream.
//!
//! Every state change in the engine produces an [`EngineEvent`]. The
//! caller (service layer, notifier, CLI) consumes them from operation
//! outcomes; the engine never delivers anything itself.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Reference to the entity a completion belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum EntityRef {
    Task(String),
    Habit(String),
}

impl EntityRef {
    pub fn kind(&self) -> &'static str {
        match self {
            EntityRef::Task(_) => "task",
            EntityRef::Habit(_) => "habit",
        }
    }

    pub fn id(&self) -> &str {
        match self {
            EntityRef::Task(id) | EntityRef::Habit(id) => id,
        }
    }
}

/// A recorded completion. Hard-deleted when the completion is retracted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionEvent {
    pub id: String,
    pub user_id: String,
    pub entity: EntityRef,
    /// Instant the completion was recorded
    pub occurred_at: DateTime<Utc>,
    /// Normalized calendar day the completion counts toward
    pub day: NaiveDate,
    pub points_earned: i64,
    /// Completions of generated recurring instances are kept in the
    /// task's own history but excluded from the cross-task aggregate.
    pub is_recurring_instance: bool,
    pub notes: Option<String>,
    pub mood: Option<String>,
}

impl CompletionEvent {
    pub fn new(
        user_id: impl Into<String>,
        entity: EntityRef,
        occurred_at: DateTime<Utc>,
        day: NaiveDate,
        points_earned: i64,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            entity,
            occurred_at,
            day,
            points_earned,
            is_recurring_instance: false,
            notes: None,
            mood: None,
        }
    }
}

/// Engine event stream entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EngineEvent {
    HabitCompleted {
        habit_id: String,
        day: NaiveDate,
        points_earned: i64,
        streak: u32,
        at: DateTime<Utc>,
    },
    HabitUncompleted {
        habit_id: String,
        day: NaiveDate,
        points_removed: i64,
        streak: u32,
        at: DateTime<Utc>,
    },
    TaskCompleted {
        task_id: String,
        points_earned: i64,
        at: DateTime<Utc>,
    },
    TaskUncompleted {
        task_id: String,
        points_removed: i64,
        at: DateTime<Utc>,
    },
    /// A recurring task recorded one occurrence and advanced its due date.
    RecurringInstanceRecorded {
        task_id: String,
        day: NaiveDate,
        next_due_date: Option<NaiveDate>,
        at: DateTime<Utc>,
    },
    /// The sweep materialized a new dated instance of a recurring task.
    InstanceGenerated {
        source_task_id: String,
        instance_id: String,
        due_date: NaiveDate,
        at: DateTime<Utc>,
    },
    AchievementUnlocked {
        achievement_id: i64,
        name: String,
        at: DateTime<Utc>,
    },
    LevelChanged {
        from: u32,
        to: u32,
        at: DateTime<Utc>,
    },
}
