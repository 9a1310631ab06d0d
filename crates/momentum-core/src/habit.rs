//! Habit entity.
//!
//! A habit tracks a set of completion days plus a derived streak pair.
//! `streak`/`best_streak` are cached results of the full recompute in
//! [`crate::streak`]; the count of completions in the current period is
//! always derived on demand, never stored.

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, Utc, Weekday};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;
use crate::period::{self, HabitFrequency};
use crate::streak;

/// Difficulty tier applied as a multiplier when scoring a completion.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    #[default]
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn multiplier(self) -> f64 {
        match self {
            Difficulty::Easy => 1.0,
            Difficulty::Medium => 1.5,
            Difficulty::Hard => 2.0,
        }
    }
}

/// A tracked habit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HabitRecord {
    /// Unique identifier
    pub id: String,
    /// Habit name
    pub name: String,
    /// Optional description
    pub description: Option<String>,
    /// Period against which due/current-count are evaluated
    pub frequency: HabitFrequency,
    /// One normalized calendar day per completion
    #[serde(default)]
    pub completed_dates: BTreeSet<NaiveDate>,
    /// Length of the contiguous run ending at the latest completion
    pub streak: u32,
    /// Longest run ever observed; never decreases
    pub best_streak: u32,
    /// Completions aimed for per period
    pub target_count: u32,
    /// Base points awarded per completion
    pub points: u32,
    /// Difficulty tier
    #[serde(default)]
    pub difficulty: Difficulty,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl HabitRecord {
    /// Create a new habit with default values.
    pub fn new(name: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            description: None,
            frequency: HabitFrequency::Daily,
            completed_dates: BTreeSet::new(),
            streak: 0,
            best_streak: 0,
            target_count: 1,
            points: 10,
            difficulty: Difficulty::Easy,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.target_count == 0 {
            return Err(ValidationError::InvalidValue {
                field: "target_count".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Most recent completion day, if any.
    pub fn last_completed(&self) -> Option<NaiveDate> {
        self.completed_dates.iter().next_back().copied()
    }

    /// Completions falling inside the period containing `today`.
    pub fn current_count(&self, today: NaiveDate, week_starts_on: Weekday) -> u32 {
        streak::completions_in_period(&self.completed_dates, self.frequency, today, week_starts_on)
    }

    /// Whether the habit is due again on `today`.
    pub fn is_due(&self, today: NaiveDate) -> bool {
        period::is_due_today(self.last_completed(), self.frequency, today)
    }
}
