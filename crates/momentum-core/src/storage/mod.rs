//! Persistence collaborator and its SQLite/TOML implementations.
//!
//! The engine itself performs no I/O; everything it needs from storage is
//! expressed by [`ProgressStore`]. The bundled [`Database`] implements it
//! over SQLite, and [`EngineConfig`] holds the TOML-backed policy knobs.

mod config;
pub mod database;

pub use config::{EngineConfig, PeriodConfig, WeekStart};
pub use database::Database;

use std::collections::BTreeSet;
use std::path::PathBuf;

use chrono::NaiveDate;

use crate::error::StorageError;
use crate::events::{CompletionEvent, EntityRef};
use crate::habit::HabitRecord;
use crate::scoring::{Achievement, AchievementUnlock, UserProgress};
use crate::task::TaskRecord;

/// Returns the Momentum data directory.
///
/// Defaults to `~/.config/momentum`; `MOMENTUM_ENV=dev` switches to
/// `~/.config/momentum-dev`, and `MOMENTUM_DATA_DIR` overrides the path
/// entirely (useful for tests and scripted runs).
pub fn data_dir() -> Result<PathBuf, StorageError> {
    let dir = match std::env::var("MOMENTUM_DATA_DIR") {
        Ok(path) if !path.is_empty() => PathBuf::from(path),
        _ => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");
            let env = std::env::var("MOMENTUM_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("momentum-dev")
            } else {
                base_dir.join("momentum")
            }
        }
    };

    std::fs::create_dir_all(&dir).map_err(|err| StorageError::DataDir(err.to_string()))?;
    Ok(dir)
}

/// Persistence collaborator consumed by the engine.
pub trait ProgressStore {
    fn load_task(&self, id: &str) -> Result<Option<TaskRecord>, StorageError>;
    fn save_task(&mut self, task: &TaskRecord) -> Result<(), StorageError>;
    fn load_tasks(&self) -> Result<Vec<TaskRecord>, StorageError>;
    /// All tasks participating in the recurring sweep.
    fn load_recurring_tasks(&self) -> Result<Vec<TaskRecord>, StorageError>;

    fn load_habit(&self, id: &str) -> Result<Option<HabitRecord>, StorageError>;
    fn save_habit(&mut self, habit: &HabitRecord) -> Result<(), StorageError>;
    fn load_habits(&self) -> Result<Vec<HabitRecord>, StorageError>;
    /// Remove a habit and cascade its completion events.
    fn delete_habit(&mut self, id: &str) -> Result<(), StorageError>;

    /// Load the aggregate, defaulting to a zeroed one for new users.
    fn load_user_progress(&self, user_id: &str) -> Result<UserProgress, StorageError>;
    fn save_user_progress(&mut self, progress: &UserProgress) -> Result<(), StorageError>;
    fn all_user_progress(&self) -> Result<Vec<UserProgress>, StorageError>;

    fn achievement_catalog(&self) -> Result<Vec<Achievement>, StorageError>;
    fn unlocked_achievement_ids(&self, user_id: &str) -> Result<BTreeSet<i64>, StorageError>;
    fn unlocks_for_user(&self, user_id: &str) -> Result<Vec<AchievementUnlock>, StorageError>;
    /// Insert an unlock; inserting the same (user, achievement) twice is a
    /// no-op.
    fn record_unlock(&mut self, unlock: &AchievementUnlock) -> Result<(), StorageError>;
    /// Return unlocks still flagged new and clear the flag.
    fn take_new_unlocks(&mut self, user_id: &str) -> Result<Vec<AchievementUnlock>, StorageError>;

    fn append_completion(&mut self, event: &CompletionEvent) -> Result<(), StorageError>;
    /// Remove the completion for one entity and day, returning it.
    fn remove_completion(
        &mut self,
        entity: &EntityRef,
        day: NaiveDate,
    ) -> Result<Option<CompletionEvent>, StorageError>;
    fn completions_for_user(&self, user_id: &str) -> Result<Vec<CompletionEvent>, StorageError>;
}
