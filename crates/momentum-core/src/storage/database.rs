//! SQLite-backed [`ProgressStore`].
//!
//! Entities persist with calendar days normalized to `YYYY-MM-DD` strings
//! and timestamps as RFC 3339 UTC. Completion-day sets are stored as JSON
//! arrays of day strings, which keeps membership tests free of timezone
//! drift on the way in and out.

use std::collections::BTreeSet;
use std::path::PathBuf;

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::debug;

use super::{data_dir, ProgressStore};
use crate::error::StorageError;
use crate::events::{CompletionEvent, EntityRef};
use crate::habit::{Difficulty, HabitRecord};
use crate::period::{HabitFrequency, RecurrencePattern};
use crate::scoring::{Achievement, AchievementUnlock, UserProgress};
use crate::task::{Recurrence, TaskCategory, TaskRecord};

/// SQLite database holding tasks, habits, completions, the per-user
/// progress aggregate, and the achievement catalog.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open the database at `<data_dir>/momentum.db`, creating the file
    /// and schema as needed and seeding the built-in achievement catalog.
    pub fn open() -> Result<Self, StorageError> {
        let path = data_dir()?.join("momentum.db");
        Self::open_at(path)
    }

    /// Open at an explicit path.
    pub fn open_at(path: PathBuf) -> Result<Self, StorageError> {
        let conn = Connection::open(&path)
            .map_err(|source| StorageError::OpenFailed { path, source })?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database (tests and ephemeral runs).
    pub fn open_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()
            .map_err(|source| StorageError::OpenFailed {
                path: PathBuf::from(":memory:"),
                source,
            })?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<(), StorageError> {
        self.conn
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS tasks (
                    id              TEXT PRIMARY KEY,
                    title           TEXT NOT NULL,
                    description     TEXT,
                    priority        INTEGER NOT NULL DEFAULT 3,
                    category        TEXT NOT NULL DEFAULT 'active',
                    due_date        TEXT,
                    completed       INTEGER NOT NULL DEFAULT 0,
                    completed_at    TEXT,
                    is_recurring    INTEGER NOT NULL DEFAULT 0,
                    pattern         TEXT NOT NULL DEFAULT 'none',
                    recur_interval  INTEGER NOT NULL DEFAULT 1,
                    end_date        TEXT,
                    next_due_date   TEXT,
                    instance_dates  TEXT NOT NULL DEFAULT '[]',
                    original_task_id TEXT,
                    created_at      TEXT NOT NULL,
                    updated_at      TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS habits (
                    id              TEXT PRIMARY KEY,
                    name            TEXT NOT NULL,
                    description     TEXT,
                    frequency       TEXT NOT NULL DEFAULT 'daily',
                    completed_dates TEXT NOT NULL DEFAULT '[]',
                    streak          INTEGER NOT NULL DEFAULT 0,
                    best_streak     INTEGER NOT NULL DEFAULT 0,
                    target_count    INTEGER NOT NULL DEFAULT 1,
                    points          INTEGER NOT NULL DEFAULT 10,
                    difficulty      TEXT NOT NULL DEFAULT 'easy',
                    created_at      TEXT NOT NULL,
                    updated_at      TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS completions (
                    id              TEXT PRIMARY KEY,
                    user_id         TEXT NOT NULL,
                    entity_kind     TEXT NOT NULL,
                    entity_id       TEXT NOT NULL,
                    occurred_at     TEXT NOT NULL,
                    day             TEXT NOT NULL,
                    points_earned   INTEGER NOT NULL,
                    is_recurring_instance INTEGER NOT NULL DEFAULT 0,
                    notes           TEXT,
                    mood            TEXT,
                    UNIQUE (entity_kind, entity_id, day)
                );

                CREATE TABLE IF NOT EXISTS user_progress (
                    user_id         TEXT PRIMARY KEY,
                    total_points    INTEGER NOT NULL DEFAULT 0,
                    current_streak  INTEGER NOT NULL DEFAULT 0,
                    best_streak     INTEGER NOT NULL DEFAULT 0,
                    last_completion_date TEXT
                );

                CREATE TABLE IF NOT EXISTS achievements (
                    id              INTEGER PRIMARY KEY,
                    name            TEXT NOT NULL,
                    description     TEXT NOT NULL DEFAULT '',
                    icon            TEXT,
                    points_required INTEGER,
                    streak_required INTEGER,
                    level_required  INTEGER,
                    tasks_completed_required INTEGER
                );

                CREATE TABLE IF NOT EXISTS achievement_unlocks (
                    user_id         TEXT NOT NULL,
                    achievement_id  INTEGER NOT NULL,
                    unlocked_at     TEXT NOT NULL,
                    is_new          INTEGER NOT NULL DEFAULT 1,
                    PRIMARY KEY (user_id, achievement_id)
                );

                CREATE INDEX IF NOT EXISTS idx_completions_user ON completions(user_id);
                CREATE INDEX IF NOT EXISTS idx_completions_entity
                    ON completions(entity_kind, entity_id, day);
                CREATE INDEX IF NOT EXISTS idx_tasks_recurring ON tasks(is_recurring);",
            )
            .map_err(|err| StorageError::MigrationFailed(err.to_string()))?;

        self.seed_achievements()
    }

    fn seed_achievements(&self) -> Result<(), StorageError> {
        for achievement in Achievement::default_catalog() {
            self.conn.execute(
                "INSERT OR IGNORE INTO achievements
                 (id, name, description, icon, points_required, streak_required,
                  level_required, tasks_completed_required)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    achievement.id,
                    achievement.name,
                    achievement.description,
                    achievement.icon,
                    achievement.points_required,
                    achievement.streak_required,
                    achievement.level_required,
                    achievement.tasks_completed_required,
                ],
            )?;
        }
        Ok(())
    }
}

// Column codecs. Enums persist as the same lowercase strings serde uses.

fn pattern_to_str(pattern: RecurrencePattern) -> &'static str {
    match pattern {
        RecurrencePattern::None => "none",
        RecurrencePattern::Daily => "daily",
        RecurrencePattern::Weekly => "weekly",
        RecurrencePattern::Monthly => "monthly",
        RecurrencePattern::Yearly => "yearly",
    }
}

fn pattern_from_str(value: &str) -> Result<RecurrencePattern, StorageError> {
    match value {
        "none" => Ok(RecurrencePattern::None),
        "daily" => Ok(RecurrencePattern::Daily),
        "weekly" => Ok(RecurrencePattern::Weekly),
        "monthly" => Ok(RecurrencePattern::Monthly),
        "yearly" => Ok(RecurrencePattern::Yearly),
        other => Err(StorageError::CorruptRecord {
            table: "tasks",
            message: format!("unknown pattern '{other}'"),
        }),
    }
}

fn frequency_to_str(frequency: HabitFrequency) -> &'static str {
    match frequency {
        HabitFrequency::Daily => "daily",
        HabitFrequency::Weekly => "weekly",
        HabitFrequency::Monthly => "monthly",
    }
}

fn frequency_from_str(value: &str) -> Result<HabitFrequency, StorageError> {
    match value {
        "daily" => Ok(HabitFrequency::Daily),
        "weekly" => Ok(HabitFrequency::Weekly),
        "monthly" => Ok(HabitFrequency::Monthly),
        other => Err(StorageError::CorruptRecord {
            table: "habits",
            message: format!("unknown frequency '{other}'"),
        }),
    }
}

fn difficulty_to_str(difficulty: Difficulty) -> &'static str {
    match difficulty {
        Difficulty::Easy => "easy",
        Difficulty::Medium => "medium",
        Difficulty::Hard => "hard",
    }
}

fn difficulty_from_str(value: &str) -> Result<Difficulty, StorageError> {
    match value {
        "easy" => Ok(Difficulty::Easy),
        "medium" => Ok(Difficulty::Medium),
        "hard" => Ok(Difficulty::Hard),
        other => Err(StorageError::CorruptRecord {
            table: "habits",
            message: format!("unknown difficulty '{other}'"),
        }),
    }
}

fn category_to_str(category: TaskCategory) -> &'static str {
    match category {
        TaskCategory::Active => "active",
        TaskCategory::Someday => "someday",
    }
}

fn category_from_str(value: &str) -> Result<TaskCategory, StorageError> {
    match value {
        "active" => Ok(TaskCategory::Active),
        "someday" => Ok(TaskCategory::Someday),
        other => Err(StorageError::CorruptRecord {
            table: "tasks",
            message: format!("unknown category '{other}'"),
        }),
    }
}

fn day_to_str(day: NaiveDate) -> String {
    day.format("%Y-%m-%d").to_string()
}

fn day_from_str(table: &'static str, value: &str) -> Result<NaiveDate, StorageError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| StorageError::CorruptRecord {
        table,
        message: format!("bad day '{value}'"),
    })
}

fn opt_day_from_str(
    table: &'static str,
    value: Option<String>,
) -> Result<Option<NaiveDate>, StorageError> {
    value.map(|v| day_from_str(table, &v)).transpose()
}

fn timestamp_from_str(table: &'static str, value: &str) -> Result<DateTime<Utc>, StorageError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| StorageError::CorruptRecord {
            table,
            message: format!("bad timestamp '{value}'"),
        })
}

fn opt_timestamp_from_str(
    table: &'static str,
    value: Option<String>,
) -> Result<Option<DateTime<Utc>>, StorageError> {
    value.map(|v| timestamp_from_str(table, &v)).transpose()
}

fn days_to_json(days: &BTreeSet<NaiveDate>) -> Result<String, StorageError> {
    let strings: Vec<String> = days.iter().map(|day| day_to_str(*day)).collect();
    serde_json::to_string(&strings).map_err(|err| StorageError::CorruptRecord {
        table: "days",
        message: err.to_string(),
    })
}

fn days_from_json(table: &'static str, value: &str) -> Result<BTreeSet<NaiveDate>, StorageError> {
    let strings: Vec<String> =
        serde_json::from_str(value).map_err(|err| StorageError::CorruptRecord {
            table,
            message: err.to_string(),
        })?;
    strings
        .iter()
        .map(|s| day_from_str(table, s))
        .collect()
}

// Raw row mirrors. Decoding happens after the rusqlite row borrow ends.

struct RawTask {
    id: String,
    title: String,
    description: Option<String>,
    priority: u8,
    category: String,
    due_date: Option<String>,
    completed: bool,
    completed_at: Option<String>,
    is_recurring: bool,
    pattern: String,
    recur_interval: u32,
    end_date: Option<String>,
    next_due_date: Option<String>,
    instance_dates: String,
    original_task_id: Option<String>,
    created_at: String,
    updated_at: String,
}

impl RawTask {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            title: row.get(1)?,
            description: row.get(2)?,
            priority: row.get(3)?,
            category: row.get(4)?,
            due_date: row.get(5)?,
            completed: row.get(6)?,
            completed_at: row.get(7)?,
            is_recurring: row.get(8)?,
            pattern: row.get(9)?,
            recur_interval: row.get(10)?,
            end_date: row.get(11)?,
            next_due_date: row.get(12)?,
            instance_dates: row.get(13)?,
            original_task_id: row.get(14)?,
            created_at: row.get(15)?,
            updated_at: row.get(16)?,
        })
    }

    fn decode(self) -> Result<TaskRecord, StorageError> {
        Ok(TaskRecord {
            id: self.id,
            title: self.title,
            description: self.description,
            priority: self.priority,
            category: category_from_str(&self.category)?,
            due_date: opt_timestamp_from_str("tasks", self.due_date)?,
            completed: self.completed,
            completed_at: opt_timestamp_from_str("tasks", self.completed_at)?,
            recurrence: Recurrence {
                is_recurring: self.is_recurring,
                pattern: pattern_from_str(&self.pattern)?,
                interval: self.recur_interval,
                end_date: opt_day_from_str("tasks", self.end_date)?,
                next_due_date: opt_day_from_str("tasks", self.next_due_date)?,
                completed_instance_dates: days_from_json("tasks", &self.instance_dates)?,
            },
            original_task_id: self.original_task_id,
            created_at: timestamp_from_str("tasks", &self.created_at)?,
            updated_at: timestamp_from_str("tasks", &self.updated_at)?,
        })
    }
}

const TASK_COLUMNS: &str = "id, title, description, priority, category, due_date, completed, \
     completed_at, is_recurring, pattern, recur_interval, end_date, next_due_date, \
     instance_dates, original_task_id, created_at, updated_at";

struct RawHabit {
    id: String,
    name: String,
    description: Option<String>,
    frequency: String,
    completed_dates: String,
    streak: u32,
    best_streak: u32,
    target_count: u32,
    points: u32,
    difficulty: String,
    created_at: String,
    updated_at: String,
}

impl RawHabit {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            description: row.get(2)?,
            frequency: row.get(3)?,
            completed_dates: row.get(4)?,
            streak: row.get(5)?,
            best_streak: row.get(6)?,
            target_count: row.get(7)?,
            points: row.get(8)?,
            difficulty: row.get(9)?,
            created_at: row.get(10)?,
            updated_at: row.get(11)?,
        })
    }

    fn decode(self) -> Result<HabitRecord, StorageError> {
        Ok(HabitRecord {
            id: self.id,
            name: self.name,
            description: self.description,
            frequency: frequency_from_str(&self.frequency)?,
            completed_dates: days_from_json("habits", &self.completed_dates)?,
            streak: self.streak,
            best_streak: self.best_streak,
            target_count: self.target_count,
            points: self.points,
            difficulty: difficulty_from_str(&self.difficulty)?,
            created_at: timestamp_from_str("habits", &self.created_at)?,
            updated_at: timestamp_from_str("habits", &self.updated_at)?,
        })
    }
}

const HABIT_COLUMNS: &str = "id, name, description, frequency, completed_dates, streak, \
     best_streak, target_count, points, difficulty, created_at, updated_at";

struct RawCompletion {
    id: String,
    user_id: String,
    entity_kind: String,
    entity_id: String,
    occurred_at: String,
    day: String,
    points_earned: i64,
    is_recurring_instance: bool,
    notes: Option<String>,
    mood: Option<String>,
}

impl RawCompletion {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            entity_kind: row.get(2)?,
            entity_id: row.get(3)?,
            occurred_at: row.get(4)?,
            day: row.get(5)?,
            points_earned: row.get(6)?,
            is_recurring_instance: row.get(7)?,
            notes: row.get(8)?,
            mood: row.get(9)?,
        })
    }

    fn decode(self) -> Result<CompletionEvent, StorageError> {
        let entity = match self.entity_kind.as_str() {
            "task" => EntityRef::Task(self.entity_id),
            "habit" => EntityRef::Habit(self.entity_id),
            other => {
                return Err(StorageError::CorruptRecord {
                    table: "completions",
                    message: format!("unknown entity kind '{other}'"),
                })
            }
        };
        Ok(CompletionEvent {
            id: self.id,
            user_id: self.user_id,
            entity,
            occurred_at: timestamp_from_str("completions", &self.occurred_at)?,
            day: day_from_str("completions", &self.day)?,
            points_earned: self.points_earned,
            is_recurring_instance: self.is_recurring_instance,
            notes: self.notes,
            mood: self.mood,
        })
    }
}

const COMPLETION_COLUMNS: &str = "id, user_id, entity_kind, entity_id, occurred_at, day, \
     points_earned, is_recurring_instance, notes, mood";

fn achievement_from_row(row: &Row) -> rusqlite::Result<Achievement> {
    Ok(Achievement {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        icon: row.get(3)?,
        points_required: row.get(4)?,
        streak_required: row.get(5)?,
        level_required: row.get(6)?,
        tasks_completed_required: row.get(7)?,
    })
}

impl ProgressStore for Database {
    fn load_task(&self, id: &str) -> Result<Option<TaskRecord>, StorageError> {
        let raw = self
            .conn
            .query_row(
                &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1"),
                params![id],
                RawTask::from_row,
            )
            .optional()?;
        raw.map(RawTask::decode).transpose()
    }

    fn save_task(&mut self, task: &TaskRecord) -> Result<(), StorageError> {
        debug!(task = %task.id, "saving task");
        self.conn.execute(
            &format!(
                "INSERT OR REPLACE INTO tasks ({TASK_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)"
            ),
            params![
                task.id,
                task.title,
                task.description,
                task.priority,
                category_to_str(task.category),
                task.due_date.map(|dt| dt.to_rfc3339()),
                task.completed,
                task.completed_at.map(|dt| dt.to_rfc3339()),
                task.recurrence.is_recurring,
                pattern_to_str(task.recurrence.pattern),
                task.recurrence.interval,
                task.recurrence.end_date.map(day_to_str),
                task.recurrence.next_due_date.map(day_to_str),
                days_to_json(&task.recurrence.completed_instance_dates)?,
                task.original_task_id,
                task.created_at.to_rfc3339(),
                task.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn load_tasks(&self) -> Result<Vec<TaskRecord>, StorageError> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {TASK_COLUMNS} FROM tasks ORDER BY created_at"))?;
        let raws = stmt
            .query_map([], RawTask::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        raws.into_iter().map(RawTask::decode).collect()
    }

    fn load_recurring_tasks(&self) -> Result<Vec<TaskRecord>, StorageError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE is_recurring = 1 ORDER BY created_at"
        ))?;
        let raws = stmt
            .query_map([], RawTask::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        raws.into_iter().map(RawTask::decode).collect()
    }

    fn load_habit(&self, id: &str) -> Result<Option<HabitRecord>, StorageError> {
        let raw = self
            .conn
            .query_row(
                &format!("SELECT {HABIT_COLUMNS} FROM habits WHERE id = ?1"),
                params![id],
                RawHabit::from_row,
            )
            .optional()?;
        raw.map(RawHabit::decode).transpose()
    }

    fn save_habit(&mut self, habit: &HabitRecord) -> Result<(), StorageError> {
        debug!(habit = %habit.id, "saving habit");
        self.conn.execute(
            &format!(
                "INSERT OR REPLACE INTO habits ({HABIT_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"
            ),
            params![
                habit.id,
                habit.name,
                habit.description,
                frequency_to_str(habit.frequency),
                days_to_json(&habit.completed_dates)?,
                habit.streak,
                habit.best_streak,
                habit.target_count,
                habit.points,
                difficulty_to_str(habit.difficulty),
                habit.created_at.to_rfc3339(),
                habit.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn load_habits(&self) -> Result<Vec<HabitRecord>, StorageError> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {HABIT_COLUMNS} FROM habits ORDER BY created_at"))?;
        let raws = stmt
            .query_map([], RawHabit::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        raws.into_iter().map(RawHabit::decode).collect()
    }

    fn delete_habit(&mut self, id: &str) -> Result<(), StorageError> {
        self.conn.execute(
            "DELETE FROM completions WHERE entity_kind = 'habit' AND entity_id = ?1",
            params![id],
        )?;
        self.conn
            .execute("DELETE FROM habits WHERE id = ?1", params![id])?;
        Ok(())
    }

    fn load_user_progress(&self, user_id: &str) -> Result<UserProgress, StorageError> {
        let row = self
            .conn
            .query_row(
                "SELECT user_id, total_points, current_streak, best_streak, last_completion_date
                 FROM user_progress WHERE user_id = ?1",
                params![user_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, u32>(2)?,
                        row.get::<_, u32>(3)?,
                        row.get::<_, Option<String>>(4)?,
                    ))
                },
            )
            .optional()?;

        match row {
            Some((user_id, total_points, current_streak, best_streak, last)) => Ok(UserProgress {
                user_id,
                total_points,
                current_streak,
                best_streak,
                last_completion_date: opt_day_from_str("user_progress", last)?,
            }),
            None => Ok(UserProgress::new(user_id)),
        }
    }

    fn save_user_progress(&mut self, progress: &UserProgress) -> Result<(), StorageError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO user_progress
             (user_id, total_points, current_streak, best_streak, last_completion_date)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                progress.user_id,
                progress.total_points,
                progress.current_streak,
                progress.best_streak,
                progress.last_completion_date.map(day_to_str),
            ],
        )?;
        Ok(())
    }

    fn all_user_progress(&self) -> Result<Vec<UserProgress>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT user_id, total_points, current_streak, best_streak, last_completion_date
             FROM user_progress ORDER BY user_id",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, u32>(2)?,
                    row.get::<_, u32>(3)?,
                    row.get::<_, Option<String>>(4)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter()
            .map(|(user_id, total_points, current_streak, best_streak, last)| {
                Ok(UserProgress {
                    user_id,
                    total_points,
                    current_streak,
                    best_streak,
                    last_completion_date: opt_day_from_str("user_progress", last)?,
                })
            })
            .collect()
    }

    fn achievement_catalog(&self) -> Result<Vec<Achievement>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, description, icon, points_required, streak_required,
                    level_required, tasks_completed_required
             FROM achievements ORDER BY id",
        )?;
        let catalog = stmt
            .query_map([], achievement_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(catalog)
    }

    fn unlocked_achievement_ids(&self, user_id: &str) -> Result<BTreeSet<i64>, StorageError> {
        let mut stmt = self
            .conn
            .prepare("SELECT achievement_id FROM achievement_unlocks WHERE user_id = ?1")?;
        let ids = stmt
            .query_map(params![user_id], |row| row.get::<_, i64>(0))?
            .collect::<rusqlite::Result<BTreeSet<_>>>()?;
        Ok(ids)
    }

    fn unlocks_for_user(&self, user_id: &str) -> Result<Vec<AchievementUnlock>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT user_id, achievement_id, unlocked_at, is_new
             FROM achievement_unlocks WHERE user_id = ?1 ORDER BY achievement_id",
        )?;
        let rows = stmt
            .query_map(params![user_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, bool>(3)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter()
            .map(|(user_id, achievement_id, unlocked_at, is_new)| {
                Ok(AchievementUnlock {
                    user_id,
                    achievement_id,
                    unlocked_at: timestamp_from_str("achievement_unlocks", &unlocked_at)?,
                    is_new,
                })
            })
            .collect()
    }

    fn record_unlock(&mut self, unlock: &AchievementUnlock) -> Result<(), StorageError> {
        self.conn.execute(
            "INSERT OR IGNORE INTO achievement_unlocks
             (user_id, achievement_id, unlocked_at, is_new)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                unlock.user_id,
                unlock.achievement_id,
                unlock.unlocked_at.to_rfc3339(),
                unlock.is_new,
            ],
        )?;
        Ok(())
    }

    fn take_new_unlocks(&mut self, user_id: &str) -> Result<Vec<AchievementUnlock>, StorageError> {
        let fresh: Vec<AchievementUnlock> = self
            .unlocks_for_user(user_id)?
            .into_iter()
            .filter(|unlock| unlock.is_new)
            .collect();
        if !fresh.is_empty() {
            self.conn.execute(
                "UPDATE achievement_unlocks SET is_new = 0 WHERE user_id = ?1 AND is_new = 1",
                params![user_id],
            )?;
        }
        Ok(fresh)
    }

    fn append_completion(&mut self, event: &CompletionEvent) -> Result<(), StorageError> {
        debug!(entity = event.entity.id(), day = %event.day, "appending completion");
        self.conn.execute(
            &format!(
                "INSERT INTO completions ({COMPLETION_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"
            ),
            params![
                event.id,
                event.user_id,
                event.entity.kind(),
                event.entity.id(),
                event.occurred_at.to_rfc3339(),
                day_to_str(event.day),
                event.points_earned,
                event.is_recurring_instance,
                event.notes,
                event.mood,
            ],
        )?;
        Ok(())
    }

    fn remove_completion(
        &mut self,
        entity: &EntityRef,
        day: NaiveDate,
    ) -> Result<Option<CompletionEvent>, StorageError> {
        let raw = self
            .conn
            .query_row(
                &format!(
                    "SELECT {COMPLETION_COLUMNS} FROM completions
                     WHERE entity_kind = ?1 AND entity_id = ?2 AND day = ?3"
                ),
                params![entity.kind(), entity.id(), day_to_str(day)],
                RawCompletion::from_row,
            )
            .optional()?;
        let Some(raw) = raw else {
            return Ok(None);
        };

        self.conn.execute(
            "DELETE FROM completions WHERE entity_kind = ?1 AND entity_id = ?2 AND day = ?3",
            params![entity.kind(), entity.id(), day_to_str(day)],
        )?;
        raw.decode().map(Some)
    }

    fn completions_for_user(&self, user_id: &str) -> Result<Vec<CompletionEvent>, StorageError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {COMPLETION_COLUMNS} FROM completions
             WHERE user_id = ?1 ORDER BY day, occurred_at"
        ))?;
        let raws = stmt
            .query_map(params![user_id], RawCompletion::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        raws.into_iter().map(RawCompletion::decode).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::period::RecurrencePattern;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn task_roundtrip_preserves_recurrence() {
        let mut db = Database::open_memory().unwrap();
        let mut task = TaskRecord::new("water plants", at(2024, 1, 1));
        task.due_date = Some(at(2024, 1, 1));
        let mut task = task.with_recurrence(RecurrencePattern::Weekly, 2);
        task.recurrence.completed_instance_dates.insert(day(2024, 1, 1));
        task.recurrence.end_date = Some(day(2024, 6, 1));

        db.save_task(&task).unwrap();
        let loaded = db.load_task(&task.id).unwrap().unwrap();
        assert_eq!(loaded.title, "water plants");
        assert_eq!(loaded.recurrence, task.recurrence);
        assert_eq!(loaded.priority, task.priority);
    }

    #[test]
    fn load_missing_task_is_none() {
        let db = Database::open_memory().unwrap();
        assert!(db.load_task("nope").unwrap().is_none());
    }

    #[test]
    fn habit_roundtrip_preserves_dates_and_streaks() {
        let mut db = Database::open_memory().unwrap();
        let mut habit = HabitRecord::new("stretch", at(2024, 1, 1));
        habit.completed_dates.insert(day(2024, 1, 1));
        habit.completed_dates.insert(day(2024, 1, 2));
        habit.streak = 2;
        habit.best_streak = 5;
        habit.difficulty = Difficulty::Hard;

        db.save_habit(&habit).unwrap();
        let loaded = db.load_habit(&habit.id).unwrap().unwrap();
        assert_eq!(loaded.completed_dates, habit.completed_dates);
        assert_eq!(loaded.streak, 2);
        assert_eq!(loaded.best_streak, 5);
        assert_eq!(loaded.difficulty, Difficulty::Hard);
    }

    #[test]
    fn recurring_filter_excludes_plain_tasks() {
        let mut db = Database::open_memory().unwrap();
        let plain = TaskRecord::new("one-off", at(2024, 1, 1));
        let mut recurring = TaskRecord::new("weekly", at(2024, 1, 1));
        recurring.due_date = Some(at(2024, 1, 1));
        let recurring = recurring.with_recurrence(RecurrencePattern::Weekly, 1);

        db.save_task(&plain).unwrap();
        db.save_task(&recurring).unwrap();
        let swept = db.load_recurring_tasks().unwrap();
        assert_eq!(swept.len(), 1);
        assert_eq!(swept[0].id, recurring.id);
    }

    #[test]
    fn completion_append_and_remove() {
        let mut db = Database::open_memory().unwrap();
        let entity = EntityRef::Habit("h-1".to_string());
        let event = CompletionEvent::new("local", entity.clone(), at(2024, 1, 2), day(2024, 1, 2), 10);
        db.append_completion(&event).unwrap();

        assert_eq!(db.completions_for_user("local").unwrap().len(), 1);
        let removed = db.remove_completion(&entity, day(2024, 1, 2)).unwrap();
        assert_eq!(removed.map(|e| e.points_earned), Some(10));
        assert!(db.completions_for_user("local").unwrap().is_empty());
        // Removing again is a no-op.
        assert!(db.remove_completion(&entity, day(2024, 1, 2)).unwrap().is_none());
    }

    #[test]
    fn duplicate_completion_for_same_day_is_rejected() {
        let mut db = Database::open_memory().unwrap();
        let entity = EntityRef::Habit("h-1".to_string());
        let event = CompletionEvent::new("local", entity.clone(), at(2024, 1, 2), day(2024, 1, 2), 10);
        db.append_completion(&event).unwrap();

        let duplicate =
            CompletionEvent::new("local", entity, at(2024, 1, 2), day(2024, 1, 2), 10);
        assert!(db.append_completion(&duplicate).is_err());
    }

    #[test]
    fn user_progress_defaults_then_persists() {
        let mut db = Database::open_memory().unwrap();
        let fresh = db.load_user_progress("local").unwrap();
        assert_eq!(fresh.total_points, 0);

        let mut progress = UserProgress::new("local");
        progress.total_points = 120;
        progress.current_streak = 3;
        progress.best_streak = 4;
        progress.last_completion_date = Some(day(2024, 1, 2));
        db.save_user_progress(&progress).unwrap();

        let loaded = db.load_user_progress("local").unwrap();
        assert_eq!(loaded.total_points, 120);
        assert_eq!(loaded.best_streak, 4);
        assert_eq!(loaded.last_completion_date, Some(day(2024, 1, 2)));
    }

    #[test]
    fn catalog_is_seeded_once() {
        let db = Database::open_memory().unwrap();
        let catalog = db.achievement_catalog().unwrap();
        assert_eq!(catalog.len(), Achievement::default_catalog().len());
        // Re-running migration must not duplicate entries.
        db.migrate().unwrap();
        assert_eq!(db.achievement_catalog().unwrap().len(), catalog.len());
    }

    #[test]
    fn unlock_is_idempotent_and_new_flag_clears_once() {
        let mut db = Database::open_memory().unwrap();
        let unlock = AchievementUnlock::new("local", 1, at(2024, 1, 2));
        db.record_unlock(&unlock).unwrap();
        db.record_unlock(&unlock).unwrap();
        assert_eq!(db.unlocked_achievement_ids("local").unwrap().len(), 1);

        let fresh = db.take_new_unlocks("local").unwrap();
        assert_eq!(fresh.len(), 1);
        assert!(db.take_new_unlocks("local").unwrap().is_empty());
    }

    #[test]
    fn delete_habit_cascades_completions() {
        let mut db = Database::open_memory().unwrap();
        let habit = HabitRecord::new("stretch", at(2024, 1, 1));
        db.save_habit(&habit).unwrap();
        let entity = EntityRef::Habit(habit.id.clone());
        db.append_completion(&CompletionEvent::new(
            "local",
            entity,
            at(2024, 1, 2),
            day(2024, 1, 2),
            10,
        ))
        .unwrap();

        db.delete_habit(&habit.id).unwrap();
        assert!(db.load_habit(&habit.id).unwrap().is_none());
        assert!(db.completions_for_user("local").unwrap().is_empty());
    }

    #[test]
    fn database_persists_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("momentum.db");
        {
            let mut db = Database::open_at(path.clone()).unwrap();
            db.save_habit(&HabitRecord::new("stretch", at(2024, 1, 1))).unwrap();
        }
        let db = Database::open_at(path).unwrap();
        assert_eq!(db.load_habits().unwrap().len(), 1);
    }
}
