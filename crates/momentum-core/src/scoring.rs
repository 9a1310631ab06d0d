//! Points, levels, achievements and the user progress aggregate.
//!
//! The aggregate is a ledger recomputed from the completion history on
//! every mutation, not a counter patched from call sites; concurrent or
//! out-of-order edits therefore converge to the same totals. Completions
//! of generated recurring instances are recorded but excluded from the
//! cross-task totals and streak.

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::InvariantViolation;
use crate::events::{CompletionEvent, EntityRef};
use crate::habit::Difficulty;
use crate::streak;

/// Ascending points thresholds; crossing `LEVEL_THRESHOLDS[n]` reaches
/// level `n + 2`.
pub const LEVEL_THRESHOLDS: [i64; 10] =
    [100, 300, 600, 1000, 1500, 2100, 2800, 3600, 4500, 5500];

/// Scoring knobs. Defaults reproduce the stock reward table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Flat base for task completions
    #[serde(default = "default_base_task_points")]
    pub base_task_points: u32,
    /// Added per priority step
    #[serde(default = "default_priority_weight")]
    pub priority_weight: u32,
    /// Bonus for completing at or before the due timestamp
    #[serde(default = "default_on_time_bonus")]
    pub on_time_bonus: u32,
    /// Bonus for closing a task that never had a due date
    #[serde(default = "default_undated_bonus")]
    pub undated_bonus: u32,
    /// Streak length per bonus step
    #[serde(default = "default_streak_bonus_step")]
    pub streak_bonus_step: u32,
    /// Fraction of base points granted per full step
    #[serde(default = "default_streak_bonus_rate")]
    pub streak_bonus_rate: f64,
}

fn default_base_task_points() -> u32 {
    10
}
fn default_priority_weight() -> u32 {
    5
}
fn default_on_time_bonus() -> u32 {
    5
}
fn default_undated_bonus() -> u32 {
    2
}
fn default_streak_bonus_step() -> u32 {
    7
}
fn default_streak_bonus_rate() -> f64 {
    0.1
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            base_task_points: default_base_task_points(),
            priority_weight: default_priority_weight(),
            on_time_bonus: default_on_time_bonus(),
            undated_bonus: default_undated_bonus(),
            streak_bonus_step: default_streak_bonus_step(),
            streak_bonus_rate: default_streak_bonus_rate(),
        }
    }
}

/// Per-user progress aggregate. Mutated only through
/// [`ScoringEngine::recompute_progress`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProgress {
    pub user_id: String,
    pub total_points: i64,
    pub current_streak: u32,
    pub best_streak: u32,
    pub last_completion_date: Option<NaiveDate>,
}

impl UserProgress {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            total_points: 0,
            current_streak: 0,
            best_streak: 0,
            last_completion_date: None,
        }
    }
}

/// Immutable stats snapshot achievements are evaluated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserStats {
    pub total_points: i64,
    pub current_streak: u32,
    pub level: u32,
    pub tasks_completed: u64,
}

/// A catalog entry. Each threshold is optional; any satisfied threshold
/// unlocks the achievement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Achievement {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub icon: Option<String>,
    pub points_required: Option<i64>,
    pub streak_required: Option<u32>,
    pub level_required: Option<u32>,
    pub tasks_completed_required: Option<u64>,
}

impl Achievement {
    /// The configured thresholds as independent predicates over a stats
    /// snapshot. Unset criteria contribute nothing.
    fn predicates(&self) -> Vec<Box<dyn Fn(&UserStats) -> bool>> {
        let mut predicates: Vec<Box<dyn Fn(&UserStats) -> bool>> = Vec::new();
        if let Some(points) = self.points_required {
            predicates.push(Box::new(move |stats| stats.total_points >= points));
        }
        if let Some(streak) = self.streak_required {
            predicates.push(Box::new(move |stats| stats.current_streak >= streak));
        }
        if let Some(level) = self.level_required {
            predicates.push(Box::new(move |stats| stats.level >= level));
        }
        if let Some(tasks) = self.tasks_completed_required {
            predicates.push(Box::new(move |stats| stats.tasks_completed >= tasks));
        }
        predicates
    }

    /// Whether `stats` satisfies at least one configured threshold.
    pub fn is_unlocked_by(&self, stats: &UserStats) -> bool {
        let predicates = self.predicates();
        !predicates.is_empty() && predicates.iter().any(|predicate| predicate(stats))
    }

    /// Built-in catalog seeded into storage on first open.
    pub fn default_catalog() -> Vec<Achievement> {
        fn entry(id: i64, name: &str, description: &str, icon: &str) -> Achievement {
            Achievement {
                id,
                name: name.to_string(),
                description: description.to_string(),
                icon: Some(icon.to_string()),
                points_required: None,
                streak_required: None,
                level_required: None,
                tasks_completed_required: None,
            }
        }

        vec![
            Achievement {
                tasks_completed_required: Some(1),
                ..entry(1, "First Steps", "Complete your first task", "footprints")
            },
            Achievement {
                tasks_completed_required: Some(25),
                ..entry(2, "Task Master", "Complete 25 tasks", "clipboard-check")
            },
            Achievement {
                tasks_completed_required: Some(100),
                ..entry(3, "Centurion", "Complete 100 tasks", "laurel")
            },
            Achievement {
                streak_required: Some(7),
                ..entry(4, "Week Warrior", "Keep a 7-day streak", "flame")
            },
            Achievement {
                streak_required: Some(30),
                ..entry(5, "Monthly Devotion", "Keep a 30-day streak", "calendar")
            },
            Achievement {
                streak_required: Some(100),
                ..entry(6, "Unbreakable", "Keep a 100-day streak", "diamond")
            },
            Achievement {
                points_required: Some(500),
                ..entry(7, "Point Collector", "Earn 500 points", "coins")
            },
            Achievement {
                points_required: Some(2500),
                ..entry(8, "Point Hoarder", "Earn 2,500 points", "treasure")
            },
            Achievement {
                level_required: Some(5),
                ..entry(9, "Rising Star", "Reach level 5", "star")
            },
            Achievement {
                level_required: Some(11),
                ..entry(10, "Summit", "Reach the top level", "mountain")
            },
        ]
    }
}

/// One unlock per (user, achievement), forever.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AchievementUnlock {
    pub user_id: String,
    pub achievement_id: i64,
    pub unlocked_at: DateTime<Utc>,
    /// Cleared once the unlock has been surfaced to the user.
    pub is_new: bool,
}

impl AchievementUnlock {
    pub fn new(user_id: impl Into<String>, achievement_id: i64, unlocked_at: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.into(),
            achievement_id,
            unlocked_at,
            is_new: true,
        }
    }
}

/// Progress toward the next level threshold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LevelProgress {
    pub points_to_next: i64,
    /// Percent of the current level band covered, one decimal.
    pub percent: f64,
}

/// Leaderboard row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub user_id: String,
    pub total_points: i64,
    pub level: u32,
}

/// Points, level and achievement evaluation.
pub struct ScoringEngine {
    config: ScoringConfig,
}

impl ScoringEngine {
    /// Create a new engine with default scoring knobs.
    pub fn new() -> Self {
        Self {
            config: ScoringConfig::default(),
        }
    }

    /// Create with custom knobs.
    pub fn with_config(config: ScoringConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Points for completing a task: base plus priority weight, plus a
    /// timeliness bonus (on time, or never dated at all).
    pub fn task_points(
        &self,
        priority: u8,
        due_date: Option<DateTime<Utc>>,
        completed_at: DateTime<Utc>,
    ) -> i64 {
        let base = self.config.base_task_points + self.config.priority_weight * u32::from(priority);
        let timeliness = match due_date {
            Some(due) if completed_at <= due => self.config.on_time_bonus,
            Some(_) => 0,
            None => self.config.undated_bonus,
        };
        i64::from(base + timeliness)
    }

    /// Points for completing a habit: base, plus a streak bonus once the
    /// streak reaches a full step, then the difficulty multiplier.
    pub fn habit_points(&self, base_points: u32, streak: u32, difficulty: Difficulty) -> i64 {
        let step = self.config.streak_bonus_step;
        let bonus = if step > 0 && streak >= step {
            let steps = f64::from(streak / step);
            (steps * self.config.streak_bonus_rate * f64::from(base_points)).round()
        } else {
            0.0
        };
        let total = (f64::from(base_points) + bonus) * difficulty.multiplier();
        (total.round() as i64).max(0)
    }

    /// Level reached with `points`. Monotonic and non-decreasing.
    pub fn level_for_points(&self, points: i64) -> u32 {
        LEVEL_THRESHOLDS
            .iter()
            .take_while(|&&threshold| points >= threshold)
            .count() as u32
            + 1
    }

    /// Distance and percentage toward the next threshold.
    pub fn progress_to_next_level(&self, level: u32, points: i64) -> LevelProgress {
        if level == 0 || level as usize > LEVEL_THRESHOLDS.len() {
            return LevelProgress {
                points_to_next: 0,
                percent: 100.0,
            };
        }
        let next = LEVEL_THRESHOLDS[level as usize - 1];
        if points >= next {
            return LevelProgress {
                points_to_next: 0,
                percent: 100.0,
            };
        }
        let current = if level == 1 {
            0
        } else {
            LEVEL_THRESHOLDS[level as usize - 2]
        };
        let percent = (points - current) as f64 / (next - current) as f64 * 100.0;
        LevelProgress {
            points_to_next: next - points,
            percent: (percent * 10.0).round() / 10.0,
        }
    }

    /// Full recompute of the progress aggregate from the completion
    /// history. Recurring-instance completions are excluded from both the
    /// point total and the cross-task streak. The stored best streak is
    /// carried forward so it never decreases.
    pub fn recompute_progress(
        &self,
        previous: &UserProgress,
        events: &[CompletionEvent],
    ) -> Result<UserProgress, InvariantViolation> {
        let counted: Vec<&CompletionEvent> = events
            .iter()
            .filter(|event| !event.is_recurring_instance)
            .collect();

        let total_points: i64 = counted.iter().map(|event| event.points_earned).sum();
        let days: BTreeSet<NaiveDate> = counted.iter().map(|event| event.day).collect();
        let summary = streak::recalculate(&days);
        let best_streak = previous.best_streak.max(summary.best);

        if best_streak < summary.current {
            return Err(InvariantViolation::BestStreakRegressed {
                entity: format!("user {}", previous.user_id),
                streak: summary.current,
                best_streak,
            });
        }

        Ok(UserProgress {
            user_id: previous.user_id.clone(),
            total_points: total_points.max(0),
            current_streak: summary.current,
            best_streak,
            last_completion_date: days.iter().next_back().copied(),
        })
    }

    /// Stats snapshot for achievement evaluation.
    pub fn stats_for(&self, progress: &UserProgress, events: &[CompletionEvent]) -> UserStats {
        let tasks_completed = events
            .iter()
            .filter(|event| matches!(event.entity, EntityRef::Task(_)))
            .count() as u64;
        UserStats {
            total_points: progress.total_points,
            current_streak: progress.current_streak,
            level: self.level_for_points(progress.total_points),
            tasks_completed,
        }
    }

    /// Catalog entries newly satisfied by `stats`. Already-unlocked ids
    /// are skipped, which keeps unlocking append-only and idempotent.
    pub fn evaluate_achievements<'a>(
        &self,
        stats: &UserStats,
        catalog: &'a [Achievement],
        already_unlocked: &BTreeSet<i64>,
    ) -> Vec<&'a Achievement> {
        catalog
            .iter()
            .filter(|achievement| {
                !already_unlocked.contains(&achievement.id) && achievement.is_unlocked_by(stats)
            })
            .collect()
    }

    /// All users ranked by total points, stable on ties, truncated to
    /// `limit`.
    pub fn leaderboard(&self, users: &[UserProgress], limit: usize) -> Vec<LeaderboardEntry> {
        let mut ranked: Vec<&UserProgress> = users.iter().collect();
        ranked.sort_by(|a, b| b.total_points.cmp(&a.total_points));
        ranked
            .into_iter()
            .take(limit)
            .enumerate()
            .map(|(index, progress)| LeaderboardEntry {
                rank: index + 1,
                user_id: progress.user_id.clone(),
                total_points: progress.total_points,
                level: self.level_for_points(progress.total_points),
            })
            .collect()
    }
}

impl Default for ScoringEngine {
    fn default() -> Self {
        Self::new()
    }
}
