//! Orchestration of period, streak and scoring over stored entities.
//!
//! The facade loads a snapshot, performs every recompute in memory, and
//! only then writes back; a failed step leaves storage untouched. It owns
//! no locking (callers serialize concurrent writes to the same entity),
//! but every operation is idempotent and recomputable, so a conflicting
//! replay converges instead of corrupting.

use chrono::{DateTime, NaiveDate, Utc, Weekday};
use tracing::{debug, info};

use crate::clock::Clock;
use crate::error::{CoreError, InvariantViolation, Result};
use crate::events::{CompletionEvent, EngineEvent, EntityRef};
use crate::recurrence::RecurrenceScheduler;
use crate::scoring::{
    Achievement, AchievementUnlock, LeaderboardEntry, LevelProgress, ScoringEngine, UserProgress,
};
use crate::storage::{EngineConfig, ProgressStore};
use crate::streak;
use crate::task::TaskRecord;

/// Outcome of a completion.
#[derive(Debug, Clone)]
pub struct CompletionOutcome {
    pub points_earned: i64,
    pub progress: UserProgress,
    pub new_achievements: Vec<Achievement>,
    pub events: Vec<EngineEvent>,
}

/// Outcome of retracting a completion.
#[derive(Debug, Clone)]
pub struct RetractionOutcome {
    /// False when there was nothing to retract.
    pub removed: bool,
    pub points_removed: i64,
    pub progress: UserProgress,
    pub events: Vec<EngineEvent>,
}

/// Outcome of a recurring-instance sweep.
#[derive(Debug, Clone)]
pub struct SweepOutcome {
    pub instances: Vec<TaskRecord>,
    pub events: Vec<EngineEvent>,
}

/// Read-model of a user's progress.
#[derive(Debug, Clone)]
pub struct ProgressSnapshot {
    pub progress: UserProgress,
    pub level: u32,
    pub level_progress: LevelProgress,
    /// Unlocks not yet surfaced; cleared by taking the snapshot.
    pub new_achievements: Vec<Achievement>,
}

/// Entry point for the engine: habit/task completion, retraction, the
/// recurring sweep, and progress reads.
pub struct ProgressFacade<S, C> {
    store: S,
    clock: C,
    scoring: ScoringEngine,
    week_starts_on: Weekday,
}

impl<S: ProgressStore, C: Clock> ProgressFacade<S, C> {
    pub fn new(store: S, clock: C) -> Self {
        Self {
            store,
            clock,
            scoring: ScoringEngine::new(),
            week_starts_on: Weekday::Mon,
        }
    }

    pub fn with_config(store: S, clock: C, config: &EngineConfig) -> Self {
        Self {
            store,
            clock,
            scoring: ScoringEngine::with_config(config.scoring.clone()),
            week_starts_on: config.period.week_starts_on.weekday(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn week_starts_on(&self) -> Weekday {
        self.week_starts_on
    }

    /// Complete a habit for one calendar day (today unless given).
    ///
    /// Completing the same day twice is rejected; retract first.
    pub fn complete_habit(
        &mut self,
        user_id: &str,
        habit_id: &str,
        day: Option<NaiveDate>,
        notes: Option<String>,
        mood: Option<String>,
    ) -> Result<CompletionOutcome> {
        let mut habit = self
            .store
            .load_habit(habit_id)?
            .ok_or_else(|| CoreError::not_found("habit", habit_id))?;
        let day = day.unwrap_or_else(|| self.clock.today());
        let now = self.clock.now();

        if habit.completed_dates.contains(&day) {
            return Err(CoreError::InvalidOperation(format!(
                "habit '{}' is already completed for {day}",
                habit.name
            )));
        }

        habit.completed_dates.insert(day);
        let summary = streak::recalculate(&habit.completed_dates);
        habit.streak = summary.current;
        habit.best_streak = habit.best_streak.max(summary.best);
        if habit.best_streak < habit.streak {
            return Err(InvariantViolation::BestStreakRegressed {
                entity: format!("habit {}", habit.id),
                streak: habit.streak,
                best_streak: habit.best_streak,
            }
            .into());
        }
        habit.updated_at = now;

        let points = self
            .scoring
            .habit_points(habit.points, habit.streak, habit.difficulty);
        let mut event = CompletionEvent::new(
            user_id,
            EntityRef::Habit(habit.id.clone()),
            now,
            day,
            points,
        );
        event.notes = notes;
        event.mood = mood;

        let mut events = vec![EngineEvent::HabitCompleted {
            habit_id: habit.id.clone(),
            day,
            points_earned: points,
            streak: habit.streak,
            at: now,
        }];
        let label = habit.name.clone();
        let (progress, new_achievements) =
            self.apply_completion(user_id, &label, event, &mut events)?;
        self.store.save_habit(&habit)?;

        info!(
            habit = %habit.name,
            %day,
            points,
            streak = habit.streak,
            "habit completed"
        );
        Ok(CompletionOutcome {
            points_earned: points,
            progress,
            new_achievements,
            events,
        })
    }

    /// Retract a habit completion. No-op when the day was never recorded.
    pub fn uncomplete_habit(
        &mut self,
        user_id: &str,
        habit_id: &str,
        day: NaiveDate,
    ) -> Result<RetractionOutcome> {
        let mut habit = self
            .store
            .load_habit(habit_id)?
            .ok_or_else(|| CoreError::not_found("habit", habit_id))?;
        let now = self.clock.now();

        if !habit.completed_dates.remove(&day) {
            let progress = self.store.load_user_progress(user_id)?;
            return Ok(RetractionOutcome {
                removed: false,
                points_removed: 0,
                progress,
                events: Vec::new(),
            });
        }

        let summary = streak::recalculate(&habit.completed_dates);
        habit.streak = summary.current;
        // Best streak is monotonic: the recompute can only confirm it.
        habit.best_streak = habit.best_streak.max(summary.best);
        habit.updated_at = now;

        let entity = EntityRef::Habit(habit.id.clone());
        let (progress, points_removed) = self.recompute_without(user_id, &entity, day)?;
        self.store.remove_completion(&entity, day)?;
        self.store.save_habit(&habit)?;
        self.store.save_user_progress(&progress)?;

        info!(habit = %habit.name, %day, points_removed, "habit completion retracted");
        Ok(RetractionOutcome {
            removed: true,
            points_removed,
            progress,
            events: vec![EngineEvent::HabitUncompleted {
                habit_id: habit.id.clone(),
                day,
                points_removed,
                streak: habit.streak,
                at: now,
            }],
        })
    }

    /// Complete a plain (non-recurring) task.
    pub fn complete_task(
        &mut self,
        user_id: &str,
        task_id: &str,
        completed_at: Option<DateTime<Utc>>,
    ) -> Result<CompletionOutcome> {
        let mut task = self
            .store
            .load_task(task_id)?
            .ok_or_else(|| CoreError::not_found("task", task_id))?;
        if task.is_recurring() {
            return Err(CoreError::InvalidOperation(format!(
                "task '{}' is recurring; record an instance completion instead",
                task.title
            )));
        }
        if task.completed {
            return Err(CoreError::InvalidOperation(format!(
                "task '{}' is already completed",
                task.title
            )));
        }

        let now = self.clock.now();
        let completed_at = completed_at.unwrap_or(now);
        let points = self
            .scoring
            .task_points(task.priority, task.due_date, completed_at);

        task.completed = true;
        task.completed_at = Some(completed_at);
        task.updated_at = now;

        let event = CompletionEvent::new(
            user_id,
            EntityRef::Task(task.id.clone()),
            completed_at,
            completed_at.date_naive(),
            points,
        );
        let mut events = vec![EngineEvent::TaskCompleted {
            task_id: task.id.clone(),
            points_earned: points,
            at: now,
        }];
        let (progress, new_achievements) =
            self.apply_completion(user_id, &task.title, event, &mut events)?;
        self.store.save_task(&task)?;

        info!(task = %task.title, points, "task completed");
        Ok(CompletionOutcome {
            points_earned: points,
            progress,
            new_achievements,
            events,
        })
    }

    /// Reopen a completed plain task, removing its completion record.
    pub fn uncomplete_task(&mut self, user_id: &str, task_id: &str) -> Result<RetractionOutcome> {
        let mut task = self
            .store
            .load_task(task_id)?
            .ok_or_else(|| CoreError::not_found("task", task_id))?;
        let now = self.clock.now();

        let Some(completed_at) = task.completed_at else {
            let progress = self.store.load_user_progress(user_id)?;
            return Ok(RetractionOutcome {
                removed: false,
                points_removed: 0,
                progress,
                events: Vec::new(),
            });
        };

        task.completed = false;
        task.completed_at = None;
        task.updated_at = now;

        let entity = EntityRef::Task(task.id.clone());
        let day = completed_at.date_naive();
        let (progress, points_removed) = self.recompute_without(user_id, &entity, day)?;
        self.store.remove_completion(&entity, day)?;
        self.store.save_task(&task)?;
        self.store.save_user_progress(&progress)?;

        info!(task = %task.title, points_removed, "task completion retracted");
        Ok(RetractionOutcome {
            removed: true,
            points_removed,
            progress,
            events: vec![EngineEvent::TaskUncompleted {
                task_id: task.id.clone(),
                points_removed,
                at: now,
            }],
        })
    }

    /// Record one occurrence of a recurring task. Recording the same day
    /// twice is a silent no-op.
    pub fn complete_recurring_task(
        &mut self,
        user_id: &str,
        task_id: &str,
        day: Option<NaiveDate>,
    ) -> Result<CompletionOutcome> {
        let mut task = self
            .store
            .load_task(task_id)?
            .ok_or_else(|| CoreError::not_found("task", task_id))?;
        if !task.is_recurring() {
            return Err(CoreError::InvalidOperation(format!(
                "task '{}' is not recurring",
                task.title
            )));
        }

        let day = day.unwrap_or_else(|| self.clock.today());
        let now = self.clock.now();
        // The occurrence being closed was scheduled for the pre-completion
        // due pointer; timeliness is judged against it.
        let scheduled = task
            .recurrence
            .next_due_date
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| dt.and_utc());

        if !RecurrenceScheduler::complete_instance(&mut task, day) {
            debug!(task = %task.title, %day, "instance already recorded; no-op");
            let progress = self.store.load_user_progress(user_id)?;
            return Ok(CompletionOutcome {
                points_earned: 0,
                progress,
                new_achievements: Vec::new(),
                events: Vec::new(),
            });
        }
        task.updated_at = now;

        let completed_at = day
            .and_hms_opt(0, 0, 0)
            .map(|dt| dt.and_utc())
            .unwrap_or(now);
        let points = self
            .scoring
            .task_points(task.priority, scheduled.or(task.due_date), completed_at);
        let mut event = CompletionEvent::new(
            user_id,
            EntityRef::Task(task.id.clone()),
            now,
            day,
            points,
        );
        event.is_recurring_instance = true;

        let mut events = vec![EngineEvent::RecurringInstanceRecorded {
            task_id: task.id.clone(),
            day,
            next_due_date: task.recurrence.next_due_date,
            at: now,
        }];
        let (progress, new_achievements) =
            self.apply_completion(user_id, &task.title, event, &mut events)?;
        self.store.save_task(&task)?;

        info!(
            task = %task.title,
            %day,
            points,
            next_due = ?task.recurrence.next_due_date,
            "recurring instance recorded"
        );
        Ok(CompletionOutcome {
            points_earned: points,
            progress,
            new_achievements,
            events,
        })
    }

    /// Materialize due instances of every recurring task. Safe to invoke
    /// repeatedly from an external timer.
    pub fn sweep_recurring_instances(&mut self, now: Option<DateTime<Utc>>) -> Result<SweepOutcome> {
        let now = now.unwrap_or_else(|| self.clock.now());
        let mut tasks = self.store.load_recurring_tasks()?;
        let instances = RecurrenceScheduler::generate_next_instances(&mut tasks, now);

        if instances.is_empty() {
            return Ok(SweepOutcome {
                instances,
                events: Vec::new(),
            });
        }

        let mut events = Vec::with_capacity(instances.len());
        for source in &tasks {
            self.store.save_task(source)?;
        }
        for instance in &instances {
            self.store.save_task(instance)?;
            if let Some(due) = instance.due_date {
                events.push(EngineEvent::InstanceGenerated {
                    source_task_id: instance
                        .original_task_id
                        .clone()
                        .unwrap_or_else(|| instance.id.clone()),
                    instance_id: instance.id.clone(),
                    due_date: due.date_naive(),
                    at: now,
                });
            }
        }

        info!(count = instances.len(), "recurring sweep generated instances");
        Ok(SweepOutcome { instances, events })
    }

    /// Current progress, level and any not-yet-surfaced unlocks. Taking
    /// the snapshot clears the unlocks' new flag.
    pub fn progress_snapshot(&mut self, user_id: &str) -> Result<ProgressSnapshot> {
        let progress = self.store.load_user_progress(user_id)?;
        let level = self.scoring.level_for_points(progress.total_points);
        let level_progress = self.scoring.progress_to_next_level(level, progress.total_points);

        let fresh = self.store.take_new_unlocks(user_id)?;
        let catalog = self.store.achievement_catalog()?;
        let new_achievements = catalog
            .into_iter()
            .filter(|achievement| {
                fresh
                    .iter()
                    .any(|unlock| unlock.achievement_id == achievement.id)
            })
            .collect();

        Ok(ProgressSnapshot {
            progress,
            level,
            level_progress,
            new_achievements,
        })
    }

    /// Users ranked by total points.
    pub fn leaderboard(&self, limit: usize) -> Result<Vec<LeaderboardEntry>> {
        let users = self.store.all_user_progress()?;
        Ok(self.scoring.leaderboard(&users, limit))
    }

    /// Shared tail of every completion: recompute the aggregate from the
    /// event history including the new event, evaluate achievements, then
    /// persist event, progress and unlocks.
    fn apply_completion(
        &mut self,
        user_id: &str,
        entity_label: &str,
        event: CompletionEvent,
        events: &mut Vec<EngineEvent>,
    ) -> Result<(UserProgress, Vec<Achievement>)> {
        let now = event.occurred_at;
        let previous = self.store.load_user_progress(user_id)?;
        let level_before = self.scoring.level_for_points(previous.total_points);

        let mut history = self.store.completions_for_user(user_id)?;
        history.push(event.clone());
        let progress = self.scoring.recompute_progress(&previous, &history)?;
        let level_after = self.scoring.level_for_points(progress.total_points);

        let stats = self.scoring.stats_for(&progress, &history);
        let catalog = self.store.achievement_catalog()?;
        let already = self.store.unlocked_achievement_ids(user_id)?;
        let new_achievements: Vec<Achievement> = self
            .scoring
            .evaluate_achievements(&stats, &catalog, &already)
            .into_iter()
            .cloned()
            .collect();

        // Everything above ran on the in-memory snapshot; persist now.
        self.store.append_completion(&event)?;
        self.store.save_user_progress(&progress)?;
        for achievement in &new_achievements {
            self.store
                .record_unlock(&AchievementUnlock::new(user_id, achievement.id, now))?;
            events.push(EngineEvent::AchievementUnlocked {
                achievement_id: achievement.id,
                name: achievement.name.clone(),
                at: now,
            });
            debug!(entity = entity_label, achievement = %achievement.name, "achievement unlocked");
        }
        if level_after != level_before {
            events.push(EngineEvent::LevelChanged {
                from: level_before,
                to: level_after,
                at: now,
            });
        }

        Ok((progress, new_achievements))
    }

    /// Recompute the aggregate as if the matching completion were gone.
    /// Nothing is persisted here; retraction writes happen in one place
    /// after the recompute succeeds.
    fn recompute_without(
        &mut self,
        user_id: &str,
        entity: &EntityRef,
        day: NaiveDate,
    ) -> Result<(UserProgress, i64)> {
        let previous = self.store.load_user_progress(user_id)?;
        let history = self.store.completions_for_user(user_id)?;
        let points_removed = history
            .iter()
            .find(|event| &event.entity == entity && event.day == day)
            .map_or(0, |event| event.points_earned);
        let remaining: Vec<CompletionEvent> = history
            .into_iter()
            .filter(|event| !(&event.entity == entity && event.day == day))
            .collect();
        let progress = self.scoring.recompute_progress(&previous, &remaining)?;
        Ok((progress, points_removed))
    }
}
