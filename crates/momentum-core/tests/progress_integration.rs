//! End-to-end facade tests over an in-memory database.

use chrono::{DateTime, NaiveDate, TimeZone, Utc, Weekday};
use momentum_core::{
    CoreError, Database, Difficulty, FixedClock, HabitRecord, ProgressFacade, ProgressStore,
    RecurrencePattern, TaskRecord,
};

fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
}

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn facade(now: DateTime<Utc>) -> ProgressFacade<Database, FixedClock> {
    ProgressFacade::new(Database::open_memory().unwrap(), FixedClock(now))
}

fn seed_habit(
    facade: &mut ProgressFacade<Database, FixedClock>,
    now: DateTime<Utc>,
) -> HabitRecord {
    let habit = HabitRecord::new("stretch", now);
    facade.store_mut().save_habit(&habit).unwrap();
    habit
}

#[test]
fn daily_habit_with_two_prior_days_is_due_with_live_streak() {
    let now = at(2024, 3, 15, 9);
    let mut facade = facade(now);
    let habit = seed_habit(&mut facade, now);

    facade
        .complete_habit("local", &habit.id, Some(day(2024, 3, 13)), None, None)
        .unwrap();
    facade
        .complete_habit("local", &habit.id, Some(day(2024, 3, 14)), None, None)
        .unwrap();

    let habit = facade.store().load_habit(&habit.id).unwrap().unwrap();
    assert_eq!(habit.streak, 2);
    assert!(habit.is_due(day(2024, 3, 15)));
    assert_eq!(habit.current_count(day(2024, 3, 15), Weekday::Mon), 0);
}

#[test]
fn completing_a_habit_twice_for_one_day_is_rejected() {
    let now = at(2024, 3, 15, 9);
    let mut facade = facade(now);
    let habit = seed_habit(&mut facade, now);

    facade
        .complete_habit("local", &habit.id, None, None, None)
        .unwrap();
    let err = facade
        .complete_habit("local", &habit.id, None, None, None)
        .unwrap_err();
    assert!(matches!(err, CoreError::InvalidOperation(_)));

    // The first completion is the only state either call produced.
    let events = facade.store().completions_for_user("local").unwrap();
    assert_eq!(events.len(), 1);
    let progress = facade.store().load_user_progress("local").unwrap();
    assert_eq!(progress.total_points, events[0].points_earned);
}

#[test]
fn habit_streak_bonus_and_difficulty_multiply_out() {
    let now = at(2024, 3, 20, 9);
    let mut facade = facade(now);
    let mut habit = HabitRecord::new("meditate", now);
    habit.difficulty = Difficulty::Medium;
    // 13 consecutive days already recorded; today's completion is the 14th.
    for offset in 1..=13 {
        habit
            .completed_dates
            .insert(day(2024, 3, 20 - offset));
    }
    facade.store_mut().save_habit(&habit).unwrap();

    let outcome = facade
        .complete_habit("local", &habit.id, Some(day(2024, 3, 20)), None, None)
        .unwrap();
    // base 10, streak 14 -> bonus 2, subtotal 12, medium x1.5 = 18
    assert_eq!(outcome.points_earned, 18);

    let habit = facade.store().load_habit(&habit.id).unwrap().unwrap();
    assert_eq!(habit.streak, 14);
    assert_eq!(habit.best_streak, 14);
}

#[test]
fn uncompleting_the_only_completion_resets_streak_but_not_best() {
    let now = at(2024, 3, 15, 9);
    let mut facade = facade(now);
    let habit = seed_habit(&mut facade, now);

    let outcome = facade
        .complete_habit("local", &habit.id, Some(day(2024, 3, 15)), None, None)
        .unwrap();
    let earned = outcome.points_earned;
    assert!(earned > 0);

    let retraction = facade
        .uncomplete_habit("local", &habit.id, day(2024, 3, 15))
        .unwrap();
    assert!(retraction.removed);
    assert_eq!(retraction.points_removed, earned);

    let habit = facade.store().load_habit(&habit.id).unwrap().unwrap();
    assert_eq!(habit.streak, 0);
    assert_eq!(habit.best_streak, 1);
    assert_eq!(retraction.progress.total_points, 0);
    assert_eq!(retraction.progress.current_streak, 0);
    // Aggregate best streak is monotonic too.
    assert_eq!(retraction.progress.best_streak, 1);
}

#[test]
fn uncompleting_an_unrecorded_day_is_a_no_op() {
    let now = at(2024, 3, 15, 9);
    let mut facade = facade(now);
    let habit = seed_habit(&mut facade, now);

    let retraction = facade
        .uncomplete_habit("local", &habit.id, day(2024, 3, 1))
        .unwrap();
    assert!(!retraction.removed);
    assert_eq!(retraction.points_removed, 0);
}

#[test]
fn on_time_task_completion_scores_base_priority_and_bonus() {
    let now = at(2024, 2, 10, 9);
    let mut facade = facade(now);
    let mut task = TaskRecord::new("ship release", now);
    task.priority = 5;
    task.due_date = Some(at(2024, 2, 10, 12));
    facade.store_mut().save_task(&task).unwrap();

    let outcome = facade.complete_task("local", &task.id, None).unwrap();
    assert_eq!(outcome.points_earned, 40);

    let task = facade.store().load_task(&task.id).unwrap().unwrap();
    assert!(task.completed);
    assert_eq!(task.completed_at, Some(now));
}

#[test]
fn first_task_completion_unlocks_first_steps_once() {
    let now = at(2024, 2, 10, 9);
    let mut facade = facade(now);
    let task = TaskRecord::new("start somewhere", now);
    facade.store_mut().save_task(&task).unwrap();

    let outcome = facade.complete_task("local", &task.id, None).unwrap();
    assert!(outcome
        .new_achievements
        .iter()
        .any(|a| a.name == "First Steps"));

    // Regressing the triggering stat does not revoke the unlock.
    facade.uncomplete_task("local", &task.id).unwrap();
    assert!(facade
        .store()
        .unlocked_achievement_ids("local")
        .unwrap()
        .contains(&1));

    // Completing again does not unlock again.
    let outcome = facade.complete_task("local", &task.id, None).unwrap();
    assert!(outcome.new_achievements.is_empty());
}

#[test]
fn recurring_completion_advances_due_and_stays_out_of_totals() {
    let now = at(2024, 1, 1, 9);
    let mut facade = facade(now);
    let mut task = TaskRecord::new("water plants", now);
    task.due_date = Some(at(2024, 1, 1, 0));
    let task = task.with_recurrence(RecurrencePattern::Weekly, 1);
    facade.store_mut().save_task(&task).unwrap();

    let outcome = facade
        .complete_recurring_task("local", &task.id, Some(day(2024, 1, 1)))
        .unwrap();
    assert!(outcome.points_earned > 0);
    // Instance completions are recorded but excluded from the aggregate.
    assert_eq!(outcome.progress.total_points, 0);
    assert_eq!(outcome.progress.current_streak, 0);

    let task = facade.store().load_task(&task.id).unwrap().unwrap();
    assert_eq!(task.recurrence.next_due_date, Some(day(2024, 1, 8)));
    let events = facade.store().completions_for_user("local").unwrap();
    assert_eq!(events.len(), 1);
    assert!(events[0].is_recurring_instance);
}

#[test]
fn recording_the_same_instance_day_twice_is_a_silent_no_op() {
    let now = at(2024, 1, 1, 9);
    let mut facade = facade(now);
    let mut task = TaskRecord::new("water plants", now);
    task.due_date = Some(at(2024, 1, 1, 0));
    let task = task.with_recurrence(RecurrencePattern::Weekly, 1);
    facade.store_mut().save_task(&task).unwrap();

    facade
        .complete_recurring_task("local", &task.id, Some(day(2024, 1, 1)))
        .unwrap();
    let replay = facade
        .complete_recurring_task("local", &task.id, Some(day(2024, 1, 1)))
        .unwrap();
    assert_eq!(replay.points_earned, 0);
    assert!(replay.events.is_empty());
    assert_eq!(facade.store().completions_for_user("local").unwrap().len(), 1);
}

#[test]
fn completing_a_non_recurring_task_via_the_recurring_path_fails() {
    let now = at(2024, 1, 1, 9);
    let mut facade = facade(now);
    let task = TaskRecord::new("one-off", now);
    facade.store_mut().save_task(&task).unwrap();

    let err = facade
        .complete_recurring_task("local", &task.id, None)
        .unwrap_err();
    assert!(matches!(err, CoreError::InvalidOperation(_)));
}

#[test]
fn unknown_ids_surface_not_found() {
    let now = at(2024, 1, 1, 9);
    let mut facade = facade(now);
    assert!(matches!(
        facade.complete_habit("local", "missing", None, None, None),
        Err(CoreError::NotFound { .. })
    ));
    assert!(matches!(
        facade.complete_task("local", "missing", None),
        Err(CoreError::NotFound { .. })
    ));
}

#[test]
fn snapshot_reports_level_and_surfaces_new_unlocks_once() {
    let now = at(2024, 2, 10, 9);
    let mut facade = facade(now);
    let task = TaskRecord::new("first", now);
    facade.store_mut().save_task(&task).unwrap();
    facade.complete_task("local", &task.id, None).unwrap();

    let snapshot = facade.progress_snapshot("local").unwrap();
    assert_eq!(snapshot.level, 1);
    assert!(snapshot.level_progress.points_to_next > 0);
    assert!(snapshot
        .new_achievements
        .iter()
        .any(|a| a.name == "First Steps"));

    // A second snapshot no longer reports the unlock as new.
    let snapshot = facade.progress_snapshot("local").unwrap();
    assert!(snapshot.new_achievements.is_empty());
}

#[test]
fn leaderboard_ranks_stored_users() {
    let now = at(2024, 2, 10, 9);
    let mut facade = facade(now);

    for (user, title, priority) in [("alice", "a", 5), ("bob", "b", 1)] {
        let mut task = TaskRecord::new(title, now);
        task.priority = priority;
        facade.store_mut().save_task(&task).unwrap();
        facade.complete_task(user, &task.id, None).unwrap();
    }

    let board = facade.leaderboard(10).unwrap();
    assert_eq!(board.len(), 2);
    assert_eq!(board[0].user_id, "alice");
    assert_eq!(board[0].rank, 1);
    assert!(board[0].total_points > board[1].total_points);
}

#[test]
fn editing_history_out_of_order_converges() {
    let now = at(2024, 3, 20, 9);
    let mut facade = facade(now);
    let habit = seed_habit(&mut facade, now);

    // Build a 5-day run, then retract a middle day.
    for offset in 0..5 {
        facade
            .complete_habit("local", &habit.id, Some(day(2024, 3, 15 + offset)), None, None)
            .unwrap();
    }
    let progress = facade.store().load_user_progress("local").unwrap();
    assert_eq!(progress.current_streak, 5);

    facade
        .uncomplete_habit("local", &habit.id, day(2024, 3, 17))
        .unwrap();
    let progress = facade.store().load_user_progress("local").unwrap();
    // The trailing run is 18..=19.
    assert_eq!(progress.current_streak, 2);
    assert_eq!(progress.best_streak, 5);

    // Re-inserting the retracted day heals the split.
    facade
        .complete_habit("local", &habit.id, Some(day(2024, 3, 17)), None, None)
        .unwrap();
    let habit = facade.store().load_habit(&habit.id).unwrap().unwrap();
    assert_eq!(habit.streak, 5);
}
