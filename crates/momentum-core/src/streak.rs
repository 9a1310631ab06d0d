//! Streak derivation from completion histories.
//!
//! Streaks are always recomputed from the full set of completion days,
//! never incrementally patched: a retraction can shorten or split a run in
//! ways an increment cannot undo. Two deliberately separate algorithms
//! live here: the instance-based walk for recurring tasks is anchored at
//! today, while the habit recompute measures the run ending at the latest
//! completion wherever it falls. They encode different product policies
//! and are kept apart on purpose.

use std::collections::BTreeSet;

use chrono::{NaiveDate, Weekday};

use crate::period::{self, HabitFrequency};

/// Result of a full streak recompute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StreakSummary {
    /// Contiguous run ending at the latest completion day.
    pub current: u32,
    /// Longest contiguous run anywhere in the history.
    pub best: u32,
}

/// Streak of a recurring task, derived from its instance completion days.
///
/// The walk is anchored at `today`: the run counts backward one day at a
/// time and tolerates today itself being incomplete, so a task completed
/// through yesterday still reports a live streak. The first gap ends the
/// walk.
pub fn instance_streak(days: &BTreeSet<NaiveDate>, today: NaiveDate) -> u32 {
    let mut streak = 0u32;
    let mut expected = today;
    if days.contains(&today) {
        streak = 1;
        let Some(prev) = today.pred_opt() else {
            return streak;
        };
        expected = prev;
    }

    for &day in days.iter().rev() {
        if day >= today {
            // Today is already counted; future-dated days cannot extend a
            // run anchored at today.
            continue;
        }
        if day == expected {
            streak += 1;
            let Some(prev) = expected.pred_opt() else {
                break;
            };
            expected = prev;
        } else if streak == 0 && Some(day) == expected.pred_opt() {
            // Not completed today: the run is still live if it reaches
            // yesterday.
            streak = 1;
            let Some(prev) = day.pred_opt() else {
                break;
            };
            expected = prev;
        } else if day < expected {
            break;
        }
    }
    streak
}

/// Full habit streak recompute over the complete (unique) day set.
///
/// `current` is the run ending at the *latest* completion day, whether or
/// not that day is today; `best` is the longest run found anywhere.
/// Callers merge `best` with any previously stored value so the stored
/// best streak never decreases.
pub fn recalculate(days: &BTreeSet<NaiveDate>) -> StreakSummary {
    let mut iter = days.iter();
    let Some(&first) = iter.next() else {
        return StreakSummary::default();
    };

    let mut current = 1u32;
    let mut best = 1u32;
    let mut prev = first;
    for &day in iter {
        if (day - prev).num_days() == 1 {
            current += 1;
            best = best.max(current);
        } else {
            current = 1;
        }
        prev = day;
    }
    StreakSummary { current, best }
}

/// Completions falling inside the period containing `today`.
pub fn completions_in_period(
    days: &BTreeSet<NaiveDate>,
    frequency: HabitFrequency,
    today: NaiveDate,
    week_starts_on: Weekday,
) -> u32 {
    let start = period::period_start(frequency, today, week_starts_on);
    days.iter()
        .filter(|&&day| day >= start && day <= today)
        .count() as u32
}
