//! Pure date arithmetic for recurrence and habit periods.
//!
//! Everything in this module is a deterministic function over calendar
//! days: computing the next occurrence of a recurring task, the start of
//! the period a habit is currently in, and whether a habit is due again.
//! No side effects, no wall-clock reads.

use chrono::{Datelike, Days, Months, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Recurrence pattern for tasks.
///
/// A closed enum consumed by a single exhaustive match in
/// [`next_occurrence`], so adding a pattern is a compile-time-checked
/// change rather than a string comparison scattered across call sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RecurrencePattern {
    /// Not recurring.
    #[default]
    None,
    /// Every `interval` days.
    Daily,
    /// Every `interval` weeks.
    Weekly,
    /// Every `interval` calendar months.
    Monthly,
    /// Every `interval` years.
    Yearly,
}

/// Frequency of a tracked habit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum HabitFrequency {
    #[default]
    Daily,
    Weekly,
    Monthly,
}

/// Compute the next occurrence date after `from`.
///
/// Returns `None` for [`RecurrencePattern::None`], a zero interval (which
/// would never advance), or date overflow. Applying the result back into
/// this function with the same pattern and interval always moves strictly
/// forward.
pub fn next_occurrence(
    pattern: RecurrencePattern,
    interval: u32,
    from: NaiveDate,
) -> Option<NaiveDate> {
    if interval == 0 {
        return None;
    }
    match pattern {
        RecurrencePattern::None => None,
        RecurrencePattern::Daily => from.checked_add_days(Days::new(u64::from(interval))),
        RecurrencePattern::Weekly => {
            from.checked_add_days(Days::new(u64::from(interval) * 7))
        }
        RecurrencePattern::Monthly => from.checked_add_months(Months::new(interval)),
        RecurrencePattern::Yearly => interval
            .checked_mul(12)
            .and_then(|months| from.checked_add_months(Months::new(months))),
    }
}

/// Start of the period containing `reference` for the given frequency.
///
/// Daily periods are the calendar day itself; weekly periods begin on
/// `week_starts_on` (Monday unless configured otherwise); monthly periods
/// begin on the first of the month.
pub fn period_start(
    frequency: HabitFrequency,
    reference: NaiveDate,
    week_starts_on: Weekday,
) -> NaiveDate {
    match frequency {
        HabitFrequency::Daily => reference,
        HabitFrequency::Weekly => reference.week(week_starts_on).first_day(),
        HabitFrequency::Monthly => reference.with_day(1).unwrap_or(reference),
    }
}

/// Whether a habit is due again on `today` given its most recent completion.
///
/// No completion at all means always due.
pub fn is_due_today(
    last_completed: Option<NaiveDate>,
    frequency: HabitFrequency,
    today: NaiveDate,
) -> bool {
    let Some(last) = last_completed else {
        return true;
    };
    match frequency {
        HabitFrequency::Daily => last < today,
        HabitFrequency::Weekly => (today - last).num_days() >= 7,
        HabitFrequency::Monthly => last.month() != today.month() || last.year() != today.year(),
    }
}

/// Parse a calendar-day string in the storage format (`YYYY-MM-DD`).
pub fn parse_day(value: &str) -> Result<NaiveDate, ValidationError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| ValidationError::InvalidDate {
        value: value.to_string(),
    })
}
