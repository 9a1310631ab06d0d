//! Recurring-task advancement and instance generation.
//!
//! `complete_instance` records one occurrence per calendar day and moves
//! the due pointer forward; `generate_next_instances` is the periodic
//! sweep that materializes dated copies of templates whose due date has
//! arrived. Both are idempotent: replaying either with the same inputs
//! leaves the task set unchanged.

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::period;
use crate::task::TaskRecord;

pub struct RecurrenceScheduler;

impl RecurrenceScheduler {
    /// Record a completed occurrence for `day`.
    ///
    /// Returns `false` without touching the task when the day is already
    /// recorded or the task is not recurring. Otherwise inserts the day
    /// and re-derives `next_due_date` from it.
    pub fn complete_instance(task: &mut TaskRecord, day: NaiveDate) -> bool {
        if !task.is_recurring() {
            return false;
        }
        if !task.recurrence.completed_instance_dates.insert(day) {
            return false;
        }
        task.recurrence.next_due_date = period::next_occurrence(
            task.recurrence.pattern,
            task.recurrence.interval,
            day,
        );
        true
    }

    /// Sweep all recurring tasks, materializing one new instance per task
    /// whose `next_due_date` has arrived and whose end date has not
    /// passed. Each source task's due pointer is advanced past the
    /// generated occurrence, so re-running the sweep with the same `now`
    /// produces nothing new.
    pub fn generate_next_instances(
        tasks: &mut [TaskRecord],
        now: DateTime<Utc>,
    ) -> Vec<TaskRecord> {
        let today = now.date_naive();
        let mut instances = Vec::new();

        for task in tasks.iter_mut() {
            if !task.is_recurring() {
                continue;
            }
            let Some(due) = task.recurrence.next_due_date else {
                continue;
            };
            if due > today {
                continue;
            }
            if task.recurrence.end_date.is_some_and(|end| due > end) {
                continue;
            }

            let instance = Self::materialize(task, due, now);
            task.recurrence.next_due_date = instance.recurrence.next_due_date;
            task.updated_at = now;
            instances.push(instance);
        }
        instances
    }

    /// Build the dated copy for one occurrence, carrying over the
    /// template's descriptive fields and recurrence settings.
    fn materialize(template: &TaskRecord, due: NaiveDate, now: DateTime<Utc>) -> TaskRecord {
        let mut instance = TaskRecord {
            id: Uuid::new_v4().to_string(),
            title: template.title.clone(),
            description: template.description.clone(),
            priority: template.priority,
            category: template.category,
            due_date: due.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc()),
            completed: false,
            completed_at: None,
            recurrence: template.recurrence.clone(),
            // Instance chains always trace back to one root.
            original_task_id: template
                .original_task_id
                .clone()
                .or_else(|| Some(template.id.clone())),
            created_at: now,
            updated_at: now,
        };
        instance.recurrence.completed_instance_dates.clear();
        instance.recurrence.next_due_date = period::next_occurrence(
            template.recurrence.pattern,
            template.recurrence.interval,
            due,
        );
        instance
    }
}
