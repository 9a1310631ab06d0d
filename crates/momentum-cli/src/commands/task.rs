//! Task commands.

use chrono::NaiveTime;
use clap::Subcommand;
use momentum_core::{Clock, ProgressStore, SystemClock, TaskRecord};

use crate::common::{self, CliResult};

#[derive(Subcommand)]
pub enum TaskAction {
    /// Create a task
    Add {
        title: String,
        /// Priority 1-5
        #[arg(long, default_value_t = 3)]
        priority: u8,
        /// Due day, YYYY-MM-DD
        #[arg(long)]
        due: Option<String>,
        /// Recurrence pattern: daily|weekly|monthly|yearly
        #[arg(long)]
        recur: Option<String>,
        /// Recurrence interval
        #[arg(long, default_value_t = 1)]
        interval: u32,
        /// Last day occurrences may be generated for, YYYY-MM-DD
        #[arg(long)]
        end: Option<String>,
    },
    /// List tasks
    List {
        #[arg(long)]
        json: bool,
        /// Include completed tasks
        #[arg(long)]
        all: bool,
    },
    /// Complete a task (records an instance for recurring tasks)
    Done {
        id: String,
        /// Calendar day for recurring instances, YYYY-MM-DD
        #[arg(long)]
        date: Option<String>,
    },
    /// Reopen a completed task
    Undo { id: String },
    /// Materialize due instances of recurring tasks
    Sweep,
}

pub fn run(action: TaskAction) -> CliResult {
    let mut facade = common::open_facade()?;
    let user = common::current_user();

    match action {
        TaskAction::Add {
            title,
            priority,
            due,
            recur,
            interval,
            end,
        } => {
            let now = SystemClock.now();
            let mut task = TaskRecord::new(title, now);
            task.priority = priority;
            if let Some(day) = common::parse_day_arg(due.as_deref())? {
                // Due at end of day so same-day completions count as on time.
                let end_of_day = NaiveTime::from_hms_opt(23, 59, 59).unwrap_or_default();
                task.due_date = Some(day.and_time(end_of_day).and_utc());
            }
            let mut task = match recur {
                Some(pattern) => task.with_recurrence(common::parse_pattern(&pattern)?, interval),
                None => task,
            };
            task.recurrence.end_date = common::parse_day_arg(end.as_deref())?;
            task.validate()?;
            facade.store_mut().save_task(&task)?;
            println!("Task created: {} ({})", task.title, task.id);
        }
        TaskAction::List { json, all } => {
            let tasks: Vec<TaskRecord> = facade
                .store()
                .load_tasks()?
                .into_iter()
                .filter(|task| all || !task.completed)
                .collect();
            if json {
                println!("{}", serde_json::to_string_pretty(&tasks)?);
            } else if tasks.is_empty() {
                println!("No tasks.");
            } else {
                for task in tasks {
                    let marker = if task.completed { "x" } else { " " };
                    let recur = if task.is_recurring() {
                        match task.recurrence.next_due_date {
                            Some(next) => format!("  (recurring, next {next})"),
                            None => "  (recurring)".to_string(),
                        }
                    } else {
                        String::new()
                    };
                    println!("[{marker}] {}  {}  p{}{recur}", task.id, task.title, task.priority);
                }
            }
        }
        TaskAction::Done { id, date } => {
            let task = facade
                .store()
                .load_task(&id)?
                .ok_or_else(|| format!("task not found: {id}"))?;
            let outcome = if task.is_recurring() {
                let day = common::parse_day_arg(date.as_deref())?;
                facade.complete_recurring_task(&user, &id, day)?
            } else {
                facade.complete_task(&user, &id, None)?
            };
            println!("+{} points", outcome.points_earned);
            for achievement in &outcome.new_achievements {
                println!("Achievement unlocked: {}", achievement.name);
            }
        }
        TaskAction::Undo { id } => {
            let outcome = facade.uncomplete_task(&user, &id)?;
            if outcome.removed {
                println!("-{} points", outcome.points_removed);
            } else {
                println!("Task was not completed.");
            }
        }
        TaskAction::Sweep => {
            let now = SystemClock.now();
            let outcome = facade.sweep_recurring_instances(Some(now))?;
            if outcome.instances.is_empty() {
                println!("Nothing due.");
            } else {
                for instance in &outcome.instances {
                    let due = instance
                        .due_date
                        .map(|d| d.date_naive().to_string())
                        .unwrap_or_default();
                    println!("Generated: {} due {}", instance.title, due);
                }
            }
        }
    }
    Ok(())
}
