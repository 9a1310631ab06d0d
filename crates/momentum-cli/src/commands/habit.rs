//! Habit commands.

use clap::Subcommand;
use momentum_core::{Clock, HabitRecord, ProgressStore, SystemClock};

use crate::common::{self, CliResult};

#[derive(Subcommand)]
pub enum HabitAction {
    /// Create a habit
    Add {
        name: String,
        /// daily|weekly|monthly
        #[arg(long, default_value = "daily")]
        frequency: String,
        /// Base points per completion
        #[arg(long, default_value_t = 10)]
        points: u32,
        /// easy|medium|hard
        #[arg(long, default_value = "easy")]
        difficulty: String,
        /// Completions aimed for per period
        #[arg(long, default_value_t = 1)]
        target: u32,
    },
    /// List habits
    List {
        #[arg(long)]
        json: bool,
    },
    /// Record a completion (today unless --date is given)
    Done {
        id: String,
        /// Calendar day, YYYY-MM-DD
        #[arg(long)]
        date: Option<String>,
        #[arg(long)]
        notes: Option<String>,
        #[arg(long)]
        mood: Option<String>,
    },
    /// Retract a completion
    Undo {
        id: String,
        /// Calendar day, YYYY-MM-DD
        date: String,
    },
    /// Show one habit
    Show { id: String },
    /// Delete a habit and its completion history
    Remove { id: String },
}

pub fn run(action: HabitAction) -> CliResult {
    let mut facade = common::open_facade()?;
    let user = common::current_user();

    match action {
        HabitAction::Add {
            name,
            frequency,
            points,
            difficulty,
            target,
        } => {
            let now = SystemClock.now();
            let mut habit = HabitRecord::new(name, now);
            habit.frequency = common::parse_frequency(&frequency)?;
            habit.points = points;
            habit.difficulty = common::parse_difficulty(&difficulty)?;
            habit.target_count = target;
            habit.validate()?;
            facade.store_mut().save_habit(&habit)?;
            println!("Habit created: {} ({})", habit.name, habit.id);
        }
        HabitAction::List { json } => {
            let habits = facade.store().load_habits()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&habits)?);
            } else if habits.is_empty() {
                println!("No habits yet.");
            } else {
                let today = SystemClock.today();
                let week_start = facade.week_starts_on();
                for habit in habits {
                    let due = if habit.is_due(today) { "due" } else { "done" };
                    println!(
                        "{}  {}  streak {} (best {})  {}/{} this period  [{}]",
                        habit.id,
                        habit.name,
                        habit.streak,
                        habit.best_streak,
                        habit.current_count(today, week_start),
                        habit.target_count,
                        due,
                    );
                }
            }
        }
        HabitAction::Done {
            id,
            date,
            notes,
            mood,
        } => {
            let day = common::parse_day_arg(date.as_deref())?;
            let outcome = facade.complete_habit(&user, &id, day, notes, mood)?;
            println!("+{} points", outcome.points_earned);
            for achievement in &outcome.new_achievements {
                println!("Achievement unlocked: {}", achievement.name);
            }
        }
        HabitAction::Undo { id, date } => {
            let day = momentum_core::period::parse_day(&date)?;
            let outcome = facade.uncomplete_habit(&user, &id, day)?;
            if outcome.removed {
                println!("-{} points", outcome.points_removed);
            } else {
                println!("Nothing recorded for {date}.");
            }
        }
        HabitAction::Show { id } => {
            let habit = facade
                .store()
                .load_habit(&id)?
                .ok_or_else(|| format!("habit not found: {id}"))?;
            println!("{}", serde_json::to_string_pretty(&habit)?);
        }
        HabitAction::Remove { id } => {
            facade.store_mut().delete_habit(&id)?;
            println!("Habit removed: {id}");
        }
    }
    Ok(())
}
