//! Progress and leaderboard commands.

use clap::Subcommand;
use serde::Serialize;

use crate::common::{self, CliResult};

#[derive(Subcommand)]
pub enum ProgressAction {
    /// Current points, level and streaks
    Show {
        #[arg(long)]
        json: bool,
    },
    /// Users ranked by total points
    Leaderboard {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
}

#[derive(Serialize)]
struct SnapshotView {
    user_id: String,
    total_points: i64,
    level: u32,
    points_to_next_level: i64,
    level_percent: f64,
    current_streak: u32,
    best_streak: u32,
    new_achievements: Vec<String>,
}

pub fn run(action: ProgressAction) -> CliResult {
    let mut facade = common::open_facade()?;
    let user = common::current_user();

    match action {
        ProgressAction::Show { json } => {
            let snapshot = facade.progress_snapshot(&user)?;
            let view = SnapshotView {
                user_id: snapshot.progress.user_id.clone(),
                total_points: snapshot.progress.total_points,
                level: snapshot.level,
                points_to_next_level: snapshot.level_progress.points_to_next,
                level_percent: snapshot.level_progress.percent,
                current_streak: snapshot.progress.current_streak,
                best_streak: snapshot.progress.best_streak,
                new_achievements: snapshot
                    .new_achievements
                    .iter()
                    .map(|a| a.name.clone())
                    .collect(),
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&view)?);
            } else {
                println!(
                    "Level {}  {} points  ({:.1}% to next, {} to go)",
                    view.level, view.total_points, view.level_percent, view.points_to_next_level
                );
                println!(
                    "Streak {} (best {})",
                    view.current_streak, view.best_streak
                );
                for name in &view.new_achievements {
                    println!("Achievement unlocked: {name}");
                }
            }
        }
        ProgressAction::Leaderboard { limit } => {
            let board = facade.leaderboard(limit)?;
            if board.is_empty() {
                println!("No users yet.");
            }
            for entry in board {
                println!(
                    "{:>3}. {}  {} points (level {})",
                    entry.rank, entry.user_id, entry.total_points, entry.level
                );
            }
        }
    }
    Ok(())
}
