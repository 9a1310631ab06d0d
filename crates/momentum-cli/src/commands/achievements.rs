//! Achievement commands.

use clap::Subcommand;
use momentum_core::ProgressStore;

use crate::common::{self, CliResult};

#[derive(Subcommand)]
pub enum AchievementsAction {
    /// Catalog with unlock status
    List {
        #[arg(long)]
        json: bool,
    },
}

pub fn run(action: AchievementsAction) -> CliResult {
    let facade = common::open_facade()?;
    let user = common::current_user();

    match action {
        AchievementsAction::List { json } => {
            let catalog = facade.store().achievement_catalog()?;
            let unlocked = facade.store().unlocked_achievement_ids(&user)?;
            if json {
                let view: Vec<serde_json::Value> = catalog
                    .iter()
                    .map(|a| {
                        serde_json::json!({
                            "id": a.id,
                            "name": a.name,
                            "description": a.description,
                            "unlocked": unlocked.contains(&a.id),
                        })
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&view)?);
            } else {
                for achievement in catalog {
                    let marker = if unlocked.contains(&achievement.id) {
                        "x"
                    } else {
                        " "
                    };
                    println!(
                        "[{marker}] {}  - {}",
                        achievement.name, achievement.description
                    );
                }
            }
        }
    }
    Ok(())
}
