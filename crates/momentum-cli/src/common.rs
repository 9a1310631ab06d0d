//! Shared helpers for CLI commands.

use chrono::NaiveDate;
use momentum_core::{
    period, Database, Difficulty, EngineConfig, HabitFrequency, ProgressFacade, RecurrencePattern,
    SystemClock,
};

pub type CliResult = Result<(), Box<dyn std::error::Error>>;

/// Open the engine over the on-disk database and config.
pub fn open_facade() -> Result<ProgressFacade<Database, SystemClock>, Box<dyn std::error::Error>> {
    let config = EngineConfig::load_or_default();
    let db = Database::open()?;
    Ok(ProgressFacade::with_config(db, SystemClock, &config))
}

/// The user the CLI acts as.
pub fn current_user() -> String {
    EngineConfig::load_or_default().default_user
}

/// Parse an optional `YYYY-MM-DD` argument.
pub fn parse_day_arg(value: Option<&str>) -> Result<Option<NaiveDate>, Box<dyn std::error::Error>> {
    match value {
        Some(raw) => Ok(Some(period::parse_day(raw)?)),
        None => Ok(None),
    }
}

pub fn parse_frequency(value: &str) -> Result<HabitFrequency, Box<dyn std::error::Error>> {
    match value.to_ascii_lowercase().as_str() {
        "daily" => Ok(HabitFrequency::Daily),
        "weekly" => Ok(HabitFrequency::Weekly),
        "monthly" => Ok(HabitFrequency::Monthly),
        other => Err(format!("unknown frequency '{other}' (daily|weekly|monthly)").into()),
    }
}

pub fn parse_difficulty(value: &str) -> Result<Difficulty, Box<dyn std::error::Error>> {
    match value.to_ascii_lowercase().as_str() {
        "easy" => Ok(Difficulty::Easy),
        "medium" => Ok(Difficulty::Medium),
        "hard" => Ok(Difficulty::Hard),
        other => Err(format!("unknown difficulty '{other}' (easy|medium|hard)").into()),
    }
}

pub fn parse_pattern(value: &str) -> Result<RecurrencePattern, Box<dyn std::error::Error>> {
    match value.to_ascii_lowercase().as_str() {
        "daily" => Ok(RecurrencePattern::Daily),
        "weekly" => Ok(RecurrencePattern::Weekly),
        "monthly" => Ok(RecurrencePattern::Monthly),
        "yearly" => Ok(RecurrencePattern::Yearly),
        other => Err(format!("unknown pattern '{other}' (daily|weekly|monthly|yearly)").into()),
    }
}
