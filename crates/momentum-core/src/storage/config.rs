//! TOML-based engine configuration.
//!
//! Holds the policy knobs the engine reads at construction: scoring
//! constants, the week-start day for weekly periods, and the default user
//! the CLI acts as. Stored at `~/.config/momentum/config.toml`.

use chrono::Weekday;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::data_dir;
use crate::error::{CoreError, Result, ValidationError};
use crate::scoring::ScoringConfig;

/// First day of the week for weekly periods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum WeekStart {
    #[default]
    Monday,
    Sunday,
}

impl WeekStart {
    pub fn weekday(self) -> Weekday {
        match self {
            WeekStart::Monday => Weekday::Mon,
            WeekStart::Sunday => Weekday::Sun,
        }
    }
}

/// Period policy.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PeriodConfig {
    #[serde(default)]
    pub week_starts_on: WeekStart,
}

/// Engine configuration.
///
/// Serialized to/from TOML at `~/.config/momentum/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub period: PeriodConfig,
    #[serde(default = "default_user")]
    pub default_user: String,
}

fn default_user() -> String {
    "local".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            scoring: ScoringConfig::default(),
            period: PeriodConfig::default(),
            default_user: default_user(),
        }
    }
}

impl EngineConfig {
    fn path() -> Result<PathBuf> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from disk or write and return the default.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self> {
        let path = Self::path()?;
        match std::fs::read_to_string(&path) {
            Ok(content) => {
                let config: EngineConfig = toml::from_str(&content).map_err(|err| {
                    CoreError::Validation(ValidationError::InvalidValue {
                        field: path.display().to_string(),
                        message: err.to_string(),
                    })
                })?;
                Ok(config)
            }
            Err(_) => {
                let config = Self::default();
                config.save()?;
                Ok(config)
            }
        }
    }

    /// Persist to disk.
    pub fn save(&self) -> Result<()> {
        let content = toml::to_string_pretty(self).map_err(|err| {
            CoreError::Validation(ValidationError::InvalidValue {
                field: "config".to_string(),
                message: err.to_string(),
            })
        })?;
        std::fs::write(Self::path()?, content)?;
        Ok(())
    }

    /// Load from disk, returning default on error.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_default()
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let value = json.pointer(&json_pointer(key))?;
        match value {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a config value by dot-separated key and persist. The new value
    /// must parse as the existing value's type.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let mut json = serde_json::to_value(&*self)?;
        let slot = json
            .pointer_mut(&json_pointer(key))
            .ok_or_else(|| ValidationError::InvalidValue {
                field: key.to_string(),
                message: "unknown config key".to_string(),
            })?;

        *slot = parse_as_existing(slot, key, value)?;
        *self = serde_json::from_value(json)?;
        self.save()?;
        Ok(())
    }
}

fn json_pointer(key: &str) -> String {
    format!("/{}", key.replace('.', "/"))
}

fn parse_as_existing(
    existing: &serde_json::Value,
    key: &str,
    value: &str,
) -> Result<serde_json::Value> {
    let parsed = match existing {
        serde_json::Value::Bool(_) => {
            serde_json::Value::Bool(value.parse::<bool>().map_err(|_| {
                ValidationError::InvalidValue {
                    field: key.to_string(),
                    message: format!("cannot parse '{value}' as bool"),
                }
            })?)
        }
        serde_json::Value::Number(_) => {
            if let Ok(n) = value.parse::<i64>() {
                serde_json::Value::Number(n.into())
            } else if let Some(n) = value
                .parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
            {
                serde_json::Value::Number(n)
            } else {
                return Err(ValidationError::InvalidValue {
                    field: key.to_string(),
                    message: format!("cannot parse '{value}' as number"),
                }
                .into());
            }
        }
        _ => serde_json::Value::String(value.to_string()),
    };
    Ok(parsed)
}
