//! Core error types for momentum-core.
//!
//! The taxonomy separates caller-recoverable failures (missing entities,
//! rejected operations, bad input) from invariant violations, which signal a
//! defect and must never be silently corrected.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for momentum-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// A referenced entity does not exist.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// The operation is not valid for the entity's current state.
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// Input rejected before any mutation.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// A recompute produced a state that breaks an engine invariant.
    /// The engine refuses to persist and raises instead.
    #[error("Invariant violation: {0}")]
    Invariant(#[from] InvariantViolation),

    /// Storage-related errors
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CoreError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        CoreError::NotFound {
            kind,
            id: id.into(),
        }
    }
}

/// Validation errors, raised before mutation.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// Malformed calendar day (expected YYYY-MM-DD)
    #[error("Invalid date '{value}': expected YYYY-MM-DD")]
    InvalidDate { value: String },

    /// Recurrence interval must be at least 1
    #[error("Recurrence interval must be a positive integer")]
    ZeroInterval,

    /// Task priority outside the 1..=5 range
    #[error("Priority {value} out of range (expected 1..=5)")]
    PriorityOutOfRange { value: u8 },

    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

/// Post-recompute invariant breaches. These indicate a programming defect.
#[derive(Error, Debug)]
pub enum InvariantViolation {
    #[error("best streak {best_streak} fell below current streak {streak} for {entity}")]
    BestStreakRegressed {
        entity: String,
        streak: u32,
        best_streak: u32,
    },
}

/// Storage-specific errors.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Failed to open database connection
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Migration failed
    #[error("Database migration failed: {0}")]
    MigrationFailed(String),

    /// A stored value could not be decoded back into an entity
    #[error("Corrupt record in {table}: {message}")]
    CorruptRecord { table: &'static str, message: String },

    /// Data directory could not be resolved or created
    #[error("Data directory unavailable: {0}")]
    DataDir(String),
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        StorageError::QueryFailed(err.to_string())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
