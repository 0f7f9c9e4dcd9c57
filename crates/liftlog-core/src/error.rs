//! Core error types for liftlog-core.
//!
//! This module defines the error hierarchy using thiserror. Session-level
//! errors are all recoverable from the caller's point of view; nothing in
//! the engine is expected to abort the process.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for liftlog-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Workout session errors
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic errors with context
    #[error("{0}")]
    Custom(String),
}

/// Errors raised by the workout session state machine and resume path.
///
/// Every variant is recoverable: the caller redirects, prompts, or retries.
#[derive(Error, Debug)]
pub enum SessionError {
    /// Another workout is already in progress. Carries the existing
    /// workout's identity so the caller can redirect to it instead of
    /// overwriting it.
    #[error("a workout for '{routine_name}' is already in progress")]
    AlreadyActive {
        workout_id: Option<i64>,
        routine_name: String,
    },

    /// The routine has no exercise templates, so a workout cannot start.
    #[error("routine {routine_id} has no exercises")]
    NoExercises { routine_id: i64 },

    /// The routine backing a resumed workout no longer has any templates.
    #[error("routine {routine_id} no longer has any exercises")]
    EmptyRoutine { routine_id: i64 },

    /// The resume target vanished from the store.
    #[error("workout {workout_id} not found")]
    WorkoutNotFound { workout_id: i64 },

    /// An operation that requires an active session was called without one.
    #[error("no workout is in progress")]
    NotActive,

    /// The exercise id does not belong to the active workout.
    #[error("exercise {exercise_id} is not part of the active workout")]
    UnknownExercise { exercise_id: i64 },

    /// The set number does not exist within the exercise.
    #[error("set {set_number} not found for exercise {exercise_id}")]
    UnknownSet { exercise_id: i64, set_number: u32 },

    /// Removing the last remaining set of an exercise is disallowed.
    #[error("exercise {exercise_id} must keep at least one set")]
    LastSet { exercise_id: i64 },

    /// A resume finished loading after the session slot had already been
    /// replaced; the loaded result was discarded.
    #[error("resume was superseded by a newer session")]
    ResumeSuperseded,

    /// The terminal finish save exhausted its retries. The in-memory
    /// session is kept so the caller can retry.
    #[error("could not persist finished workout after {attempts} attempts")]
    PersistenceExhausted { attempts: u32 },

    /// Store failure bubbling out of resume/lookup reads.
    #[error(transparent)]
    Store(#[from] DatabaseError),
}

/// Database-specific errors.
#[derive(Error, Debug)]
pub enum DatabaseError {
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

    /// Database is locked
    #[error("Database is locked")]
    Locked,
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Failed to parse configuration
    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),
}

impl From<rusqlite::Error> for DatabaseError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(err, _msg) => {
                if err.code == rusqlite::ErrorCode::DatabaseLocked {
                    DatabaseError::Locked
                } else {
                    DatabaseError::QueryFailed(err.to_string())
                }
            }
            _ => DatabaseError::QueryFailed(err.to_string()),
        }
    }
}

impl From<Box<dyn std::error::Error + Send + Sync>> for CoreError {
    fn from(err: Box<dyn std::error::Error + Send + Sync>) -> Self {
        CoreError::Custom(err.to_string())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
