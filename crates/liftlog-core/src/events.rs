use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::workout::SessionMode;

/// Every state change in the engine produces an Event.
/// The GUI polls for events; the CLI prints them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    WorkoutStarted {
        routine_id: i64,
        routine_name: String,
        exercise_count: usize,
        at: DateTime<Utc>,
    },
    WorkoutResumed {
        workout_id: i64,
        routine_name: String,
        exercise_count: usize,
        at: DateTime<Utc>,
    },
    ModeChanged {
        mode: SessionMode,
        at: DateTime<Utc>,
    },
    SetLogged {
        exercise_id: i64,
        set_number: u32,
        reps: u32,
        weight: f64,
        completed: bool,
        at: DateTime<Utc>,
    },
    SetAdded {
        exercise_id: i64,
        set_number: u32,
        at: DateTime<Utc>,
    },
    SetRemoved {
        exercise_id: i64,
        set_number: u32,
        at: DateTime<Utc>,
    },
    NotesUpdated {
        exercise_id: Option<i64>,
        at: DateTime<Utc>,
    },
    /// Durable state refreshed from the store; counts let subscribers skip
    /// re-rendering when nothing actually changed.
    Reconciled {
        fields_updated: usize,
        sets_adopted: usize,
        at: DateTime<Utc>,
    },
    WorkoutFinished {
        workout_id: i64,
        duration_secs: i64,
        at: DateTime<Utc>,
    },
    WorkoutCancelled {
        workout_id: Option<i64>,
        deleted_durable: bool,
        at: DateTime<Utc>,
    },
}
