//! The durable store seam.
//!
//! The engine never talks to SQLite directly; everything goes through
//! [`WorkoutStore`] so tests can substitute failing or scripted stores to
//! exercise retry and reconciliation paths.

use chrono::{DateTime, NaiveDate, Utc};

use crate::error::DatabaseError;
use crate::workout::{RoutineExerciseTemplate, Set};

/// Header row of a `workouts` record.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkoutHeader {
    pub id: i64,
    pub routine_id: i64,
    pub name: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub notes: String,
}

/// A persisted `workout_exercises` row with its sets, ordered by set
/// number. Display metadata is joined in from the exercise definition so a
/// row can be rebuilt even when its routine template no longer exists.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredExercise {
    pub id: i64,
    pub exercise_id: i64,
    pub name: String,
    pub primary_muscle: String,
    pub category: String,
    pub sets_completed: u32,
    pub notes: String,
    pub sets: Vec<Set>,
}

/// Reps/weight pair from a prior workout, shown as a target to match.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SetTarget {
    pub reps: u32,
    pub weight: f64,
}

/// Read/write surface the session engine consumes.
///
/// All writes are idempotent: exercises upsert by `(workout_id,
/// exercise_id)`, sets update by rowid when one is known and insert
/// otherwise. Implementations provide no cross-call transactionality; the
/// engine serializes its own write sequence.
pub trait WorkoutStore {
    // ── Workout rows ─────────────────────────────────────────────────

    fn create_workout(
        &self,
        routine_id: i64,
        name: &str,
        started_at: DateTime<Utc>,
    ) -> Result<i64, DatabaseError>;

    fn update_workout_progress(
        &self,
        workout_id: i64,
        duration_secs: i64,
        notes: &str,
    ) -> Result<(), DatabaseError>;

    fn mark_workout_completed(
        &self,
        workout_id: i64,
        completed_at: DateTime<Utc>,
        duration_secs: i64,
        notes: &str,
    ) -> Result<(), DatabaseError>;

    /// Delete a workout and everything hanging off it.
    fn delete_workout(&self, workout_id: i64) -> Result<(), DatabaseError>;

    fn workout_header(&self, workout_id: i64) -> Result<Option<WorkoutHeader>, DatabaseError>;

    // ── Exercise/set rows ────────────────────────────────────────────

    fn upsert_workout_exercise(
        &self,
        workout_id: i64,
        exercise_id: i64,
        sets_completed: u32,
        notes: &str,
    ) -> Result<i64, DatabaseError>;

    fn insert_set(&self, workout_exercise_id: i64, set: &Set) -> Result<i64, DatabaseError>;

    fn update_set(&self, set_id: i64, set: &Set) -> Result<(), DatabaseError>;

    /// Remove a single persisted set row (the highest-numbered set of an
    /// exercise when the user removes it mid-workout).
    fn delete_set(&self, set_id: i64) -> Result<(), DatabaseError>;

    fn workout_exercises(&self, workout_id: i64) -> Result<Vec<StoredExercise>, DatabaseError>;

    // ── Routine reads ────────────────────────────────────────────────

    fn routine_name(&self, routine_id: i64) -> Result<Option<String>, DatabaseError>;

    fn routine_templates(
        &self,
        routine_id: i64,
    ) -> Result<Vec<RoutineExerciseTemplate>, DatabaseError>;

    // ── Derived reads ────────────────────────────────────────────────

    /// Ordered reps/weight of the most recent prior completed workout under
    /// `routine_id` that logged `exercise_id`. Empty when none exists.
    fn previous_performance(
        &self,
        routine_id: i64,
        exercise_id: i64,
    ) -> Result<Vec<SetTarget>, DatabaseError>;

    /// Local calendar date of every completed workout, one entry per
    /// workout (not deduplicated; callers count per-day activity).
    fn completed_workout_dates(&self) -> Result<Vec<NaiveDate>, DatabaseError>;

    // ── Active-workout marker ────────────────────────────────────────
    //
    // Extends the single-active-workout invariant across process restarts.

    fn active_workout_id(&self) -> Result<Option<i64>, DatabaseError>;

    fn set_active_workout(&self, workout_id: i64) -> Result<(), DatabaseError>;

    fn clear_active_workout(&self) -> Result<(), DatabaseError>;
}
