//! SQLite-based durable store.
//!
//! Holds routines, exercise definitions, routine templates, workouts,
//! workout exercises and sets, plus a small key-value table used for the
//! durable active-workout marker.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Local, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::data_dir;
use super::store::{SetTarget, StoredExercise, WorkoutHeader, WorkoutStore};
use crate::error::DatabaseError;
use crate::workout::{RoutineExerciseTemplate, Set, TrainingType};

// === Helper Functions ===

/// Parse training type from database string
fn parse_training_type(type_str: Option<&str>) -> Option<TrainingType> {
    match type_str {
        Some("heavy") => Some(TrainingType::Heavy),
        Some("moderate") => Some(TrainingType::Moderate),
        Some("light") => Some(TrainingType::Light),
        _ => None,
    }
}

/// Format training type for database storage
fn format_training_type(training_type: Option<TrainingType>) -> Option<&'static str> {
    training_type.map(|t| match t {
        TrainingType::Heavy => "heavy",
        TrainingType::Moderate => "moderate",
        TrainingType::Light => "light",
    })
}

/// Parse datetime from RFC3339 string with fallback to current time
fn parse_datetime_fallback(dt_str: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(dt_str)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

/// Build a Set from a `sets` table row
/// (id, set_number, reps, weight, rest_time, completed, training_type, notes).
fn row_to_set(row: &rusqlite::Row) -> Result<Set, rusqlite::Error> {
    let training_type: Option<String> = row.get(6)?;
    Ok(Set {
        id: Some(row.get(0)?),
        set_number: row.get(1)?,
        reps: row.get(2)?,
        weight: row.get(3)?,
        rest_time_secs: row.get(4)?,
        completed: row.get(5)?,
        training_type: parse_training_type(training_type.as_deref()),
        notes: row.get(7)?,
    })
}

const ACTIVE_WORKOUT_KEY: &str = "active_workout_id";

/// SQLite database for workout storage.
///
/// The connection lives behind a mutex so the database can be shared with
/// background save tasks.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open the database at `~/.config/liftlog/liftlog.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self, DatabaseError> {
        let path = data_dir()
            .map_err(|e| DatabaseError::OpenFailed {
                path: PathBuf::from("~/.config/liftlog"),
                source: rusqlite::Error::InvalidPath(PathBuf::from(e.to_string())),
            })?
            .join("liftlog.db");
        Self::open_at(&path)
    }

    /// Open the database at an explicit path.
    pub fn open_at(path: &Path) -> Result<Self, DatabaseError> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database (for tests).
    pub fn open_memory() -> Result<Self, DatabaseError> {
        let conn = Connection::open_in_memory().map_err(|source| DatabaseError::OpenFailed {
            path: PathBuf::from(":memory:"),
            source,
        })?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.migrate()?;
        Ok(db)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, DatabaseError> {
        self.conn
            .lock()
            .map_err(|_| DatabaseError::QueryFailed("connection mutex poisoned".to_string()))
    }

    fn migrate(&self) -> Result<(), DatabaseError> {
        let conn = self.conn()?;
        conn.execute_batch(
            "PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS routines (
                id   INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS exercises (
                id             INTEGER PRIMARY KEY AUTOINCREMENT,
                name           TEXT NOT NULL,
                primary_muscle TEXT NOT NULL DEFAULT '',
                category       TEXT NOT NULL DEFAULT ''
            );

            CREATE TABLE IF NOT EXISTS routine_exercises (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                routine_id  INTEGER NOT NULL REFERENCES routines(id) ON DELETE CASCADE,
                exercise_id INTEGER NOT NULL REFERENCES exercises(id),
                order_num   INTEGER NOT NULL DEFAULT 0,
                sets        INTEGER NOT NULL DEFAULT 3
            );

            CREATE TABLE IF NOT EXISTS workouts (
                id           INTEGER PRIMARY KEY AUTOINCREMENT,
                routine_id   INTEGER NOT NULL,
                name         TEXT NOT NULL,
                date         TEXT NOT NULL,
                duration     INTEGER NOT NULL DEFAULT 0,
                completed_at TEXT,
                notes        TEXT NOT NULL DEFAULT ''
            );

            CREATE TABLE IF NOT EXISTS workout_exercises (
                id             INTEGER PRIMARY KEY AUTOINCREMENT,
                workout_id     INTEGER NOT NULL REFERENCES workouts(id) ON DELETE CASCADE,
                exercise_id    INTEGER NOT NULL,
                sets_completed INTEGER NOT NULL DEFAULT 0,
                notes          TEXT NOT NULL DEFAULT '',
                UNIQUE (workout_id, exercise_id)
            );

            CREATE TABLE IF NOT EXISTS sets (
                id                  INTEGER PRIMARY KEY AUTOINCREMENT,
                workout_exercise_id INTEGER NOT NULL REFERENCES workout_exercises(id) ON DELETE CASCADE,
                set_number          INTEGER NOT NULL,
                reps                INTEGER NOT NULL DEFAULT 0,
                weight              REAL NOT NULL DEFAULT 0,
                rest_time           INTEGER NOT NULL DEFAULT 0,
                completed           INTEGER NOT NULL DEFAULT 0,
                training_type       TEXT,
                notes               TEXT NOT NULL DEFAULT ''
            );

            CREATE TABLE IF NOT EXISTS kv (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            -- Create indexes for common query patterns
            CREATE INDEX IF NOT EXISTS idx_workouts_routine ON workouts(routine_id);
            CREATE INDEX IF NOT EXISTS idx_workouts_completed_at ON workouts(completed_at);
            CREATE INDEX IF NOT EXISTS idx_workout_exercises_workout ON workout_exercises(workout_id);
            CREATE INDEX IF NOT EXISTS idx_sets_workout_exercise ON sets(workout_exercise_id);",
        )
        .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;
        Ok(())
    }

    // ── Routine/exercise CRUD (collaborator surface) ─────────────────

    pub fn create_routine(&self, name: &str) -> Result<i64, DatabaseError> {
        let conn = self.conn()?;
        conn.execute("INSERT INTO routines (name) VALUES (?1)", params![name])?;
        Ok(conn.last_insert_rowid())
    }

    pub fn define_exercise(
        &self,
        name: &str,
        primary_muscle: &str,
        category: &str,
    ) -> Result<i64, DatabaseError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO exercises (name, primary_muscle, category) VALUES (?1, ?2, ?3)",
            params![name, primary_muscle, category],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn add_routine_exercise(
        &self,
        routine_id: i64,
        exercise_id: i64,
        order_num: u32,
        sets: u32,
    ) -> Result<i64, DatabaseError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO routine_exercises (routine_id, exercise_id, order_num, sets)
             VALUES (?1, ?2, ?3, ?4)",
            params![routine_id, exercise_id, order_num, sets],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn list_routines(&self) -> Result<Vec<(i64, String)>, DatabaseError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT id, name FROM routines ORDER BY id")?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
        let mut routines = Vec::new();
        for row in rows {
            routines.push(row?);
        }
        Ok(routines)
    }

    // ── KV store ─────────────────────────────────────────────────────

    /// Get a value from the kv store.
    pub fn kv_get(&self, key: &str) -> Result<Option<String>, DatabaseError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT value FROM kv WHERE key = ?1")?;
        let result = stmt
            .query_row(params![key], |row| row.get::<_, String>(0))
            .optional()?;
        Ok(result)
    }

    /// Set a value in the kv store.
    pub fn kv_set(&self, key: &str, value: &str) -> Result<(), DatabaseError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn kv_delete(&self, key: &str) -> Result<(), DatabaseError> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }
}

impl WorkoutStore for Database {
    fn create_workout(
        &self,
        routine_id: i64,
        name: &str,
        started_at: DateTime<Utc>,
    ) -> Result<i64, DatabaseError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO workouts (routine_id, name, date) VALUES (?1, ?2, ?3)",
            params![routine_id, name, started_at.to_rfc3339()],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn update_workout_progress(
        &self,
        workout_id: i64,
        duration_secs: i64,
        notes: &str,
    ) -> Result<(), DatabaseError> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE workouts SET duration = ?2, notes = ?3 WHERE id = ?1",
            params![workout_id, duration_secs, notes],
        )?;
        Ok(())
    }

    fn mark_workout_completed(
        &self,
        workout_id: i64,
        completed_at: DateTime<Utc>,
        duration_secs: i64,
        notes: &str,
    ) -> Result<(), DatabaseError> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE workouts SET completed_at = ?2, duration = ?3, notes = ?4 WHERE id = ?1",
            params![workout_id, completed_at.to_rfc3339(), duration_secs, notes],
        )?;
        Ok(())
    }

    fn delete_workout(&self, workout_id: i64) -> Result<(), DatabaseError> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM workouts WHERE id = ?1", params![workout_id])?;
        Ok(())
    }

    fn workout_header(&self, workout_id: i64) -> Result<Option<WorkoutHeader>, DatabaseError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, routine_id, name, date, completed_at, notes
             FROM workouts WHERE id = ?1",
        )?;
        let header = stmt
            .query_row(params![workout_id], |row| {
                let date_str: String = row.get(3)?;
                let completed_str: Option<String> = row.get(4)?;
                Ok(WorkoutHeader {
                    id: row.get(0)?,
                    routine_id: row.get(1)?,
                    name: row.get(2)?,
                    started_at: parse_datetime_fallback(&date_str),
                    completed_at: completed_str.as_deref().map(parse_datetime_fallback),
                    notes: row.get(5)?,
                })
            })
            .optional()?;
        Ok(header)
    }

    fn upsert_workout_exercise(
        &self,
        workout_id: i64,
        exercise_id: i64,
        sets_completed: u32,
        notes: &str,
    ) -> Result<i64, DatabaseError> {
        let conn = self.conn()?;
        let id = conn.query_row(
            "INSERT INTO workout_exercises (workout_id, exercise_id, sets_completed, notes)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(workout_id, exercise_id)
             DO UPDATE SET sets_completed = excluded.sets_completed, notes = excluded.notes
             RETURNING id",
            params![workout_id, exercise_id, sets_completed, notes],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    fn insert_set(&self, workout_exercise_id: i64, set: &Set) -> Result<i64, DatabaseError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO sets (workout_exercise_id, set_number, reps, weight, rest_time,
                               completed, training_type, notes)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                workout_exercise_id,
                set.set_number,
                set.reps,
                set.weight,
                set.rest_time_secs,
                set.completed,
                format_training_type(set.training_type),
                set.notes,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn update_set(&self, set_id: i64, set: &Set) -> Result<(), DatabaseError> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE sets SET reps = ?2, weight = ?3, rest_time = ?4, completed = ?5,
                             training_type = ?6, notes = ?7
             WHERE id = ?1",
            params![
                set_id,
                set.reps,
                set.weight,
                set.rest_time_secs,
                set.completed,
                format_training_type(set.training_type),
                set.notes,
            ],
        )?;
        Ok(())
    }

    fn delete_set(&self, set_id: i64) -> Result<(), DatabaseError> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM sets WHERE id = ?1", params![set_id])?;
        Ok(())
    }

    fn workout_exercises(&self, workout_id: i64) -> Result<Vec<StoredExercise>, DatabaseError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT we.id, we.exercise_id, COALESCE(e.name, ''),
                    COALESCE(e.primary_muscle, ''), COALESCE(e.category, ''),
                    we.sets_completed, we.notes
             FROM workout_exercises we
             LEFT JOIN exercises e ON e.id = we.exercise_id
             WHERE we.workout_id = ?1 ORDER BY we.id",
        )?;
        let rows = stmt.query_map(params![workout_id], |row| {
            Ok(StoredExercise {
                id: row.get(0)?,
                exercise_id: row.get(1)?,
                name: row.get(2)?,
                primary_muscle: row.get(3)?,
                category: row.get(4)?,
                sets_completed: row.get(5)?,
                notes: row.get(6)?,
                sets: Vec::new(),
            })
        })?;
        let mut exercises = Vec::new();
        for row in rows {
            exercises.push(row?);
        }

        let mut set_stmt = conn.prepare(
            "SELECT id, set_number, reps, weight, rest_time, completed, training_type, notes
             FROM sets WHERE workout_exercise_id = ?1 ORDER BY set_number",
        )?;
        for exercise in &mut exercises {
            let sets = set_stmt.query_map(params![exercise.id], row_to_set)?;
            for set in sets {
                exercise.sets.push(set?);
            }
        }
        Ok(exercises)
    }

    fn routine_name(&self, routine_id: i64) -> Result<Option<String>, DatabaseError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT name FROM routines WHERE id = ?1")?;
        let name = stmt
            .query_row(params![routine_id], |row| row.get::<_, String>(0))
            .optional()?;
        Ok(name)
    }

    fn routine_templates(
        &self,
        routine_id: i64,
    ) -> Result<Vec<RoutineExerciseTemplate>, DatabaseError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT re.id, re.exercise_id, e.name, re.sets, re.order_num,
                    e.primary_muscle, e.category
             FROM routine_exercises re
             JOIN exercises e ON e.id = re.exercise_id
             WHERE re.routine_id = ?1
             ORDER BY re.order_num",
        )?;
        let rows = stmt.query_map(params![routine_id], |row| {
            Ok(RoutineExerciseTemplate {
                id: row.get(0)?,
                exercise_id: row.get(1)?,
                name: row.get(2)?,
                target_sets: row.get(3)?,
                order_index: row.get(4)?,
                primary_muscle: row.get(5)?,
                category: row.get(6)?,
            })
        })?;
        let mut templates = Vec::new();
        for row in rows {
            templates.push(row?);
        }
        Ok(templates)
    }

    fn previous_performance(
        &self,
        routine_id: i64,
        exercise_id: i64,
    ) -> Result<Vec<SetTarget>, DatabaseError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT s.reps, s.weight
             FROM sets s
             JOIN workout_exercises we ON we.id = s.workout_exercise_id
             WHERE we.workout_id = (
                 SELECT w.id
                 FROM workouts w
                 JOIN workout_exercises we2 ON we2.workout_id = w.id
                 WHERE w.routine_id = ?1
                   AND we2.exercise_id = ?2
                   AND w.completed_at IS NOT NULL
                 ORDER BY w.completed_at DESC
                 LIMIT 1
             )
             AND we.exercise_id = ?2
             AND s.completed = 1
             ORDER BY s.set_number",
        )?;
        let rows = stmt.query_map(params![routine_id, exercise_id], |row| {
            Ok(SetTarget {
                reps: row.get(0)?,
                weight: row.get(1)?,
            })
        })?;
        let mut targets = Vec::new();
        for row in rows {
            targets.push(row?);
        }
        Ok(targets)
    }

    fn completed_workout_dates(&self) -> Result<Vec<NaiveDate>, DatabaseError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT completed_at FROM workouts WHERE completed_at IS NOT NULL")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut dates = Vec::new();
        for row in rows {
            let completed = parse_datetime_fallback(&row?);
            dates.push(completed.with_timezone(&Local).date_naive());
        }
        Ok(dates)
    }

    fn active_workout_id(&self) -> Result<Option<i64>, DatabaseError> {
        Ok(self
            .kv_get(ACTIVE_WORKOUT_KEY)?
            .and_then(|v| v.parse().ok()))
    }

    fn set_active_workout(&self, workout_id: i64) -> Result<(), DatabaseError> {
        self.kv_set(ACTIVE_WORKOUT_KEY, &workout_id.to_string())
    }

    fn clear_active_workout(&self) -> Result<(), DatabaseError> {
        self.kv_delete(ACTIVE_WORKOUT_KEY)
    }
}
