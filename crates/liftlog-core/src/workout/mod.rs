//! In-memory workout model.
//!
//! The session engine owns exactly one [`WorkoutSessionState`] at a time.
//! UI layers render read-only snapshots of it; every mutation goes through
//! the session controller.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Immutable reference to a routine's exercise template.
///
/// Owned by the routine CRUD collaborator; the engine only reads it to
/// derive how many sets a fresh workout starts with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutineExerciseTemplate {
    pub id: i64,
    pub exercise_id: i64,
    pub name: String,
    pub target_sets: u32,
    pub order_index: u32,
    pub primary_muscle: String,
    pub category: String,
}

/// Optional intensity classification for a logged set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrainingType {
    Heavy,
    Moderate,
    Light,
}

/// One logged attempt (reps x weight) within an exercise.
///
/// `id` is `None` until the set has been durably persisted once; after the
/// first insert the store-assigned rowid is remembered so later saves become
/// updates. `set_number` is unique within an exercise and is never
/// reassigned once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Set {
    pub id: Option<i64>,
    pub set_number: u32,
    pub reps: u32,
    pub weight: f64,
    pub rest_time_secs: u32,
    pub completed: bool,
    pub training_type: Option<TrainingType>,
    #[serde(default)]
    pub notes: String,
}

impl Set {
    /// A fresh, unlogged set with the given number.
    pub fn empty(set_number: u32) -> Self {
        Self {
            id: None,
            set_number,
            reps: 0,
            weight: 0.0,
            rest_time_secs: 0,
            completed: false,
            training_type: None,
            notes: String::new(),
        }
    }

    /// True when the set carries no logged data at all.
    pub fn is_blank(&self) -> bool {
        !self.completed && self.reps == 0 && self.weight == 0.0 && self.notes.is_empty()
    }
}

/// One exercise within the active workout: template metadata plus the
/// ordered list of sets logged against it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutExercise {
    /// `None` for an exercise whose routine template was removed after the
    /// workout started; its logged sets are preserved regardless.
    pub template_id: Option<i64>,
    pub exercise_id: i64,
    pub name: String,
    pub target_sets: u32,
    pub order_index: u32,
    pub primary_muscle: String,
    pub category: String,
    /// Rowid of the `workout_exercises` row, once one exists.
    pub store_id: Option<i64>,
    /// Ordered by `set_number`.
    pub sets: Vec<Set>,
    #[serde(default)]
    pub notes: String,
}

impl WorkoutExercise {
    /// Build a fresh exercise from a routine template, with `target_sets`
    /// empty sets numbered from 1.
    pub fn from_template(template: &RoutineExerciseTemplate) -> Self {
        let sets = (1..=template.target_sets).map(Set::empty).collect();
        Self {
            template_id: Some(template.id),
            exercise_id: template.exercise_id,
            name: template.name.clone(),
            target_sets: template.target_sets,
            order_index: template.order_index,
            primary_muscle: template.primary_muscle.clone(),
            category: template.category.clone(),
            store_id: None,
            sets,
            notes: String::new(),
        }
    }

    /// Count of completed sets. Always derived, never stored.
    pub fn completed_set_count(&self) -> usize {
        self.sets.iter().filter(|s| s.completed).count()
    }

    /// Whether this exercise has anything worth persisting. Exercises the
    /// user never touched are kept out of the store entirely.
    pub fn has_progress(&self) -> bool {
        !self.notes.is_empty() || self.sets.iter().any(|s| !s.is_blank())
    }

    /// The next set number to use when appending a set.
    pub fn next_set_number(&self) -> u32 {
        self.sets.iter().map(|s| s.set_number).max().unwrap_or(0) + 1
    }

    pub fn set_mut(&mut self, set_number: u32) -> Option<&mut Set> {
        self.sets.iter_mut().find(|s| s.set_number == set_number)
    }
}

/// UI-visibility mode of the active session. Minimizing never pauses
/// timers or blocks persistence; elapsed time is always wall-clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionMode {
    Active,
    Minimized,
}

/// The authoritative in-memory representation of the workout in progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutSessionState {
    /// Store id, assigned on first durable creation. Afterwards it is the
    /// join key for all exercise/set writes.
    pub workout_id: Option<i64>,
    pub routine_id: i64,
    pub routine_name: String,
    pub start_time: DateTime<Utc>,
    pub exercises: Vec<WorkoutExercise>,
    pub mode: SessionMode,
    #[serde(default)]
    pub notes: String,
}

impl WorkoutSessionState {
    /// Start a fresh session from a routine's templates.
    pub fn from_templates(
        routine_id: i64,
        routine_name: impl Into<String>,
        templates: &[RoutineExerciseTemplate],
        start_time: DateTime<Utc>,
    ) -> Self {
        let mut exercises: Vec<WorkoutExercise> =
            templates.iter().map(WorkoutExercise::from_template).collect();
        exercises.sort_by_key(|e| e.order_index);
        Self {
            workout_id: None,
            routine_id,
            routine_name: routine_name.into(),
            start_time,
            exercises,
            mode: SessionMode::Active,
            notes: String::new(),
        }
    }

    /// Wall-clock elapsed time. Recomputed on demand so suspension never
    /// accumulates drift.
    pub fn elapsed_secs(&self, now: DateTime<Utc>) -> i64 {
        (now - self.start_time).num_seconds().max(0)
    }

    pub fn exercise(&self, exercise_id: i64) -> Option<&WorkoutExercise> {
        self.exercises.iter().find(|e| e.exercise_id == exercise_id)
    }

    pub fn exercise_mut(&mut self, exercise_id: i64) -> Option<&mut WorkoutExercise> {
        self.exercises.iter_mut().find(|e| e.exercise_id == exercise_id)
    }

    /// Merge store-assigned ids from a saved snapshot back into this state.
    ///
    /// Only absent ids are filled; ids never change once assigned. Sets are
    /// matched by `(exercise_id, set_number)`, which are stable across the
    /// snapshot/save round trip even if the user kept logging meanwhile.
    pub fn adopt_ids(&mut self, saved: &WorkoutSessionState) {
        if self.workout_id.is_none() {
            self.workout_id = saved.workout_id;
        }
        for exercise in &mut self.exercises {
            let Some(saved_ex) = saved
                .exercises
                .iter()
                .find(|e| e.exercise_id == exercise.exercise_id)
            else {
                continue;
            };
            if exercise.store_id.is_none() {
                exercise.store_id = saved_ex.store_id;
            }
            for set in &mut exercise.sets {
                if set.id.is_none() {
                    if let Some(saved_set) =
                        saved_ex.sets.iter().find(|s| s.set_number == set.set_number)
                    {
                        set.id = saved_set.id;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template(id: i64, target_sets: u32) -> RoutineExerciseTemplate {
        RoutineExerciseTemplate {
            id,
            exercise_id: id * 10,
            name: format!("Exercise {id}"),
            target_sets,
            order_index: id as u32,
            primary_muscle: "chest".into(),
            category: "barbell".into(),
        }
    }

    #[test]
    fn from_template_synthesizes_target_sets() {
        let ex = WorkoutExercise::from_template(&template(1, 4));
        assert_eq!(ex.sets.len(), 4);
        assert_eq!(
            ex.sets.iter().map(|s| s.set_number).collect::<Vec<_>>(),
            vec![1, 2, 3, 4]
        );
        assert!(ex.sets.iter().all(|s| s.is_blank()));
        assert!(!ex.has_progress());
    }

    #[test]
    fn completed_count_is_derived() {
        let mut ex = WorkoutExercise::from_template(&template(1, 3));
        assert_eq!(ex.completed_set_count(), 0);
        ex.set_mut(2).unwrap().completed = true;
        assert_eq!(ex.completed_set_count(), 1);
        ex.set_mut(2).unwrap().completed = false;
        assert_eq!(ex.completed_set_count(), 0);
    }

    #[test]
    fn notes_alone_count_as_progress() {
        let mut ex = WorkoutExercise::from_template(&template(1, 2));
        ex.notes = "felt heavy".into();
        assert!(ex.has_progress());
    }

    #[test]
    fn adopt_ids_fills_only_absent_ids() {
        let templates = vec![template(1, 2)];
        let mut live = WorkoutSessionState::from_templates(7, "Push Day", &templates, Utc::now());
        let mut saved = live.clone();
        saved.workout_id = Some(99);
        saved.exercises[0].store_id = Some(5);
        saved.exercises[0].sets[0].id = Some(41);

        // The user logged more data after the snapshot was taken.
        live.exercises[0].sets[0].reps = 8;

        live.adopt_ids(&saved);
        assert_eq!(live.workout_id, Some(99));
        assert_eq!(live.exercises[0].store_id, Some(5));
        assert_eq!(live.exercises[0].sets[0].id, Some(41));
        assert_eq!(live.exercises[0].sets[1].id, None);
        // Logged data untouched by id adoption.
        assert_eq!(live.exercises[0].sets[0].reps, 8);
    }

    #[test]
    fn elapsed_is_wall_clock() {
        let templates = vec![template(1, 1)];
        let start = Utc::now();
        let session = WorkoutSessionState::from_templates(1, "Legs", &templates, start);
        let later = start + chrono::Duration::seconds(125);
        assert_eq!(session.elapsed_secs(later), 125);
    }
}
