//! Resume and reconciliation.
//!
//! `resume` rebuilds a complete in-memory session from a routine's template
//! merged with whatever partial progress the store holds. `reconcile`
//! re-syncs an existing in-memory session against the store after a
//! suspected external change, mutating only fields that actually differ.
//!
//! Merge rules, in both directions:
//! - every template exercise appears exactly once;
//! - stored sets are padded with fresh empty sets up to the template's
//!   target, never truncated when more were saved than the (possibly
//!   edited) template now specifies;
//! - in-memory sets with no durable counterpart are presumed not yet
//!   saved, never deleted;
//! - stored exercises whose template vanished keep their logged sets and
//!   are appended after the templated ones.

use tracing::debug;

use crate::error::SessionError;
use crate::session::previous::{PreviousPerformanceIndex, PreviousPerformanceLookup};
use crate::storage::store::{StoredExercise, WorkoutStore};
use crate::workout::{
    RoutineExerciseTemplate, Set, SessionMode, WorkoutExercise, WorkoutSessionState,
};

/// A session rebuilt from durable state, plus the performance targets shown
/// alongside it.
#[derive(Debug, Clone)]
pub struct ResumedSession {
    pub session: WorkoutSessionState,
    pub previous: PreviousPerformanceIndex,
}

/// What a reconcile pass actually changed. Zero counts let subscribers
/// skip re-rendering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub fields_updated: usize,
    pub sets_adopted: usize,
    pub exercises_adopted: usize,
}

/// Rebuilds and re-syncs sessions from the durable store.
pub struct ResumeReconciler<'a, S: WorkoutStore> {
    store: &'a S,
}

impl<'a, S: WorkoutStore> ResumeReconciler<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Rebuild the in-memory session for `workout_id` from the store.
    pub fn resume(&self, workout_id: i64) -> Result<ResumedSession, SessionError> {
        let header = self
            .store
            .workout_header(workout_id)?
            .ok_or(SessionError::WorkoutNotFound { workout_id })?;
        let templates = self.store.routine_templates(header.routine_id)?;
        if templates.is_empty() {
            return Err(SessionError::EmptyRoutine {
                routine_id: header.routine_id,
            });
        }
        let stored = self.store.workout_exercises(workout_id)?;
        let exercises = merge_templates(&templates, &stored);
        debug!(
            workout_id,
            exercises = exercises.len(),
            "rebuilt session from store"
        );

        let previous =
            PreviousPerformanceLookup::new(self.store).for_templates(header.routine_id, &templates)?;

        Ok(ResumedSession {
            session: WorkoutSessionState {
                workout_id: Some(workout_id),
                routine_id: header.routine_id,
                routine_name: header.name,
                start_time: header.started_at,
                exercises,
                mode: SessionMode::Active,
                notes: header.notes,
            },
            previous,
        })
    }

    /// Re-read durable rows and merge them into `session`.
    pub fn reconcile(&self, session: &mut WorkoutSessionState) -> Result<ReconcileSummary, SessionError> {
        let Some(workout_id) = session.workout_id else {
            // Nothing was ever durably created; there is nothing to merge.
            return Ok(ReconcileSummary::default());
        };
        let stored = self.store.workout_exercises(workout_id)?;
        Ok(merge_stored(session, &stored))
    }
}

/// Merge a routine's templates with persisted rows into a complete,
/// gap-filled exercise list.
pub(crate) fn merge_templates(
    templates: &[RoutineExerciseTemplate],
    stored: &[StoredExercise],
) -> Vec<WorkoutExercise> {
    let mut exercises: Vec<WorkoutExercise> = Vec::with_capacity(templates.len());
    let mut ordered: Vec<&RoutineExerciseTemplate> = templates.iter().collect();
    ordered.sort_by_key(|t| t.order_index);

    for template in &ordered {
        match stored.iter().find(|s| s.exercise_id == template.exercise_id) {
            Some(row) => {
                let mut exercise = WorkoutExercise::from_template(template);
                exercise.store_id = Some(row.id);
                exercise.notes = row.notes.clone();
                exercise.sets = pad_sets(&row.sets, template.target_sets);
                exercises.push(exercise);
            }
            None => exercises.push(WorkoutExercise::from_template(template)),
        }
    }

    // Rows whose template was removed mid-workout: logged work is never
    // dropped, so they trail the templated exercises.
    let mut next_order = ordered.iter().map(|t| t.order_index).max().unwrap_or(0);
    for row in stored {
        if templates.iter().any(|t| t.exercise_id == row.exercise_id) {
            continue;
        }
        next_order += 1;
        exercises.push(orphan_exercise(row, next_order));
    }
    exercises
}

/// Dense set list: stored values where they exist, fresh empty sets for
/// every missing number up to `target_sets`. Numbers beyond the target are
/// kept as-is.
fn pad_sets(stored: &[Set], target_sets: u32) -> Vec<Set> {
    let highest = stored.iter().map(|s| s.set_number).max().unwrap_or(0);
    let upto = highest.max(target_sets);
    (1..=upto)
        .map(|n| {
            stored
                .iter()
                .find(|s| s.set_number == n)
                .cloned()
                .unwrap_or_else(|| Set::empty(n))
        })
        .collect()
}

fn orphan_exercise(row: &StoredExercise, order_index: u32) -> WorkoutExercise {
    WorkoutExercise {
        template_id: None,
        exercise_id: row.exercise_id,
        name: row.name.clone(),
        target_sets: row.sets.len() as u32,
        order_index,
        primary_muscle: row.primary_muscle.clone(),
        category: row.category.clone(),
        store_id: Some(row.id),
        sets: pad_sets(&row.sets, 0),
        notes: row.notes.clone(),
    }
}

/// Merge freshly-read durable rows into the live session, last write wins
/// per field, touching only fields that differ.
pub(crate) fn merge_stored(
    session: &mut WorkoutSessionState,
    stored: &[StoredExercise],
) -> ReconcileSummary {
    let mut summary = ReconcileSummary::default();

    for row in stored {
        match session.exercise_mut(row.exercise_id) {
            Some(exercise) => {
                exercise.store_id = Some(row.id);
                if exercise.notes != row.notes {
                    exercise.notes = row.notes.clone();
                    summary.fields_updated += 1;
                }
                let mut appended = false;
                for stored_set in &row.sets {
                    match exercise.set_mut(stored_set.set_number) {
                        Some(set) => summary.fields_updated += sync_set(set, stored_set),
                        None => {
                            exercise.sets.push(stored_set.clone());
                            summary.sets_adopted += 1;
                            appended = true;
                        }
                    }
                }
                if appended {
                    exercise.sets.sort_by_key(|s| s.set_number);
                }
            }
            None => {
                let order = session
                    .exercises
                    .iter()
                    .map(|e| e.order_index)
                    .max()
                    .unwrap_or(0)
                    + 1;
                summary.sets_adopted += row.sets.len();
                summary.exercises_adopted += 1;
                session.exercises.push(orphan_exercise(row, order));
            }
        }
    }
    summary
}

/// Overwrite differing fields of `set` from its durable counterpart.
/// Returns the number of fields changed.
fn sync_set(set: &mut Set, stored: &Set) -> usize {
    let mut changed = 0;
    set.id = stored.id;
    if set.reps != stored.reps {
        set.reps = stored.reps;
        changed += 1;
    }
    if set.weight != stored.weight {
        set.weight = stored.weight;
        changed += 1;
    }
    if set.rest_time_secs != stored.rest_time_secs {
        set.rest_time_secs = stored.rest_time_secs;
        changed += 1;
    }
    if set.completed != stored.completed {
        set.completed = stored.completed;
        changed += 1;
    }
    if set.training_type != stored.training_type {
        set.training_type = stored.training_type;
        changed += 1;
    }
    if set.notes != stored.notes {
        set.notes = stored.notes.clone();
        changed += 1;
    }
    changed
}
