//! Previous-performance lookup.
//!
//! Read-only query answering "what did I lift last time?" for each exercise
//! of a routine, shown as a target to match or exceed. Having no prior
//! record is not an error; the template simply maps to an empty list.

use std::collections::HashMap;

use crate::error::DatabaseError;
use crate::storage::store::{SetTarget, WorkoutStore};
use crate::workout::RoutineExerciseTemplate;

/// Template id -> ordered reps/weight of the most recent prior completed
/// workout under the same routine that logged that exercise.
pub type PreviousPerformanceIndex = HashMap<i64, Vec<SetTarget>>;

/// Builds [`PreviousPerformanceIndex`] values from the durable store.
pub struct PreviousPerformanceLookup<'a, S: WorkoutStore> {
    store: &'a S,
}

impl<'a, S: WorkoutStore> PreviousPerformanceLookup<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    pub fn for_templates(
        &self,
        routine_id: i64,
        templates: &[RoutineExerciseTemplate],
    ) -> Result<PreviousPerformanceIndex, DatabaseError> {
        let mut index = PreviousPerformanceIndex::with_capacity(templates.len());
        for template in templates {
            let targets = self
                .store
                .previous_performance(routine_id, template.exercise_id)?;
            index.insert(template.id, targets);
        }
        Ok(index)
    }
}
