//! Property tests for resume reconciliation.

use chrono::Utc;
use liftlog_core::{Database, ResumeReconciler, WorkoutStore};
use proptest::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// For any routine with N templates, resuming a fresh workout yields
    /// exactly N exercises, each with exactly its target number of empty
    /// sets.
    #[test]
    fn fresh_resume_matches_the_template(target_sets in proptest::collection::vec(1u32..6, 1..8)) {
        let db = Database::open_memory().unwrap();
        let routine_id = db.create_routine("Generated").unwrap();
        for (i, targets) in target_sets.iter().enumerate() {
            let exercise_id = db
                .define_exercise(&format!("Exercise {i}"), "various", "misc")
                .unwrap();
            db.add_routine_exercise(routine_id, exercise_id, i as u32, *targets)
                .unwrap();
        }
        let workout_id = db.create_workout(routine_id, "Generated", Utc::now()).unwrap();

        let resumed = ResumeReconciler::new(&db).resume(workout_id).unwrap();
        prop_assert_eq!(resumed.session.exercises.len(), target_sets.len());
        for (exercise, expected) in resumed.session.exercises.iter().zip(&target_sets) {
            prop_assert_eq!(exercise.sets.len(), *expected as usize);
            prop_assert!(exercise.sets.iter().all(|s| s.is_blank()));
            prop_assert_eq!(exercise.completed_set_count(), 0);
        }
    }

    /// Set numbers stay unique and dense after any pad/merge, regardless of
    /// which subset of sets was persisted before the restart.
    #[test]
    fn resumed_set_numbers_are_unique_and_ordered(
        persisted in proptest::collection::btree_set(1u32..10, 0..9),
        target in 1u32..8,
    ) {
        let db = Database::open_memory().unwrap();
        let routine_id = db.create_routine("Generated").unwrap();
        let exercise_id = db.define_exercise("Movement", "various", "misc").unwrap();
        db.add_routine_exercise(routine_id, exercise_id, 0, target).unwrap();
        let workout_id = db.create_workout(routine_id, "Generated", Utc::now()).unwrap();

        if !persisted.is_empty() {
            let we = db.upsert_workout_exercise(workout_id, exercise_id, 0, "").unwrap();
            for n in &persisted {
                let mut set = liftlog_core::Set::empty(*n);
                set.reps = *n;
                set.completed = true;
                db.insert_set(we, &set).unwrap();
            }
        }

        let resumed = ResumeReconciler::new(&db).resume(workout_id).unwrap();
        let sets = &resumed.session.exercises[0].sets;

        let highest = persisted.iter().max().copied().unwrap_or(0).max(target);
        prop_assert_eq!(sets.len(), highest as usize);
        for (i, set) in sets.iter().enumerate() {
            prop_assert_eq!(set.set_number, i as u32 + 1);
            if persisted.contains(&set.set_number) {
                prop_assert_eq!(set.reps, set.set_number);
                prop_assert!(set.completed);
            } else {
                prop_assert!(set.is_blank());
            }
        }
    }
}
