//! Persistence gateway: the only writer of workout progress.
//!
//! Upserts the in-memory session into the durable store with bounded retry
//! and exponential backoff. Retry exhaustion is a soft failure reported to
//! the caller; the in-memory state stays authoritative and a later save may
//! still succeed.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;
use tracing::{debug, warn};

use super::store::WorkoutStore;
use crate::error::DatabaseError;
use crate::workout::WorkoutSessionState;

/// Backoff schedule for storage writes.
///
/// Expressed as a value object rather than inline recursion so tests can
/// inject zero-delay policies.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Fraction of the computed delay added as random jitter (0.0 disables).
    pub jitter: f64,
}

impl RetryPolicy {
    /// Policy for fire-and-forget background saves.
    pub fn background() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(4),
            jitter: 0.2,
        }
    }

    /// Policy for urgent saves (finish, app exit).
    pub fn urgent() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(4),
            jitter: 0.2,
        }
    }

    /// Zero-delay policy for tests.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            jitter: 0.0,
        }
    }

    /// Delay before the retry following `attempt` (0-based): base delay
    /// doubling each attempt, capped, plus jitter.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
            .min(self.max_delay);
        if self.jitter <= 0.0 || exp.is_zero() {
            return exp;
        }
        let jitter = exp.mul_f64(rand::thread_rng().gen_range(0.0..self.jitter));
        exp + jitter
    }
}

/// Result of a save call. Exhaustion never throws into the UI layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved,
    Exhausted { attempts: u32 },
}

impl SaveOutcome {
    pub fn is_saved(&self) -> bool {
        matches!(self, SaveOutcome::Saved)
    }
}

/// Writes in-memory session state into the durable store.
pub struct PersistenceGateway<S: WorkoutStore> {
    store: Arc<S>,
    background: RetryPolicy,
    urgent: RetryPolicy,
}

impl<S: WorkoutStore> PersistenceGateway<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            background: RetryPolicy::background(),
            urgent: RetryPolicy::urgent(),
        }
    }

    /// Override both policies (tests use zero-delay variants).
    pub fn with_policies(store: Arc<S>, background: RetryPolicy, urgent: RetryPolicy) -> Self {
        Self {
            store,
            background,
            urgent,
        }
    }

    /// Upsert the session into the store, retrying with backoff.
    ///
    /// Store-assigned ids are captured back onto `session` as inserts
    /// succeed, so subsequent saves become updates.
    pub async fn save(&self, session: &mut WorkoutSessionState, urgent: bool) -> SaveOutcome {
        let policy = if urgent { &self.urgent } else { &self.background };
        self.save_with(session, policy, None).await
    }

    /// Terminal save: stamps `completed_at` and uses the urgent policy.
    pub async fn finish(
        &self,
        session: &mut WorkoutSessionState,
        completed_at: DateTime<Utc>,
    ) -> SaveOutcome {
        let policy = self.urgent.clone();
        self.save_with(session, &policy, Some(completed_at)).await
    }

    async fn save_with(
        &self,
        session: &mut WorkoutSessionState,
        policy: &RetryPolicy,
        completed_at: Option<DateTime<Utc>>,
    ) -> SaveOutcome {
        for attempt in 0..policy.max_attempts {
            match self.try_save(session, completed_at) {
                Ok(()) => {
                    debug!(workout_id = ?session.workout_id, attempt, "workout saved");
                    return SaveOutcome::Saved;
                }
                Err(e) => {
                    warn!(
                        workout_id = ?session.workout_id,
                        attempt,
                        error = %e,
                        "workout save attempt failed"
                    );
                    if attempt + 1 < policy.max_attempts {
                        let delay = policy.delay_for(attempt);
                        if !delay.is_zero() {
                            tokio::time::sleep(delay).await;
                        }
                    }
                }
            }
        }
        warn!(
            workout_id = ?session.workout_id,
            attempts = policy.max_attempts,
            "workout save exhausted retries; keeping in-memory state authoritative"
        );
        SaveOutcome::Exhausted {
            attempts: policy.max_attempts,
        }
    }

    /// One save pass. Workout- and exercise-level failures abort the pass
    /// (and get retried); set-level failures are logged and skipped so one
    /// bad row does not lose the rest of the workout.
    fn try_save(
        &self,
        session: &mut WorkoutSessionState,
        completed_at: Option<DateTime<Utc>>,
    ) -> Result<(), DatabaseError> {
        let now = Utc::now();

        let workout_id = match session.workout_id {
            Some(id) => id,
            None => {
                let id = self.store.create_workout(
                    session.routine_id,
                    &session.routine_name,
                    session.start_time,
                )?;
                self.store.set_active_workout(id)?;
                session.workout_id = Some(id);
                id
            }
        };

        for exercise in &mut session.exercises {
            // Never write placeholder rows for exercises the user hasn't
            // touched.
            if !exercise.has_progress() {
                continue;
            }
            let row_id = self.store.upsert_workout_exercise(
                workout_id,
                exercise.exercise_id,
                exercise.completed_set_count() as u32,
                &exercise.notes,
            )?;
            exercise.store_id = Some(row_id);

            for set in &mut exercise.sets {
                let result = match set.id {
                    Some(set_id) => self.store.update_set(set_id, set),
                    None => self.store.insert_set(row_id, set).map(|id| {
                        set.id = Some(id);
                    }),
                };
                if let Err(e) = result {
                    warn!(
                        exercise_id = exercise.exercise_id,
                        set_number = set.set_number,
                        error = %e,
                        "set write failed; skipping row"
                    );
                }
            }
        }

        // Duration is always recomputed from wall clock, never accumulated.
        let duration = session.elapsed_secs(now);
        match completed_at {
            Some(at) => self
                .store
                .mark_workout_completed(workout_id, at, duration, &session.notes)?,
            None => self
                .store
                .update_workout_progress(workout_id, duration, &session.notes)?,
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::database::Database;
    use crate::storage::store::{SetTarget, StoredExercise, WorkoutHeader};
    use crate::workout::{RoutineExerciseTemplate, Set};
    use chrono::NaiveDate;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Store wrapper that fails a scripted number of write calls.
    struct FlakyStore {
        inner: Database,
        failing_writes: AtomicU32,
        failing_set_inserts: AtomicU32,
    }

    impl FlakyStore {
        fn new(inner: Database) -> Self {
            Self {
                inner,
                failing_writes: AtomicU32::new(0),
                failing_set_inserts: AtomicU32::new(0),
            }
        }

        fn fail_writes(self, n: u32) -> Self {
            self.failing_writes.store(n, Ordering::SeqCst);
            self
        }

        fn fail_set_inserts(self, n: u32) -> Self {
            self.failing_set_inserts.store(n, Ordering::SeqCst);
            self
        }

        fn trip(&self, counter: &AtomicU32) -> Result<(), DatabaseError> {
            if counter
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                Err(DatabaseError::QueryFailed("injected failure".into()))
            } else {
                Ok(())
            }
        }
    }

    impl WorkoutStore for FlakyStore {
        fn create_workout(
            &self,
            routine_id: i64,
            name: &str,
            started_at: DateTime<Utc>,
        ) -> Result<i64, DatabaseError> {
            self.trip(&self.failing_writes)?;
            self.inner.create_workout(routine_id, name, started_at)
        }

        fn update_workout_progress(
            &self,
            workout_id: i64,
            duration_secs: i64,
            notes: &str,
        ) -> Result<(), DatabaseError> {
            self.trip(&self.failing_writes)?;
            self.inner
                .update_workout_progress(workout_id, duration_secs, notes)
        }

        fn mark_workout_completed(
            &self,
            workout_id: i64,
            completed_at: DateTime<Utc>,
            duration_secs: i64,
            notes: &str,
        ) -> Result<(), DatabaseError> {
            self.trip(&self.failing_writes)?;
            self.inner
                .mark_workout_completed(workout_id, completed_at, duration_secs, notes)
        }

        fn delete_workout(&self, workout_id: i64) -> Result<(), DatabaseError> {
            self.inner.delete_workout(workout_id)
        }

        fn workout_header(&self, workout_id: i64) -> Result<Option<WorkoutHeader>, DatabaseError> {
            self.inner.workout_header(workout_id)
        }

        fn upsert_workout_exercise(
            &self,
            workout_id: i64,
            exercise_id: i64,
            sets_completed: u32,
            notes: &str,
        ) -> Result<i64, DatabaseError> {
            self.trip(&self.failing_writes)?;
            self.inner
                .upsert_workout_exercise(workout_id, exercise_id, sets_completed, notes)
        }

        fn insert_set(&self, workout_exercise_id: i64, set: &Set) -> Result<i64, DatabaseError> {
            self.trip(&self.failing_set_inserts)?;
            self.inner.insert_set(workout_exercise_id, set)
        }

        fn update_set(&self, set_id: i64, set: &Set) -> Result<(), DatabaseError> {
            self.inner.update_set(set_id, set)
        }

        fn delete_set(&self, set_id: i64) -> Result<(), DatabaseError> {
            self.inner.delete_set(set_id)
        }

        fn workout_exercises(
            &self,
            workout_id: i64,
        ) -> Result<Vec<StoredExercise>, DatabaseError> {
            self.inner.workout_exercises(workout_id)
        }

        fn routine_name(&self, routine_id: i64) -> Result<Option<String>, DatabaseError> {
            self.inner.routine_name(routine_id)
        }

        fn routine_templates(
            &self,
            routine_id: i64,
        ) -> Result<Vec<RoutineExerciseTemplate>, DatabaseError> {
            self.inner.routine_templates(routine_id)
        }

        fn previous_performance(
            &self,
            routine_id: i64,
            exercise_id: i64,
        ) -> Result<Vec<SetTarget>, DatabaseError> {
            self.inner.previous_performance(routine_id, exercise_id)
        }

        fn completed_workout_dates(&self) -> Result<Vec<NaiveDate>, DatabaseError> {
            self.inner.completed_workout_dates()
        }

        fn active_workout_id(&self) -> Result<Option<i64>, DatabaseError> {
            self.inner.active_workout_id()
        }

        fn set_active_workout(&self, workout_id: i64) -> Result<(), DatabaseError> {
            self.inner.set_active_workout(workout_id)
        }

        fn clear_active_workout(&self) -> Result<(), DatabaseError> {
            self.inner.clear_active_workout()
        }
    }

    fn session_fixture(db: &Database) -> WorkoutSessionState {
        let routine_id = db.create_routine("Push Day").unwrap();
        let bench = db.define_exercise("Bench Press", "chest", "barbell").unwrap();
        let squat = db.define_exercise("Squat", "quads", "barbell").unwrap();
        db.add_routine_exercise(routine_id, bench, 0, 2).unwrap();
        db.add_routine_exercise(routine_id, squat, 1, 2).unwrap();
        let templates = db.routine_templates(routine_id).unwrap();
        WorkoutSessionState::from_templates(routine_id, "Push Day", &templates, Utc::now())
    }

    fn zero_delay_gateway<S: WorkoutStore>(store: Arc<S>, attempts: u32) -> PersistenceGateway<S> {
        PersistenceGateway::with_policies(
            store,
            RetryPolicy::immediate(attempts),
            RetryPolicy::immediate(attempts + 2),
        )
    }

    #[tokio::test]
    async fn first_save_creates_workout_and_captures_ids() {
        let db = Database::open_memory().unwrap();
        let mut session = session_fixture(&db);
        let bench_id = session.exercises[0].exercise_id;
        session
            .exercise_mut(bench_id)
            .unwrap()
            .set_mut(1)
            .unwrap()
            .completed = true;

        let store = Arc::new(FlakyStore::new(db));
        let gateway = zero_delay_gateway(store.clone(), 3);
        let outcome = gateway.save(&mut session, false).await;

        assert!(outcome.is_saved());
        let workout_id = session.workout_id.expect("workout id captured");
        assert_eq!(store.active_workout_id().unwrap(), Some(workout_id));
        let bench = session.exercise(bench_id).unwrap();
        assert!(bench.store_id.is_some());
        assert!(bench.sets.iter().all(|s| s.id.is_some()));
    }

    #[tokio::test]
    async fn untouched_exercises_are_never_written() {
        let db = Database::open_memory().unwrap();
        let mut session = session_fixture(&db);
        let bench_id = session.exercises[0].exercise_id;
        session
            .exercise_mut(bench_id)
            .unwrap()
            .set_mut(1)
            .unwrap()
            .completed = true;

        let store = Arc::new(FlakyStore::new(db));
        let gateway = zero_delay_gateway(store.clone(), 3);
        gateway.save(&mut session, false).await;
        gateway.save(&mut session, false).await;

        let rows = store
            .workout_exercises(session.workout_id.unwrap())
            .unwrap();
        // Squat was never touched: exactly one row, for bench, despite two
        // save calls.
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].exercise_id, bench_id);
    }

    #[tokio::test]
    async fn transient_failures_are_retried() {
        let db = Database::open_memory().unwrap();
        let mut session = session_fixture(&db);
        session.exercises[0].set_mut(1).unwrap().completed = true;

        let store = Arc::new(FlakyStore::new(db).fail_writes(2));
        let gateway = zero_delay_gateway(store.clone(), 3);
        let outcome = gateway.save(&mut session, false).await;

        assert!(outcome.is_saved());
        assert!(session.workout_id.is_some());
    }

    #[tokio::test]
    async fn exhaustion_is_soft_and_later_save_succeeds() {
        let db = Database::open_memory().unwrap();
        let mut session = session_fixture(&db);
        session.exercises[0].set_mut(1).unwrap().reps = 8;

        let store = Arc::new(FlakyStore::new(db).fail_writes(10));
        let gateway = zero_delay_gateway(store.clone(), 3);

        let outcome = gateway.save(&mut session, false).await;
        assert_eq!(outcome, SaveOutcome::Exhausted { attempts: 3 });
        assert_eq!(session.workout_id, None);
        // In-memory state still authoritative.
        assert_eq!(session.exercises[0].sets[0].reps, 8);

        // Failures cleared (10 - 3 attempts leaves 7; drain the rest).
        store.failing_writes.store(0, Ordering::SeqCst);
        let outcome = gateway.save(&mut session, false).await;
        assert!(outcome.is_saved());
        assert!(session.workout_id.is_some());
    }

    #[tokio::test]
    async fn one_bad_set_row_does_not_abort_the_save() {
        let db = Database::open_memory().unwrap();
        let mut session = session_fixture(&db);
        let bench_id = session.exercises[0].exercise_id;
        {
            let bench = session.exercise_mut(bench_id).unwrap();
            bench.set_mut(1).unwrap().completed = true;
            bench.set_mut(2).unwrap().completed = true;
        }

        let store = Arc::new(FlakyStore::new(db).fail_set_inserts(1));
        let gateway = zero_delay_gateway(store.clone(), 1);
        let outcome = gateway.save(&mut session, false).await;

        assert!(outcome.is_saved());
        let bench = session.exercise(bench_id).unwrap();
        // First insert failed and was skipped; second landed.
        assert_eq!(bench.sets[0].id, None);
        assert!(bench.sets[1].id.is_some());

        // The skipped row becomes an insert on the next save.
        let outcome = gateway.save(&mut session, false).await;
        assert!(outcome.is_saved());
        assert!(session.exercise(bench_id).unwrap().sets[0].id.is_some());
        let rows = store
            .workout_exercises(session.workout_id.unwrap())
            .unwrap();
        assert_eq!(rows[0].sets.len(), 2);
    }

    #[tokio::test]
    async fn finish_stamps_completed_at() {
        let db = Database::open_memory().unwrap();
        let mut session = session_fixture(&db);
        session.exercises[0].set_mut(1).unwrap().completed = true;

        let store = Arc::new(FlakyStore::new(db));
        let gateway = zero_delay_gateway(store.clone(), 3);
        let completed_at = Utc::now();
        let outcome = gateway.finish(&mut session, completed_at).await;

        assert!(outcome.is_saved());
        let header = store
            .workout_header(session.workout_id.unwrap())
            .unwrap()
            .unwrap();
        assert!(header.completed_at.is_some());
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(350),
            jitter: 0.0,
        };
        assert_eq!(policy.delay_for(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for(2), Duration::from_millis(350));
        assert_eq!(policy.delay_for(3), Duration::from_millis(350));
    }
}
