//! Workout session controller.
//!
//! Owns the single authoritative in-memory session and exposes every
//! operation the UI boundary needs: start, resume, reconcile, log-set,
//! add/remove-set, notes, minimize/restore, finish, cancel, plus the rest
//! timer. UI layers subscribe to read-only snapshots; they never hold
//! mutable copies.
//!
//! ## State transitions
//!
//! ```text
//! NotStarted -> Active <-> Minimized -> Completed (slot cleared)
//!                      \-> Cancelled (slot cleared)
//! ```
//!
//! ## Persistence model
//!
//! Mutations schedule a coalesced background save: at most one save is in
//! flight; a request arriving meanwhile sets a dirty flag and the in-flight
//! saver re-runs with the latest snapshot. Saves never hold the session
//! lock while talking to the store; store-assigned ids are merged back
//! afterwards. Only `finish` awaits its save.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::SessionError;
use crate::events::Event;
use crate::notify::NotificationScheduler;
use crate::session::previous::PreviousPerformanceIndex;
use crate::session::reconcile::{merge_stored, ResumeReconciler};
use crate::storage::gateway::{PersistenceGateway, SaveOutcome};
use crate::storage::store::WorkoutStore;
use crate::timer::{RestSignal, RestTimer};
use crate::workout::{SessionMode, Set, TrainingType, WorkoutSessionState};

/// Payload for logging one set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SetEntry {
    pub reps: u32,
    pub weight: f64,
    pub completed: bool,
    /// `None` leaves the stored value untouched.
    pub rest_time_secs: Option<u32>,
    pub training_type: Option<TrainingType>,
    pub notes: Option<String>,
}

/// Single-owner session state machine over a durable store.
pub struct SessionController<S: WorkoutStore + Send + Sync + 'static> {
    store: Arc<S>,
    gateway: Arc<PersistenceGateway<S>>,
    slot: Arc<Mutex<Option<WorkoutSessionState>>>,
    rest: Arc<Mutex<Option<RestTimer>>>,
    save_lock: Arc<Mutex<()>>,
    save_pending: Arc<AtomicBool>,
    /// Bumped whenever the slot is installed or cleared; in-flight saves
    /// and resumes check it before applying results to a replaced session.
    generation: Arc<AtomicU64>,
    notifier: Arc<dyn NotificationScheduler>,
    notifications_enabled: bool,
}

impl<S: WorkoutStore + Send + Sync + 'static> Clone for SessionController<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            gateway: Arc::clone(&self.gateway),
            slot: Arc::clone(&self.slot),
            rest: Arc::clone(&self.rest),
            save_lock: Arc::clone(&self.save_lock),
            save_pending: Arc::clone(&self.save_pending),
            generation: Arc::clone(&self.generation),
            notifier: Arc::clone(&self.notifier),
            notifications_enabled: self.notifications_enabled,
        }
    }
}

impl<S: WorkoutStore + Send + Sync + 'static> SessionController<S> {
    pub fn new(
        store: Arc<S>,
        notifier: Arc<dyn NotificationScheduler>,
        notifications_enabled: bool,
    ) -> Self {
        let gateway = Arc::new(PersistenceGateway::new(Arc::clone(&store)));
        Self::with_gateway(store, gateway, notifier, notifications_enabled)
    }

    /// Construct with an explicit gateway (tests inject zero-delay retry
    /// policies this way).
    pub fn with_gateway(
        store: Arc<S>,
        gateway: Arc<PersistenceGateway<S>>,
        notifier: Arc<dyn NotificationScheduler>,
        notifications_enabled: bool,
    ) -> Self {
        Self {
            store,
            gateway,
            slot: Arc::new(Mutex::new(None)),
            rest: Arc::new(Mutex::new(None)),
            save_lock: Arc::new(Mutex::new(())),
            save_pending: Arc::new(AtomicBool::new(false)),
            generation: Arc::new(AtomicU64::new(0)),
            notifier,
            notifications_enabled,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    /// Read-only snapshot of the session in progress, if any.
    pub async fn snapshot(&self) -> Option<WorkoutSessionState> {
        self.slot.lock().await.clone()
    }

    pub async fn is_active(&self) -> bool {
        self.slot.lock().await.is_some()
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Start a fresh workout from a routine.
    ///
    /// Rejected when the routine has no templates or when another workout
    /// is already in progress (in memory or via the durable marker); the
    /// error carries the existing workout's identity so the caller can
    /// redirect instead of overwriting it.
    pub async fn start(
        &self,
        routine_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Event, SessionError> {
        let mut slot = self.slot.lock().await;
        if let Some(session) = slot.as_ref() {
            return Err(SessionError::AlreadyActive {
                workout_id: session.workout_id,
                routine_name: session.routine_name.clone(),
            });
        }
        if let Some(existing_id) = self.store.active_workout_id()? {
            match self.store.workout_header(existing_id)? {
                Some(header) if header.completed_at.is_none() => {
                    return Err(SessionError::AlreadyActive {
                        workout_id: Some(existing_id),
                        routine_name: header.name,
                    });
                }
                // Marker points at a deleted or already-finished workout.
                _ => self.store.clear_active_workout()?,
            }
        }

        let templates = self.store.routine_templates(routine_id)?;
        if templates.is_empty() {
            return Err(SessionError::NoExercises { routine_id });
        }
        let routine_name = self
            .store
            .routine_name(routine_id)?
            .unwrap_or_else(|| format!("Routine {routine_id}"));

        let session =
            WorkoutSessionState::from_templates(routine_id, routine_name.clone(), &templates, now);
        let exercise_count = session.exercises.len();
        *slot = Some(session);
        self.generation.fetch_add(1, Ordering::SeqCst);
        drop(slot);

        // First save creates the durable workout row and captures its id.
        self.schedule_save();
        debug!(routine_id, exercise_count, "workout started");
        Ok(Event::WorkoutStarted {
            routine_id,
            routine_name,
            exercise_count,
            at: now,
        })
    }

    /// Rebuild the session for a previously-started workout from durable
    /// state.
    ///
    /// The store reads run without holding the session lock; if the slot
    /// was filled or replaced meanwhile the loaded result is discarded.
    pub async fn resume(
        &self,
        workout_id: i64,
    ) -> Result<(Event, PreviousPerformanceIndex), SessionError> {
        {
            let slot = self.slot.lock().await;
            if let Some(session) = slot.as_ref() {
                return Err(SessionError::AlreadyActive {
                    workout_id: session.workout_id,
                    routine_name: session.routine_name.clone(),
                });
            }
        }
        let token = self.generation.load(Ordering::SeqCst);
        let resumed = ResumeReconciler::new(self.store.as_ref()).resume(workout_id)?;

        let mut slot = self.slot.lock().await;
        if self.generation.load(Ordering::SeqCst) != token || slot.is_some() {
            return Err(SessionError::ResumeSuperseded);
        }
        self.store.set_active_workout(workout_id)?;
        let routine_name = resumed.session.routine_name.clone();
        let exercise_count = resumed.session.exercises.len();
        *slot = Some(resumed.session);
        self.generation.fetch_add(1, Ordering::SeqCst);
        debug!(workout_id, exercise_count, "workout resumed");
        Ok((
            Event::WorkoutResumed {
                workout_id,
                routine_name,
                exercise_count,
                at: Utc::now(),
            },
            resumed.previous,
        ))
    }

    /// Re-sync the in-memory session against the store after a suspected
    /// external change (e.g. returning from background).
    pub async fn reconcile(&self) -> Result<Event, SessionError> {
        let (workout_id, token) = {
            let slot = self.slot.lock().await;
            let session = slot.as_ref().ok_or(SessionError::NotActive)?;
            (session.workout_id, self.generation.load(Ordering::SeqCst))
        };
        let Some(workout_id) = workout_id else {
            // Nothing durable exists yet; memory is trivially authoritative.
            return Ok(Event::Reconciled {
                fields_updated: 0,
                sets_adopted: 0,
                at: Utc::now(),
            });
        };

        let stored = self.store.workout_exercises(workout_id)?;

        let mut slot = self.slot.lock().await;
        if self.generation.load(Ordering::SeqCst) != token {
            return Err(SessionError::ResumeSuperseded);
        }
        let session = slot.as_mut().ok_or(SessionError::NotActive)?;
        let summary = merge_stored(session, &stored);
        debug!(
            workout_id,
            fields_updated = summary.fields_updated,
            sets_adopted = summary.sets_adopted,
            "session reconciled"
        );
        Ok(Event::Reconciled {
            fields_updated: summary.fields_updated,
            sets_adopted: summary.sets_adopted,
            at: Utc::now(),
        })
    }

    /// Finish the workout: stamp `completed_at`, run the terminal save with
    /// the urgent policy, and clear the session on success.
    ///
    /// Unlike every other save this one is awaited; its failure is
    /// surfaced because it risks losing the session.
    pub async fn finish(&self, now: DateTime<Utc>) -> Result<Event, SessionError> {
        // Serialize with any in-flight background save and claim its
        // pending work; the terminal save writes the latest state anyway.
        let _save_guard = self.save_lock.lock().await;
        self.save_pending.store(false, Ordering::SeqCst);

        let token = self.generation.load(Ordering::SeqCst);
        let mut snapshot = {
            let slot = self.slot.lock().await;
            slot.as_ref().cloned().ok_or(SessionError::NotActive)?
        };

        match self.gateway.finish(&mut snapshot, now).await {
            SaveOutcome::Saved => {
                let workout_id = snapshot.workout_id.unwrap_or_default();
                let duration_secs = snapshot.elapsed_secs(now);
                {
                    let mut slot = self.slot.lock().await;
                    if self.generation.load(Ordering::SeqCst) == token {
                        *slot = None;
                        self.generation.fetch_add(1, Ordering::SeqCst);
                    }
                }
                if let Err(e) = self.store.clear_active_workout() {
                    warn!(error = %e, "failed to clear active-workout marker");
                }
                debug!(workout_id, duration_secs, "workout finished");
                Ok(Event::WorkoutFinished {
                    workout_id,
                    duration_secs,
                    at: now,
                })
            }
            SaveOutcome::Exhausted { attempts } => {
                // Keep the session authoritative so the caller can retry;
                // adopt whatever ids were captured before the failure.
                let mut slot = self.slot.lock().await;
                if self.generation.load(Ordering::SeqCst) == token {
                    if let Some(live) = slot.as_mut() {
                        live.adopt_ids(&snapshot);
                    }
                }
                Err(SessionError::PersistenceExhausted { attempts })
            }
        }
    }

    /// Discard the in-memory session. When `delete_durable` is set and a
    /// durable row exists it is removed; otherwise the row stays behind as
    /// an incomplete workout (caller's policy, not the engine's).
    pub async fn cancel(&self, delete_durable: bool) -> Result<Event, SessionError> {
        let session = {
            let mut slot = self.slot.lock().await;
            let session = slot.take().ok_or(SessionError::NotActive)?;
            self.generation.fetch_add(1, Ordering::SeqCst);
            session
        };
        if let Err(e) = self.store.clear_active_workout() {
            warn!(error = %e, "failed to clear active-workout marker");
        }
        let mut deleted_durable = false;
        if delete_durable {
            if let Some(workout_id) = session.workout_id {
                match self.store.delete_workout(workout_id) {
                    Ok(()) => deleted_durable = true,
                    Err(e) => warn!(workout_id, error = %e, "failed to delete cancelled workout"),
                }
            }
        }
        debug!(workout_id = ?session.workout_id, deleted_durable, "workout cancelled");
        Ok(Event::WorkoutCancelled {
            workout_id: session.workout_id,
            deleted_durable,
            at: Utc::now(),
        })
    }

    // ── Mutations ────────────────────────────────────────────────────

    /// Log one set. Schedules a background save; never blocks on it.
    pub async fn log_set(
        &self,
        exercise_id: i64,
        set_number: u32,
        entry: SetEntry,
    ) -> Result<Event, SessionError> {
        let event = {
            let mut slot = self.slot.lock().await;
            let session = slot.as_mut().ok_or(SessionError::NotActive)?;
            let exercise = session
                .exercise_mut(exercise_id)
                .ok_or(SessionError::UnknownExercise { exercise_id })?;
            let set = exercise
                .set_mut(set_number)
                .ok_or(SessionError::UnknownSet {
                    exercise_id,
                    set_number,
                })?;
            set.reps = entry.reps;
            set.weight = entry.weight;
            set.completed = entry.completed;
            if let Some(rest) = entry.rest_time_secs {
                set.rest_time_secs = rest;
            }
            if entry.training_type.is_some() {
                set.training_type = entry.training_type;
            }
            if let Some(notes) = entry.notes {
                set.notes = notes;
            }
            Event::SetLogged {
                exercise_id,
                set_number,
                reps: set.reps,
                weight: set.weight,
                completed: set.completed,
                at: Utc::now(),
            }
        };
        self.schedule_save();
        Ok(event)
    }

    /// Append a set with the next-highest number. Sets are never
    /// renumbered.
    pub async fn add_set(&self, exercise_id: i64) -> Result<Event, SessionError> {
        let event = {
            let mut slot = self.slot.lock().await;
            let session = slot.as_mut().ok_or(SessionError::NotActive)?;
            let exercise = session
                .exercise_mut(exercise_id)
                .ok_or(SessionError::UnknownExercise { exercise_id })?;
            let set_number = exercise.next_set_number();
            exercise.sets.push(Set::empty(set_number));
            Event::SetAdded {
                exercise_id,
                set_number,
                at: Utc::now(),
            }
        };
        self.schedule_save();
        Ok(event)
    }

    /// Remove the highest-numbered set. Disallowed when only one set
    /// remains.
    pub async fn remove_set(&self, exercise_id: i64) -> Result<Event, SessionError> {
        let (event, removed_id) = {
            let mut slot = self.slot.lock().await;
            let session = slot.as_mut().ok_or(SessionError::NotActive)?;
            let exercise = session
                .exercise_mut(exercise_id)
                .ok_or(SessionError::UnknownExercise { exercise_id })?;
            if exercise.sets.len() <= 1 {
                return Err(SessionError::LastSet { exercise_id });
            }
            let highest = exercise
                .sets
                .iter()
                .map(|s| s.set_number)
                .max()
                .unwrap_or(0);
            let index = exercise
                .sets
                .iter()
                .position(|s| s.set_number == highest)
                .ok_or(SessionError::UnknownSet {
                    exercise_id,
                    set_number: highest,
                })?;
            let removed = exercise.sets.remove(index);
            (
                Event::SetRemoved {
                    exercise_id,
                    set_number: highest,
                    at: Utc::now(),
                },
                removed.id,
            )
        };
        // An already-persisted set must not resurrect on the next
        // reconcile. Deletion failure is soft; reconcile would re-adopt it.
        if let Some(set_id) = removed_id {
            if let Err(e) = self.store.delete_set(set_id) {
                warn!(set_id, error = %e, "failed to delete removed set row");
            }
        }
        self.schedule_save();
        Ok(event)
    }

    pub async fn update_exercise_notes(
        &self,
        exercise_id: i64,
        notes: impl Into<String>,
    ) -> Result<Event, SessionError> {
        {
            let mut slot = self.slot.lock().await;
            let session = slot.as_mut().ok_or(SessionError::NotActive)?;
            let exercise = session
                .exercise_mut(exercise_id)
                .ok_or(SessionError::UnknownExercise { exercise_id })?;
            exercise.notes = notes.into();
        }
        self.schedule_save();
        Ok(Event::NotesUpdated {
            exercise_id: Some(exercise_id),
            at: Utc::now(),
        })
    }

    pub async fn update_workout_notes(
        &self,
        notes: impl Into<String>,
    ) -> Result<Event, SessionError> {
        {
            let mut slot = self.slot.lock().await;
            let session = slot.as_mut().ok_or(SessionError::NotActive)?;
            session.notes = notes.into();
        }
        self.schedule_save();
        Ok(Event::NotesUpdated {
            exercise_id: None,
            at: Utc::now(),
        })
    }

    /// Pure visibility toggle; timers keep running and saves keep flowing.
    pub async fn minimize(&self) -> Result<Event, SessionError> {
        self.set_mode(SessionMode::Minimized).await
    }

    pub async fn restore(&self) -> Result<Event, SessionError> {
        self.set_mode(SessionMode::Active).await
    }

    async fn set_mode(&self, mode: SessionMode) -> Result<Event, SessionError> {
        let mut slot = self.slot.lock().await;
        let session = slot.as_mut().ok_or(SessionError::NotActive)?;
        session.mode = mode;
        Ok(Event::ModeChanged {
            mode,
            at: Utc::now(),
        })
    }

    // ── Persistence ──────────────────────────────────────────────────

    /// Fire-and-forget coalesced save.
    fn schedule_save(&self) {
        let this = self.clone();
        tokio::spawn(async move {
            this.coalesced_save(false, false).await;
        });
    }

    /// Awaited save; callers that are about to exit the process use this.
    pub async fn save_now(&self, urgent: bool) -> SaveOutcome {
        self.coalesced_save(urgent, true)
            .await
            .unwrap_or(SaveOutcome::Saved)
    }

    /// At most one save runs at a time. Requests arriving while one is in
    /// flight set the pending flag; the in-flight saver drains it with the
    /// latest snapshot, so writers never interleave on the same rows.
    async fn coalesced_save(&self, urgent: bool, wait: bool) -> Option<SaveOutcome> {
        self.save_pending.store(true, Ordering::SeqCst);
        let _guard = if wait {
            self.save_lock.lock().await
        } else {
            match self.save_lock.try_lock() {
                Ok(guard) => guard,
                // A save is already in flight; it will pick up the flag.
                Err(_) => return None,
            }
        };

        let mut outcome = None;
        while self.save_pending.swap(false, Ordering::SeqCst) {
            let token = self.generation.load(Ordering::SeqCst);
            let snapshot = { self.slot.lock().await.clone() };
            let Some(mut snapshot) = snapshot else { break };
            let result = self.gateway.save(&mut snapshot, urgent).await;
            {
                let mut slot = self.slot.lock().await;
                if self.generation.load(Ordering::SeqCst) == token {
                    if let Some(live) = slot.as_mut() {
                        live.adopt_ids(&snapshot);
                    }
                }
            }
            outcome = Some(result);
        }
        outcome
    }

    // ── Rest timer ───────────────────────────────────────────────────

    /// Start (or restart) the rest countdown and schedule its completion
    /// notification when the preference allows it.
    pub async fn start_rest(&self, duration_secs: u32, now: DateTime<Utc>) -> RestTimer {
        let mut rest = self.rest.lock().await;
        if let Some(old) = rest.as_ref() {
            if !old.is_done() {
                self.notifier.cancel(old.id());
            }
        }
        let timer = RestTimer::start(duration_secs, now);
        if self.notifications_enabled {
            self.notifier.schedule(timer.id(), timer.end_time());
        }
        *rest = Some(timer.clone());
        timer
    }

    /// Drive the countdown. The completion signal ends the timer.
    pub async fn tick_rest(&self, now: DateTime<Utc>) -> Vec<RestSignal> {
        let mut rest = self.rest.lock().await;
        let Some(timer) = rest.as_mut() else {
            return Vec::new();
        };
        let signals = timer.tick(now);
        if signals.contains(&RestSignal::Completed) {
            *rest = None;
        }
        signals
    }

    /// Extend the countdown; the completion notification is re-scheduled
    /// at the new end time. Returns the new remaining seconds.
    pub async fn add_rest_time(&self, secs: u32, now: DateTime<Utc>) -> Option<u32> {
        let mut rest = self.rest.lock().await;
        let timer = rest.as_mut()?;
        timer.add_time(secs, now);
        if self.notifications_enabled {
            self.notifier.cancel(timer.id());
            self.notifier.schedule(timer.id(), timer.end_time());
        }
        Some(timer.remaining_secs(now))
    }

    /// End the countdown early. Returns true when this call delivered the
    /// completion (exactly once per timer).
    pub async fn skip_rest(&self) -> bool {
        let mut rest = self.rest.lock().await;
        let Some(timer) = rest.as_mut() else {
            return false;
        };
        let completed = timer.skip();
        if completed {
            self.notifier.cancel(timer.id());
            *rest = None;
        }
        completed
    }

    pub async fn rest_snapshot(&self) -> Option<RestTimer> {
        self.rest.lock().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::test_support::RecordingScheduler;
    use crate::notify::NoopScheduler;
    use crate::storage::gateway::RetryPolicy;
    use crate::storage::Database;

    fn controller(db: Database) -> SessionController<Database> {
        let store = Arc::new(db);
        let gateway = Arc::new(PersistenceGateway::with_policies(
            Arc::clone(&store),
            RetryPolicy::immediate(3),
            RetryPolicy::immediate(5),
        ));
        SessionController::with_gateway(store, gateway, Arc::new(NoopScheduler), false)
    }

    fn seed_routine(db: &Database) -> (i64, i64, i64) {
        let routine_id = db.create_routine("Push Day").unwrap();
        let bench = db.define_exercise("Bench Press", "chest", "barbell").unwrap();
        let press = db.define_exercise("Overhead Press", "shoulders", "barbell").unwrap();
        db.add_routine_exercise(routine_id, bench, 0, 3).unwrap();
        db.add_routine_exercise(routine_id, press, 1, 2).unwrap();
        (routine_id, bench, press)
    }

    #[tokio::test]
    async fn start_builds_session_from_templates() {
        let db = Database::open_memory().unwrap();
        let (routine_id, bench, _) = seed_routine(&db);
        let controller = controller(db);

        let event = controller.start(routine_id, Utc::now()).await.unwrap();
        assert!(matches!(event, Event::WorkoutStarted { exercise_count: 2, .. }));

        let snapshot = controller.snapshot().await.unwrap();
        assert_eq!(snapshot.exercises.len(), 2);
        assert_eq!(snapshot.exercises[0].exercise_id, bench);
        assert_eq!(snapshot.exercises[0].sets.len(), 3);
        assert_eq!(snapshot.mode, SessionMode::Active);
    }

    #[tokio::test]
    async fn start_rejects_empty_routine() {
        let db = Database::open_memory().unwrap();
        let routine_id = db.create_routine("Empty").unwrap();
        let controller = controller(db);

        let err = controller.start(routine_id, Utc::now()).await.unwrap_err();
        assert!(matches!(err, SessionError::NoExercises { .. }));
        assert!(!controller.is_active().await);
    }

    #[tokio::test]
    async fn second_start_is_rejected_with_existing_identity() {
        let db = Database::open_memory().unwrap();
        let (routine_id, _, _) = seed_routine(&db);
        let controller = controller(db);

        controller.start(routine_id, Utc::now()).await.unwrap();
        controller.save_now(false).await;
        let existing_id = controller.snapshot().await.unwrap().workout_id;

        let err = controller.start(routine_id, Utc::now()).await.unwrap_err();
        match err {
            SessionError::AlreadyActive { workout_id, .. } => {
                assert_eq!(workout_id, existing_id)
            }
            other => panic!("expected AlreadyActive, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn durable_marker_blocks_start_across_restart() {
        let db = Database::open_memory().unwrap();
        let (routine_id, _, _) = seed_routine(&db);
        let store = Arc::new(db);

        // A "previous process" left a workout in progress.
        let first = {
            let gateway = Arc::new(PersistenceGateway::with_policies(
                Arc::clone(&store),
                RetryPolicy::immediate(3),
                RetryPolicy::immediate(5),
            ));
            let controller = SessionController::with_gateway(
                Arc::clone(&store),
                gateway,
                Arc::new(NoopScheduler),
                false,
            );
            controller.start(routine_id, Utc::now()).await.unwrap();
            controller.save_now(false).await;
            controller.snapshot().await.unwrap().workout_id.unwrap()
        };

        // A fresh controller (new process, empty memory) still refuses.
        let gateway = Arc::new(PersistenceGateway::with_policies(
            Arc::clone(&store),
            RetryPolicy::immediate(3),
            RetryPolicy::immediate(5),
        ));
        let fresh = SessionController::with_gateway(
            Arc::clone(&store),
            gateway,
            Arc::new(NoopScheduler),
            false,
        );
        let err = fresh.start(routine_id, Utc::now()).await.unwrap_err();
        match err {
            SessionError::AlreadyActive { workout_id, .. } => {
                assert_eq!(workout_id, Some(first))
            }
            other => panic!("expected AlreadyActive, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn log_save_finish_round_trip() {
        let db = Database::open_memory().unwrap();
        let (routine_id, bench, _) = seed_routine(&db);
        let controller = controller(db);

        controller.start(routine_id, Utc::now()).await.unwrap();
        controller
            .log_set(
                bench,
                1,
                SetEntry {
                    reps: 8,
                    weight: 80.0,
                    completed: true,
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let event = controller.finish(Utc::now()).await.unwrap();
        let Event::WorkoutFinished { workout_id, .. } = event else {
            panic!("expected WorkoutFinished");
        };

        // Session cleared, marker cleared, history persisted.
        assert!(!controller.is_active().await);
        assert_eq!(controller.store.active_workout_id().unwrap(), None);
        let header = controller
            .store
            .workout_header(workout_id)
            .unwrap()
            .unwrap();
        assert!(header.completed_at.is_some());
        let rows = controller.store.workout_exercises(workout_id).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].sets_completed, 1);
    }

    #[tokio::test]
    async fn add_and_remove_sets_keep_numbering_stable() {
        let db = Database::open_memory().unwrap();
        let (routine_id, _, press) = seed_routine(&db);
        let controller = controller(db);
        controller.start(routine_id, Utc::now()).await.unwrap();

        let event = controller.add_set(press).await.unwrap();
        assert!(matches!(event, Event::SetAdded { set_number: 3, .. }));

        let event = controller.remove_set(press).await.unwrap();
        assert!(matches!(event, Event::SetRemoved { set_number: 3, .. }));
        let event = controller.remove_set(press).await.unwrap();
        assert!(matches!(event, Event::SetRemoved { set_number: 2, .. }));

        let err = controller.remove_set(press).await.unwrap_err();
        assert!(matches!(err, SessionError::LastSet { .. }));
    }

    #[tokio::test]
    async fn cancel_can_delete_the_durable_row() {
        let db = Database::open_memory().unwrap();
        let (routine_id, bench, _) = seed_routine(&db);
        let controller = controller(db);

        controller.start(routine_id, Utc::now()).await.unwrap();
        controller
            .log_set(
                bench,
                1,
                SetEntry {
                    reps: 5,
                    weight: 100.0,
                    completed: true,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        controller.save_now(false).await;
        let workout_id = controller.snapshot().await.unwrap().workout_id.unwrap();

        let event = controller.cancel(true).await.unwrap();
        assert!(matches!(
            event,
            Event::WorkoutCancelled {
                deleted_durable: true,
                ..
            }
        ));
        assert!(!controller.is_active().await);
        assert!(controller
            .store
            .workout_header(workout_id)
            .unwrap()
            .is_none());
        assert_eq!(controller.store.active_workout_id().unwrap(), None);
    }

    #[tokio::test]
    async fn cancel_can_keep_the_durable_row() {
        let db = Database::open_memory().unwrap();
        let (routine_id, bench, _) = seed_routine(&db);
        let controller = controller(db);

        controller.start(routine_id, Utc::now()).await.unwrap();
        controller
            .log_set(
                bench,
                1,
                SetEntry {
                    reps: 5,
                    weight: 100.0,
                    completed: true,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        controller.save_now(false).await;
        let workout_id = controller.snapshot().await.unwrap().workout_id.unwrap();

        controller.cancel(false).await.unwrap();
        // Row survives as an incomplete workout.
        let header = controller
            .store
            .workout_header(workout_id)
            .unwrap()
            .unwrap();
        assert!(header.completed_at.is_none());
    }

    #[tokio::test]
    async fn minimize_is_a_pure_visibility_toggle() {
        let db = Database::open_memory().unwrap();
        let (routine_id, _, _) = seed_routine(&db);
        let controller = controller(db);
        let start = Utc::now() - chrono::Duration::seconds(300);
        controller.start(routine_id, start).await.unwrap();

        controller.minimize().await.unwrap();
        let snapshot = controller.snapshot().await.unwrap();
        assert_eq!(snapshot.mode, SessionMode::Minimized);
        // Elapsed time keeps flowing from wall clock.
        assert!(snapshot.elapsed_secs(Utc::now()) >= 300);

        controller.restore().await.unwrap();
        let snapshot = controller.snapshot().await.unwrap();
        assert_eq!(snapshot.mode, SessionMode::Active);
    }

    #[tokio::test]
    async fn removed_persisted_set_does_not_resurrect() {
        let db = Database::open_memory().unwrap();
        let (routine_id, bench, _) = seed_routine(&db);
        let controller = controller(db);

        controller.start(routine_id, Utc::now()).await.unwrap();
        controller.add_set(bench).await.unwrap();
        controller
            .log_set(
                bench,
                4,
                SetEntry {
                    reps: 12,
                    weight: 60.0,
                    completed: true,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        controller.save_now(false).await;

        controller.remove_set(bench).await.unwrap();
        controller.save_now(false).await;
        controller.reconcile().await.unwrap();

        let snapshot = controller.snapshot().await.unwrap();
        let sets = &snapshot.exercise(bench).unwrap().sets;
        assert_eq!(sets.iter().map(|s| s.set_number).max(), Some(3));
    }

    #[tokio::test]
    async fn rest_timer_notifications_follow_the_preference() {
        let db = Database::open_memory().unwrap();
        let store = Arc::new(db);
        let gateway = Arc::new(PersistenceGateway::with_policies(
            Arc::clone(&store),
            RetryPolicy::immediate(3),
            RetryPolicy::immediate(5),
        ));
        let scheduler = Arc::new(RecordingScheduler::default());
        let controller = SessionController::with_gateway(
            store,
            gateway,
            Arc::clone(&scheduler) as Arc<dyn NotificationScheduler>,
            true,
        );

        let now = Utc::now();
        let timer = controller.start_rest(90, now).await;
        {
            let scheduled = scheduler.scheduled.lock().unwrap();
            assert_eq!(scheduled.len(), 1);
            assert_eq!(scheduled[0].0, timer.id());
            assert_eq!(scheduled[0].1, timer.end_time());
        }

        controller.add_rest_time(30, now).await.unwrap();
        {
            let scheduled = scheduler.scheduled.lock().unwrap();
            let cancelled = scheduler.cancelled.lock().unwrap();
            assert_eq!(cancelled.len(), 1);
            assert_eq!(scheduled.len(), 2);
            assert_eq!(scheduled[1].1, timer.end_time() + chrono::Duration::seconds(30));
        }

        assert!(controller.skip_rest().await);
        assert!(!controller.skip_rest().await);
        assert_eq!(scheduler.cancelled.lock().unwrap().len(), 2);
        assert!(controller.rest_snapshot().await.is_none());
    }
}
