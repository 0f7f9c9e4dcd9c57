//! # Liftlog Core Library
//!
//! This library provides the workout session engine for Liftlog, a
//! local-first fitness tracker. It implements a CLI-first philosophy where
//! all operations are available via a standalone CLI binary, with any GUI
//! being a thin layer over the same core library.
//!
//! ## Architecture
//!
//! - **Session Controller**: single owner of the in-progress workout;
//!   exposes the full UI boundary and hands out read-only snapshots
//! - **Persistence Gateway**: the only writer of workout progress, with
//!   bounded retry, exponential backoff, and save coalescing
//! - **Resume Reconciler**: rebuilds a session from durable partial
//!   progress and re-syncs in-memory state after external changes
//! - **Rest Timer**: a wall-clock-anchored countdown that stays correct
//!   across process suspension
//! - **Storage**: SQLite-based workout storage and TOML-based
//!   configuration
//!
//! ## Key Components
//!
//! - [`SessionController`]: workout session state machine
//! - [`Database`]: durable store over SQLite
//! - [`RestTimer`]: suspension-proof rest countdown
//! - [`StreakCalculator`]: completion streak statistics
//! - [`Config`]: application configuration management

pub mod error;
pub mod events;
pub mod notify;
pub mod session;
pub mod stats;
pub mod storage;
pub mod timer;
pub mod workout;

pub use error::{ConfigError, CoreError, DatabaseError, SessionError};
pub use events::Event;
pub use notify::{NoopScheduler, NotificationScheduler};
pub use session::{
    PreviousPerformanceIndex, PreviousPerformanceLookup, ReconcileSummary, ResumeReconciler,
    ResumedSession, SessionController, SetEntry,
};
pub use stats::{DayActivity, StreakCalculator, StreakSummary};
pub use storage::{Config, Database, PersistenceGateway, RetryPolicy, SaveOutcome, WorkoutStore};
pub use timer::{RestSignal, RestTimer};
pub use workout::{
    RoutineExerciseTemplate, SessionMode, Set, TrainingType, WorkoutExercise, WorkoutSessionState,
};
