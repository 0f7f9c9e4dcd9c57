//! Workout session commands.
//!
//! Each invocation is its own process: the session is resumed from the
//! durable store, the operation applied, and the result saved urgently
//! before exit. The durable active-workout marker carries the
//! single-active-workout invariant across invocations.

use std::sync::Arc;

use chrono::Utc;
use clap::Subcommand;
use liftlog_core::{
    Config, Database, NoopScheduler, SessionController, SessionError, SetEntry, TrainingType,
    WorkoutStore,
};

type CliError = Box<dyn std::error::Error>;

#[derive(Subcommand)]
pub enum WorkoutAction {
    /// Start a workout from a routine
    Start {
        /// Routine id
        routine_id: i64,
    },
    /// Show the in-progress workout
    Status {
        #[arg(long)]
        json: bool,
    },
    /// Log one set
    Log {
        /// Exercise id
        #[arg(long)]
        exercise: i64,
        /// Set number
        #[arg(long)]
        set: u32,
        #[arg(long)]
        reps: u32,
        #[arg(long)]
        weight: f64,
        /// Rest duration in seconds for this set
        #[arg(long)]
        rest: Option<u32>,
        /// Training intensity: heavy, moderate, light
        #[arg(long)]
        intensity: Option<String>,
        #[arg(long)]
        notes: Option<String>,
        /// Record the values without marking the set completed
        #[arg(long)]
        incomplete: bool,
    },
    /// Append a set to an exercise
    AddSet {
        #[arg(long)]
        exercise: i64,
    },
    /// Remove the highest-numbered set of an exercise
    RemoveSet {
        #[arg(long)]
        exercise: i64,
    },
    /// Attach notes to an exercise or the whole workout
    Note {
        #[arg(long)]
        exercise: Option<i64>,
        text: String,
    },
    /// Finish the workout (terminal save, awaited)
    Finish,
    /// Cancel the workout
    Cancel {
        /// Also delete the durable row instead of leaving an incomplete
        /// workout behind
        #[arg(long)]
        delete: bool,
    },
}

fn parse_intensity(value: &str) -> Result<TrainingType, CliError> {
    match value {
        "heavy" => Ok(TrainingType::Heavy),
        "moderate" => Ok(TrainingType::Moderate),
        "light" => Ok(TrainingType::Light),
        other => Err(format!("unknown intensity '{other}'").into()),
    }
}

fn new_controller(store: Arc<Database>, config: &Config) -> SessionController<Database> {
    SessionController::new(
        store,
        Arc::new(NoopScheduler),
        config.notifications.enabled,
    )
}

/// Resume the active workout into a fresh controller.
async fn resume_active(
    store: Arc<Database>,
    config: &Config,
) -> Result<SessionController<Database>, CliError> {
    let workout_id = store
        .active_workout_id()?
        .ok_or("no workout in progress (start one with `workout start`)")?;
    let controller = new_controller(store, config);
    controller.resume(workout_id).await?;
    Ok(controller)
}

pub async fn run(action: WorkoutAction) -> Result<(), CliError> {
    let store = Arc::new(Database::open()?);
    let config = Config::load()?;

    match action {
        WorkoutAction::Start { routine_id } => {
            let controller = new_controller(Arc::clone(&store), &config);
            match controller.start(routine_id, Utc::now()).await {
                Ok(_) => {}
                Err(SessionError::AlreadyActive {
                    workout_id,
                    routine_name,
                }) => {
                    return Err(format!(
                        "'{routine_name}' is already in progress (workout {}); finish or cancel it first",
                        workout_id.map_or("unsaved".to_string(), |id| id.to_string())
                    )
                    .into());
                }
                Err(e) => return Err(e.into()),
            }
            controller.save_now(true).await;
            let snapshot = controller.snapshot().await.ok_or("session vanished")?;
            println!(
                "Started '{}' (workout {})",
                snapshot.routine_name,
                snapshot
                    .workout_id
                    .map_or("unsaved".to_string(), |id| id.to_string())
            );
            for exercise in &snapshot.exercises {
                println!(
                    "  [{}] {} -- {} sets",
                    exercise.exercise_id, exercise.name, exercise.target_sets
                );
            }
        }
        WorkoutAction::Status { json } => {
            let controller = resume_active(Arc::clone(&store), &config).await?;
            let snapshot = controller.snapshot().await.ok_or("session vanished")?;
            if json {
                println!("{}", serde_json::to_string_pretty(&snapshot)?);
                return Ok(());
            }
            let elapsed = snapshot.elapsed_secs(Utc::now());
            println!(
                "'{}' -- {}m{:02}s elapsed",
                snapshot.routine_name,
                elapsed / 60,
                elapsed % 60
            );
            for exercise in &snapshot.exercises {
                println!(
                    "  [{}] {}: {}/{} sets done",
                    exercise.exercise_id,
                    exercise.name,
                    exercise.completed_set_count(),
                    exercise.sets.len()
                );
                for set in &exercise.sets {
                    let mark = if set.completed { "x" } else { " " };
                    println!(
                        "      [{mark}] set {} -- {} x {:.1}",
                        set.set_number, set.reps, set.weight
                    );
                }
            }
        }
        WorkoutAction::Log {
            exercise,
            set,
            reps,
            weight,
            rest,
            intensity,
            notes,
            incomplete,
        } => {
            let controller = resume_active(Arc::clone(&store), &config).await?;
            let training_type = intensity.as_deref().map(parse_intensity).transpose()?;
            controller
                .log_set(
                    exercise,
                    set,
                    SetEntry {
                        reps,
                        weight,
                        completed: !incomplete,
                        rest_time_secs: rest,
                        training_type,
                        notes,
                    },
                )
                .await?;
            controller.save_now(true).await;
            println!("Logged set {set}: {reps} x {weight}");
        }
        WorkoutAction::AddSet { exercise } => {
            let controller = resume_active(Arc::clone(&store), &config).await?;
            controller.add_set(exercise).await?;
            controller.save_now(true).await;
            println!("Set added");
        }
        WorkoutAction::RemoveSet { exercise } => {
            let controller = resume_active(Arc::clone(&store), &config).await?;
            controller.remove_set(exercise).await?;
            controller.save_now(true).await;
            println!("Set removed");
        }
        WorkoutAction::Note { exercise, text } => {
            let controller = resume_active(Arc::clone(&store), &config).await?;
            match exercise {
                Some(exercise_id) => {
                    controller.update_exercise_notes(exercise_id, text).await?
                }
                None => controller.update_workout_notes(text).await?,
            };
            controller.save_now(true).await;
            println!("Notes updated");
        }
        WorkoutAction::Finish => {
            let controller = resume_active(Arc::clone(&store), &config).await?;
            let event = controller.finish(Utc::now()).await?;
            if let liftlog_core::Event::WorkoutFinished {
                workout_id,
                duration_secs,
                ..
            } = event
            {
                println!(
                    "Finished workout {workout_id} after {}m{:02}s",
                    duration_secs / 60,
                    duration_secs % 60
                );
            }
        }
        WorkoutAction::Cancel { delete } => {
            let controller = resume_active(Arc::clone(&store), &config).await?;
            controller.cancel(delete).await?;
            if delete {
                println!("Workout cancelled and deleted");
            } else {
                println!("Workout cancelled (kept as incomplete)");
            }
        }
    }
    Ok(())
}
