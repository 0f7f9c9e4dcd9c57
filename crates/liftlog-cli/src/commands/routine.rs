//! Routine management commands (collaborator surface: plain CRUD, no
//! session state involved).

use clap::Subcommand;
use liftlog_core::{Database, WorkoutStore};

type CliError = Box<dyn std::error::Error>;

#[derive(Subcommand)]
pub enum RoutineAction {
    /// Create a new routine
    Create {
        /// Routine name
        name: String,
    },
    /// Add an exercise to a routine
    AddExercise {
        /// Routine id
        routine_id: i64,
        /// Exercise name
        name: String,
        /// Target sets
        #[arg(long, default_value_t = 3)]
        sets: u32,
        /// Primary muscle group
        #[arg(long, default_value = "")]
        muscle: String,
        /// Equipment category
        #[arg(long, default_value = "")]
        category: String,
    },
    /// List routines
    List {
        #[arg(long)]
        json: bool,
    },
    /// Show a routine's exercise templates
    Show {
        /// Routine id
        routine_id: i64,
    },
}

pub fn run(action: RoutineAction) -> Result<(), CliError> {
    let db = Database::open()?;
    match action {
        RoutineAction::Create { name } => {
            let id = db.create_routine(&name)?;
            println!("Routine created: {id} ({name})");
        }
        RoutineAction::AddExercise {
            routine_id,
            name,
            sets,
            muscle,
            category,
        } => {
            let order = db.routine_templates(routine_id)?.len() as u32;
            let exercise_id = db.define_exercise(&name, &muscle, &category)?;
            db.add_routine_exercise(routine_id, exercise_id, order, sets)?;
            println!("Added {name} ({sets} sets) to routine {routine_id}");
        }
        RoutineAction::List { json } => {
            let routines = db.list_routines()?;
            if json {
                let rows: Vec<serde_json::Value> = routines
                    .iter()
                    .map(|(id, name)| serde_json::json!({ "id": id, "name": name }))
                    .collect();
                println!("{}", serde_json::to_string_pretty(&rows)?);
            } else {
                for (id, name) in routines {
                    println!("{id}\t{name}");
                }
            }
        }
        RoutineAction::Show { routine_id } => {
            let name = db
                .routine_name(routine_id)?
                .ok_or("routine not found")?;
            println!("{name}");
            for template in db.routine_templates(routine_id)? {
                println!(
                    "  {}. {} -- {} sets [{}]",
                    template.order_index + 1,
                    template.name,
                    template.target_sets,
                    template.primary_muscle
                );
            }
        }
    }
    Ok(())
}
