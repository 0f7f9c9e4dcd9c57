//! Streak statistics commands.

use chrono::Local;
use clap::Subcommand;
use liftlog_core::{Database, StreakCalculator, WorkoutStore};

type CliError = Box<dyn std::error::Error>;

#[derive(Subcommand)]
pub enum StatsAction {
    /// Current and longest completion streaks
    Streak {
        #[arg(long)]
        json: bool,
    },
    /// 30-day activity calendar
    Calendar,
}

pub fn run(action: StatsAction) -> Result<(), CliError> {
    let db = Database::open()?;
    let dates = db.completed_workout_dates()?;
    let today = Local::now().date_naive();
    let summary = StreakCalculator::new().summarize(&dates, today);

    match action {
        StatsAction::Streak { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!("Current streak: {} day(s)", summary.current_streak);
                println!("Longest streak (30d): {} day(s)", summary.longest_streak);
            }
        }
        StatsAction::Calendar => {
            for day in &summary.calendar {
                let bar = "#".repeat(day.workouts as usize);
                println!("{}  {:>2}  {bar}", day.date, day.workouts);
            }
        }
    }
    Ok(())
}
