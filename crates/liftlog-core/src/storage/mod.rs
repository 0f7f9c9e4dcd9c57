pub mod config;
pub mod database;
pub mod gateway;
pub mod store;

pub use config::Config;
pub use database::Database;
pub use gateway::{PersistenceGateway, RetryPolicy, SaveOutcome};
pub use store::{SetTarget, StoredExercise, WorkoutHeader, WorkoutStore};

use std::path::PathBuf;

/// Returns `~/.config/liftlog[-dev]/` based on LIFTLOG_ENV.
///
/// Set LIFTLOG_ENV=dev to use development data directory.
///
/// # Errors
/// Returns an error if the home directory cannot be determined or if
/// creating the config directory fails.
pub fn data_dir() -> Result<PathBuf, Box<dyn std::error::Error>> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("LIFTLOG_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("liftlog-dev")
    } else {
        base_dir.join("liftlog")
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
