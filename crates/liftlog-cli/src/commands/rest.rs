//! Rest timer command: an in-process countdown driven by wall clock.

use chrono::Utc;
use clap::Subcommand;
use liftlog_core::{Config, RestSignal, RestTimer};

type CliError = Box<dyn std::error::Error>;

#[derive(Subcommand)]
pub enum RestAction {
    /// Run a rest countdown to completion
    Start {
        /// Duration in seconds (defaults to the configured rest duration)
        secs: Option<u32>,
    },
}

pub async fn run(action: RestAction) -> Result<(), CliError> {
    match action {
        RestAction::Start { secs } => {
            let config = Config::load()?;
            let duration = secs.unwrap_or(config.rest.default_duration_secs);
            let mut timer = RestTimer::start(duration, Utc::now());
            println!("Resting {duration}s");

            loop {
                tokio::time::sleep(std::time::Duration::from_millis(500)).await;
                let now = Utc::now();
                for signal in timer.tick(now) {
                    match signal {
                        RestSignal::Threshold { remaining_secs } => {
                            println!("{remaining_secs}s remaining");
                        }
                        RestSignal::Completed => {
                            println!("Rest complete");
                            return Ok(());
                        }
                    }
                }
            }
        }
    }
}
