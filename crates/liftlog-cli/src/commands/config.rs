//! Configuration management commands.

use clap::Subcommand;
use liftlog_core::Config;

type CliError = Box<dyn std::error::Error>;

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the current configuration
    Show,
    /// Set the default rest duration in seconds
    SetRest { secs: u32 },
    /// Enable or disable rest-completion notifications
    SetNotifications {
        #[arg(value_parser = clap::builder::BoolishValueParser::new())]
        enabled: bool,
    },
}

pub fn run(action: ConfigAction) -> Result<(), CliError> {
    match action {
        ConfigAction::Show => {
            let config = Config::load()?;
            print!("{}", toml::to_string_pretty(&config)?);
        }
        ConfigAction::SetRest { secs } => {
            let mut config = Config::load()?;
            config.rest.default_duration_secs = secs;
            config.save()?;
            println!("Default rest duration set to {secs}s");
        }
        ConfigAction::SetNotifications { enabled } => {
            let mut config = Config::load()?;
            config.notifications.enabled = enabled;
            config.save()?;
            println!(
                "Notifications {}",
                if enabled { "enabled" } else { "disabled" }
            );
        }
    }
    Ok(())
}
