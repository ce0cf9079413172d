//! kafkasub - Kafka subscription trigger host
//!
#![doc = "Main entry point for the kafkasub binary."]

use anyhow::Result;

use kafkasub::cli::{Cli, Commands};
use kafkasub::commands;
use kafkasub::logging::init_logging;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    // Initialize tracing
    let logging = cli.logging_config();
    init_logging(&logging)?;

    // Execute command
    match cli.command {
        Commands::Check { config } => {
            tracing::info!("Checking trigger configuration");
            commands::check::check_config(&config)?;
            Ok(())
        }
        Commands::Run { config, duration } => {
            tracing::info!("Starting trigger");
            if let Some(secs) = duration {
                tracing::debug!("Stopping after {} seconds", secs);
            }
            commands::run::run_trigger(&config, duration, &logging).await?;
            Ok(())
        }
    }
}
