//! Command executor for dispatching CLI commands

use super::handlers::{MigrateCommandHandler, ServeCommandHandler};
use super::parser::{Cli, Commands};
use crate::config::Settings;

const LARGE_ROLLBACK: u32 = 50;

/// Execute a CLI command with the given settings
///
/// A missing subcommand runs `serve`.
///
/// # Errors
/// Returns argument validation errors and errors from command handlers
pub async fn execute_command(cli: &Cli, settings: Settings) -> anyhow::Result<()> {
    validate_command_args(cli)?;

    match cli.resolved_command() {
        Commands::Serve { dry_run, .. } => {
            ServeCommandHandler::new(settings).execute(dry_run).await
        }
        Commands::Migrate { dry_run, rollback } => {
            MigrateCommandHandler::new(settings)
                .execute(dry_run, rollback)
                .await
        }
    }
}

fn validate_command_args(cli: &Cli) -> anyhow::Result<()> {
    cli.validate().map_err(anyhow::Error::msg)?;

    if let Some(Commands::Migrate {
        rollback: Some(steps),
        ..
    }) = &cli.command
        && *steps > LARGE_ROLLBACK
    {
        eprintln!(
            "Warning: Rolling back {} migrations is a large operation. Consider using smaller steps.",
            steps
        );
    }

    Ok(())
}
