//! Command handlers for CLI operations
//!
//! Execution logic for each subcommand, kept apart from parsing.

pub mod migrate;
pub mod serve;

pub use migrate::MigrateCommandHandler;
pub use serve::ServeCommandHandler;
