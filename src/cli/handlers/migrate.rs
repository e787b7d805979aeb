//! Migrate command handler
//!
//! Applies, previews or reverts the embedded PostgreSQL migrations.

use crate::config::{ConfigError, Settings, StoreBackend};
use crate::db::{pending_migrations, revert_migrations, run_pending_migrations};

/// Handler for the migrate command
pub struct MigrateCommandHandler {
    config: Settings,
}

impl MigrateCommandHandler {
    pub fn new(config: Settings) -> Self {
        Self { config }
    }

    /// Execute the migrate command with dry-run and rollback support
    ///
    /// # Errors
    /// - The in-memory backend is configured (there is no schema to migrate)
    /// - Database connection or migration errors
    pub async fn execute(&self, dry_run: bool, rollback: Option<u32>) -> anyhow::Result<()> {
        self.check_backend()?;
        let url = &self.config.database.url;

        if dry_run {
            let pending = pending_migrations(url).await?;
            if pending.is_empty() {
                println!("✓ No pending migrations found - database is up to date");
            } else {
                println!("Found {} pending migration(s):", pending.len());
                for name in &pending {
                    println!("  - {}", name);
                }
                println!("\nRun without --dry-run to apply these migrations");
            }
            return Ok(());
        }

        if let Some(steps) = rollback {
            println!("Rolling back {} migration(s)...", steps);
            let reverted = revert_migrations(url, steps).await?;
            if reverted.len() < steps as usize {
                println!(
                    "Only {} applied migration(s) were available to revert",
                    reverted.len()
                );
            }
            println!("✓ Rolled back {} migration(s):", reverted.len());
            for name in &reverted {
                println!("  - {}", name);
            }
            return Ok(());
        }

        println!("Running database migrations...");
        let applied = run_pending_migrations(url).await?;
        if applied.is_empty() {
            println!("✓ No migrations to apply - database is already up to date");
        } else {
            println!("✓ Applied {} migration(s):", applied.len());
            for name in &applied {
                println!("  - {}", name);
            }
        }

        Ok(())
    }

    fn check_backend(&self) -> Result<(), ConfigError> {
        if self.config.database.backend == StoreBackend::Memory {
            return Err(ConfigError::validation(
                "database.backend",
                "Migrations require the postgres backend; the memory store has no schema",
            ));
        }

        self.config.database.validate_url()
    }

    pub fn config(&self) -> &Settings {
        &self.config
    }
}
