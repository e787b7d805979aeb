//! Serve command handler
//!
//! Starts the server, or validates the configuration on `--dry-run`.

use crate::config::{ConfigError, Settings, StoreBackend};
use crate::server::Server;

/// Handler for the serve command
pub struct ServeCommandHandler {
    config: Settings,
}

impl ServeCommandHandler {
    pub fn new(config: Settings) -> Self {
        Self { config }
    }

    /// Runs the server until a shutdown signal, or only validates with `dry_run`.
    ///
    /// # Errors
    /// - Configuration validation errors, including a missing or short JWT secret
    /// - Server startup errors (if not dry-run)
    pub async fn execute(&self, dry_run: bool) -> anyhow::Result<()> {
        if dry_run {
            self.validate_only()?;
            return Ok(());
        }

        Server::new(self.config.clone()).run().await
    }

    /// Validate configuration without starting the server
    pub fn validate_only(&self) -> Result<(), ConfigError> {
        self.config.validate()?;
        self.config.jwt.validate()?;

        println!("✓ Configuration is valid");
        println!("✓ Server would bind to: {}", self.config.server.address());
        match self.config.database.backend {
            StoreBackend::Postgres => println!(
                "✓ PostgreSQL store (pool {}-{} connections, auto-migrate: {})",
                self.config.database.min_connections,
                self.config.database.max_connections,
                self.config.database.auto_migrate
            ),
            StoreBackend::Memory => println!("✓ In-memory store"),
        }
        println!(
            "✓ Stream buffer: {} notifications per subscriber, keep-alive every {}s",
            self.config.stream.subscriber_buffer, self.config.stream.keep_alive_interval
        );
        println!("Dry run completed successfully - configuration is ready for deployment");
        Ok(())
    }

    pub fn config(&self) -> &Settings {
        &self.config
    }
}
