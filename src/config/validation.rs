//! Checks run on the merged settings before anything starts.
//!
//! Each check reports the first offending key by its dotted TOML path.

use crate::config::error::ConfigError;
use crate::config::settings::{
    DatabaseConfig, FileSettings, JwtConfig, LoggerSettings, ServerConfig, Settings,
    StoreBackend, StreamConfig,
};

/// Minimum HS256 secret length in bytes
const MIN_SECRET_LEN: usize = 32;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

const POSTGRES_SCHEMES: &[&str] = &["postgres://", "postgresql://"];

fn ensure(ok: bool, field: &str, message: impl Into<String>) -> Result<(), ConfigError> {
    if ok {
        Ok(())
    } else {
        Err(ConfigError::validation(field, message))
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure(self.port != 0, "server.port", "Port must be between 1 and 65535")?;
        ensure(
            self.request_timeout > 0,
            "server.request_timeout",
            "Request timeout must be at least 1 second",
        )
    }
}

impl DatabaseConfig {
    /// The URL only matters for the postgres backend; pool bounds are
    /// checked either way.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.backend == StoreBackend::Postgres {
            self.validate_url()?;
        }

        ensure(
            self.max_connections > 0,
            "database.max_connections",
            "Max connections must be at least 1",
        )?;
        ensure(
            self.min_connections <= self.max_connections,
            "database.min_connections",
            format!(
                "Min connections ({}) cannot exceed max connections ({})",
                self.min_connections, self.max_connections
            ),
        )?;
        ensure(
            self.connection_timeout > 0,
            "database.connection_timeout",
            "Connection timeout must be at least 1 second",
        )
    }

    /// Checks that a PostgreSQL URL is configured
    pub fn validate_url(&self) -> Result<(), ConfigError> {
        ensure(
            !self.url.is_empty(),
            "database.url",
            "Database URL is required for the postgres backend; set BEACON_DATABASE__URL",
        )?;
        ensure(
            POSTGRES_SCHEMES.iter().any(|scheme| self.url.starts_with(scheme)),
            "database.url",
            "Invalid database URL format. Expected postgres://[user:password@]host[:port]/database",
        )
    }
}

impl JwtConfig {
    /// Checked at server startup rather than in `Settings::validate`, so that
    /// `migrate` runs without a secret.
    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure(
            !self.secret.is_empty(),
            "jwt.secret",
            "JWT secret cannot be empty; set BEACON_JWT__SECRET",
        )?;
        ensure(
            self.secret.len() >= MIN_SECRET_LEN,
            "jwt.secret",
            format!("JWT secret must be at least {} characters", MIN_SECRET_LEN),
        )?;
        ensure(
            self.access_token_expiration > 0,
            "jwt.access_token_expiration",
            "Access token expiration must be a positive number of hours",
        )
    }
}

impl StreamConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure(
            self.subscriber_buffer > 0,
            "stream.subscriber_buffer",
            "Subscriber buffer must hold at least one notification",
        )?;
        ensure(
            self.keep_alive_interval > 0,
            "stream.keep_alive_interval",
            "Keep-alive interval must be at least 1 second",
        )
    }
}

impl FileSettings {
    fn validate(&self) -> Result<(), ConfigError> {
        ensure(
            !self.enabled || !self.path.as_os_str().is_empty(),
            "logger.file.path",
            "A path is required when file logging is enabled",
        )
    }
}

impl LoggerSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure(
            LOG_LEVELS.contains(&self.level.to_lowercase().as_str()),
            "logger.level",
            format!(
                "Unknown log level '{}' (expected one of {})",
                self.level,
                LOG_LEVELS.join(", ")
            ),
        )?;
        ensure(
            self.console.enabled || self.file.enabled,
            "logger",
            "Enable at least one of console or file output",
        )?;
        self.file.validate()
    }
}

impl Settings {
    /// First failure wins. JWT settings are left to the serve command.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.database.validate()?;
        self.stream.validate()?;
        self.logger.validate()
    }
}
