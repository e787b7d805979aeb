use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    /// A setting holds a value the application cannot run with
    #[error("Invalid setting {field}: {message}")]
    ValidationError { field: String, message: String },

    #[error("Invalid environment: {0}")]
    EnvVarError(String),

    /// Parse or merge failure inside the `config` crate
    #[error(transparent)]
    Other(#[from] config::ConfigError),
}

impl ConfigError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        ConfigError::ValidationError {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn file_not_found(path: impl Into<String>) -> Self {
        ConfigError::FileNotFound(path.into())
    }
}
