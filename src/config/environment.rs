//! Deployment environment, which picks the `{environment}.toml` layer.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::error::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Test,
    Production,
}

/// Accepted spellings, matched case-insensitively.
const NAMES: &[(&str, Environment)] = &[
    ("development", Environment::Development),
    ("dev", Environment::Development),
    ("test", Environment::Test),
    ("production", Environment::Production),
    ("prod", Environment::Production),
];

impl Environment {
    pub const ENV_VAR: &'static str = "BEACON_APP_ENV";

    /// `BEACON_APP_ENV`, falling back to development when unset or unknown.
    pub fn from_env() -> Self {
        std::env::var(Self::ENV_VAR)
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or_default()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Test => "test",
            Environment::Production => "production",
        }
    }

    /// File name of this environment's configuration layer
    pub fn config_file_name(&self) -> String {
        format!("{}.toml", self.as_str())
    }
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NAMES
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(s))
            .map(|(_, env)| *env)
            .ok_or_else(|| {
                ConfigError::EnvVarError(format!(
                    "Unknown environment '{}' (expected development, test or production)",
                    s
                ))
            })
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aliases_parse() {
        for (name, expected) in NAMES {
            assert_eq!(name.parse::<Environment>().unwrap(), *expected);
        }
        assert_eq!("PROD".parse::<Environment>().unwrap(), Environment::Production);
    }

    #[test]
    fn test_unknown_environment() {
        let err = "staging".parse::<Environment>().unwrap_err();
        assert!(err.to_string().contains("Unknown environment 'staging'"));
    }

    #[test]
    fn test_config_file_name() {
        assert_eq!(Environment::default().config_file_name(), "development.toml");
        assert_eq!(Environment::Production.to_string(), "production");
    }
}
