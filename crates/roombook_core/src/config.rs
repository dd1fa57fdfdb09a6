//! File-based configuration.
//!
//! Loaded from a TOML file with `[database]` and `[logging]` sections. Every
//! field has a default, so an empty file is a valid configuration. Unknown keys
//! are rejected to surface typos early.

use crate::db::DEFAULT_BUSY_TIMEOUT;
use crate::logging::{default_log_level, normalize_level};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_DB_FILE: &str = "roombook.db";

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RoombookConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// SQLite storage settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    /// Database file; created on first open.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
    /// How long a writer waits for another connection's write lock.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,
    /// Absolute directory for rolling log files. `None` logs to stderr.
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            dir: None,
        }
    }
}

impl DatabaseConfig {
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from(DEFAULT_DB_FILE)
}

fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT.as_millis() as u64
}

fn default_level() -> String {
    default_log_level().to_string()
}

/// Configuration load/validation errors.
#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse(toml::de::Error),
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "invalid config file: {err}"),
            Self::Invalid(message) => write!(f, "invalid config value: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(value: toml::de::Error) -> Self {
        Self::Parse(value)
    }
}

impl RoombookConfig {
    /// Reads and validates a TOML configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Parses and validates configuration text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("database.path must not be empty".into()));
        }
        if self.database.busy_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "database.busy_timeout_ms must be greater than zero".into(),
            ));
        }
        normalize_level(&self.logging.level).map_err(ConfigError::Invalid)?;
        if let Some(dir) = &self.logging.dir {
            if !dir.is_absolute() {
                return Err(ConfigError::Invalid(format!(
                    "logging.dir must be an absolute path, got `{}`",
                    dir.display()
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, RoombookConfig};
    use std::path::PathBuf;
    use std::time::Duration;

    #[test]
    fn empty_file_yields_defaults() {
        let config = RoombookConfig::from_toml_str("").expect("empty config is valid");
        assert_eq!(config, RoombookConfig::default());
        assert_eq!(config.database.path, PathBuf::from("roombook.db"));
        assert_eq!(config.database.busy_timeout(), Duration::from_secs(5));
        assert!(config.logging.dir.is_none());
    }

    #[test]
    fn parses_all_sections() {
        let config = RoombookConfig::from_toml_str(
            r#"
            [database]
            path = "/tmp/rooms.db"
            busy_timeout_ms = 250

            [logging]
            level = "warn"
            dir = "/tmp/roombook-logs"
            "#,
        )
        .expect("config should parse");

        assert_eq!(config.database.path, PathBuf::from("/tmp/rooms.db"));
        assert_eq!(config.database.busy_timeout(), Duration::from_millis(250));
        assert_eq!(config.logging.level, "warn");
        assert_eq!(config.logging.dir, Some(PathBuf::from("/tmp/roombook-logs")));
    }

    #[test]
    fn rejects_unknown_keys() {
        let err = RoombookConfig::from_toml_str("[database]\npth = \"x.db\"\n")
            .expect_err("typo must be rejected");
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn rejects_invalid_values() {
        let zero_timeout = RoombookConfig::from_toml_str("[database]\nbusy_timeout_ms = 0\n")
            .expect_err("zero timeout must fail");
        assert!(matches!(zero_timeout, ConfigError::Invalid(_)));

        let bad_level = RoombookConfig::from_toml_str("[logging]\nlevel = \"loud\"\n")
            .expect_err("unknown level must fail");
        assert!(matches!(bad_level, ConfigError::Invalid(_)));

        let relative_dir = RoombookConfig::from_toml_str("[logging]\ndir = \"logs\"\n")
            .expect_err("relative log dir must fail");
        assert!(matches!(relative_dir, ConfigError::Invalid(message) if message.contains("absolute")));
    }
}
