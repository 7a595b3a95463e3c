//! Jobs configuration
//!
//! Values come from, in increasing priority: built-in defaults, an optional
//! config file, `LEDGER_`-prefixed environment variables (nested keys use a
//! double underscore, e.g. `LEDGER_DATABASE__URL`), and finally the plain
//! `DATABASE_URL` variable.

use std::path::Path;

use clap::ValueEnum;
use serde::Deserialize;

use domain_ledger::LedgerConfig;
use infra_db::DatabaseConfig;

/// Output style of the log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Pretty,
    /// One JSON object per line
    Json,
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Filter directive used when `RUST_LOG` is unset
    pub level: String,
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Jobs configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct JobsConfig {
    pub database: DatabaseConfig,
    pub log: LogConfig,
    pub ledger: LedgerConfig,
}

impl JobsConfig {
    /// Loads configuration from environment
    pub fn from_env() -> Result<Self, config::ConfigError> {
        Self::load(None)
    }

    /// Loads configuration from an optional file layered under the environment
    pub fn load(file: Option<&Path>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(config::File::from(path));
        }
        let mut loaded: JobsConfig = builder
            .add_source(
                config::Environment::with_prefix("LEDGER")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        if let Ok(url) = std::env::var("DATABASE_URL") {
            loaded.database.url = url;
        }
        Ok(loaded)
    }

    /// Overrides the log level
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log.level = level.into();
        self
    }

    pub fn with_log_format(mut self, format: LogFormat) -> Self {
        self.log.format = format;
        self
    }
}
