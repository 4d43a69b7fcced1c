//! Configuration module
//!
//! Handles loading, layering and validating configuration.

mod env;
mod file;

pub use env::{print_env_help, EnvConfig};
pub use file::ConfigFile;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

use crate::executor::{IgnorableErrorPolicy, PatternError, DEFAULT_IGNORE_PATTERN};
use crate::models::DatabaseConfig;

/// Rejected configuration values
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("database {} must be set to run SQL tests", .0.join(", "))]
    MissingDatabase(Vec<&'static str>),

    #[error(transparent)]
    Pattern(#[from] PatternError),
}

/// Application configuration
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub sql: SqlConfig,
    pub shell: ShellConfig,
    pub report: ReportConfig,
}

impl AppConfig {
    /// Check the values a run depends on.
    ///
    /// Database fields are only required when the SQL suite will run.
    pub fn validate(&self, run_sql: bool) -> Result<(), ConfigError> {
        if self.sql.concurrency == 0 {
            return Err(invalid("sql.concurrency", "must be at least 1"));
        }
        if self.sql.timeout_secs == 0 {
            return Err(invalid("sql.timeout_secs", "must be greater than 0"));
        }
        if self.shell.timeout_secs == 0 {
            return Err(invalid("shell.timeout_secs", "must be greater than 0"));
        }
        if self.sql.client.trim().is_empty() {
            return Err(invalid("sql.client", "must not be empty"));
        }
        if self.shell.interpreter.trim().is_empty() {
            return Err(invalid("shell.interpreter", "must not be empty"));
        }
        if self.report.prefix.trim().is_empty() {
            return Err(invalid("report.prefix", "must not be empty"));
        }

        IgnorableErrorPolicy::new(&self.sql.ignore_patterns)?;

        if run_sql {
            let missing = self.database.missing_fields();
            if !missing.is_empty() {
                return Err(ConfigError::MissingDatabase(missing));
            }
        }

        Ok(())
    }

    /// Copy safe to print
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        if !config.database.password.is_empty() {
            config.database.password = "********".to_string();
        }
        config
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Failed to serialize config")
    }
}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field,
        reason: reason.to_string(),
    }
}

/// SQL suite settings
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SqlConfig {
    /// Directory scanned for `.sql` files
    pub dir: PathBuf,

    /// Run only this file from `dir`
    pub file: Option<String>,

    /// Worker pool size
    pub concurrency: usize,

    /// Per-file timeout in seconds
    pub timeout_secs: u64,

    /// Database command-line client
    pub client: String,

    /// Case-insensitive patterns whose stderr match turns a failure into an advisory success
    pub ignore_patterns: Vec<String>,
}

impl Default for SqlConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("sql_tests"),
            file: None,
            concurrency: default_concurrency(),
            timeout_secs: 600,
            client: "psql".to_string(),
            ignore_patterns: vec![DEFAULT_IGNORE_PATTERN.to_string()],
        }
    }
}

/// Shell suite settings
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellConfig {
    /// Directory scanned for `.sh` files
    pub dir: PathBuf,

    /// Run only this file from `dir`
    pub file: Option<String>,

    /// Per-script timeout in seconds
    pub timeout_secs: u64,

    pub interpreter: String,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("bash_tests"),
            file: None,
            timeout_secs: 300,
            interpreter: "bash".to_string(),
        }
    }
}

/// Report output settings
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub dir: PathBuf,

    /// Base name prefix shared by the log and report files
    pub prefix: String,

    /// Also write a CSV export
    pub csv: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("test_report"),
            prefix: "test_run".to_string(),
            csv: false,
        }
    }
}

/// Logical CPU count, 4 when it cannot be determined
fn default_concurrency() -> usize {
    match num_cpus::get() {
        0 => 4,
        n => n,
    }
}
