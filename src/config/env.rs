//! Environment variable configuration
//!
//! Provides environment variable overrides for configuration.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use super::AppConfig;
use crate::models::PASSWORD_ENV;

/// Environment variable prefix
const ENV_PREFIX: &str = "MULTI_TEST";

/// Overrides read from `MULTI_TEST_*` variables
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EnvConfig {
    pub db_host: Option<String>,
    pub db_port: Option<u16>,
    pub db_user: Option<String>,
    /// From MULTI_TEST_DB_PASSWORD, falling back to PGPASSWORD
    pub db_password: Option<String>,
    pub db_name: Option<String>,
    pub sql_dir: Option<PathBuf>,
    pub shell_dir: Option<PathBuf>,
    pub concurrency: Option<usize>,
    pub report_dir: Option<PathBuf>,
    pub report_prefix: Option<String>,
}

impl EnvConfig {
    /// Load configuration from environment variables
    pub fn load() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |name: &str| {
            lookup(&format!("{ENV_PREFIX}_{name}")).filter(|v| !v.is_empty())
        };

        Self {
            db_host: get("DB_HOST"),
            db_port: parse_var(get("DB_PORT")),
            db_user: get("DB_USER"),
            db_password: get("DB_PASSWORD")
                .or_else(|| lookup(PASSWORD_ENV).filter(|v| !v.is_empty())),
            db_name: get("DB_NAME"),
            sql_dir: get("SQL_DIR").map(PathBuf::from),
            shell_dir: get("SHELL_DIR").map(PathBuf::from),
            concurrency: parse_var(get("CONCURRENCY")),
            report_dir: get("REPORT_DIR").map(PathBuf::from),
            report_prefix: get("REPORT_PREFIX"),
        }
    }

    /// Check if any environment variables are set
    pub fn has_any(&self) -> bool {
        *self != Self::default()
    }

    /// Overlay the set values onto `config`
    pub fn apply(&self, config: &mut AppConfig) {
        let db = &mut config.database;
        if let Some(host) = &self.db_host {
            db.host = host.clone();
        }
        if let Some(port) = self.db_port {
            db.port = port;
        }
        if let Some(user) = &self.db_user {
            db.user = user.clone();
        }
        if let Some(password) = &self.db_password {
            db.password = password.clone();
        }
        if let Some(name) = &self.db_name {
            db.dbname = name.clone();
        }
        if let Some(dir) = &self.sql_dir {
            config.sql.dir = dir.clone();
        }
        if let Some(dir) = &self.shell_dir {
            config.shell.dir = dir.clone();
        }
        if let Some(concurrency) = self.concurrency {
            config.sql.concurrency = concurrency;
        }
        if let Some(dir) = &self.report_dir {
            config.report.dir = dir.clone();
        }
        if let Some(prefix) = &self.report_prefix {
            config.report.prefix = prefix.clone();
        }
    }
}

/// Parse a variable, ignoring values that do not parse
fn parse_var<T: FromStr>(value: Option<String>) -> Option<T> {
    value.and_then(|v| v.trim().parse().ok())
}

/// Print the recognised environment variables
pub fn print_env_help() {
    println!("Environment Variables:");
    println!();
    println!("  {ENV_PREFIX}_DB_HOST        Database host");
    println!("  {ENV_PREFIX}_DB_PORT        Database port");
    println!("  {ENV_PREFIX}_DB_USER        Database user");
    println!("  {ENV_PREFIX}_DB_PASSWORD    Database password ({PASSWORD_ENV} is used when unset)");
    println!("  {ENV_PREFIX}_DB_NAME        Database name");
    println!("  {ENV_PREFIX}_SQL_DIR        Directory with .sql tests");
    println!("  {ENV_PREFIX}_SHELL_DIR      Directory with .sh tests");
    println!("  {ENV_PREFIX}_CONCURRENCY    SQL worker count");
    println!("  {ENV_PREFIX}_REPORT_DIR     Report output directory");
    println!("  {ENV_PREFIX}_REPORT_PREFIX  Report file name prefix");
}
