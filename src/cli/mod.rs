//! CLI argument parsing
//!
//! Defines command-line interface using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::config::AppConfig;

/// SQL and shell regression test runner
#[derive(Parser, Debug)]
#[command(name = "multi-test")]
#[command(version)]
#[command(about = "Run SQL and shell test suites and report the results")]
#[command(long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file (skips the standard locations)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the selected test suites
    Run(RunArgs),

    /// List the test files each suite would run
    List(ListArgs),

    /// Show or create configuration
    Config(ConfigArgs),
}

/// Suite selector for `--only`
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Suite {
    Sql,
    Shell,
}

/// Whether the SQL and shell suites are selected
pub fn selected_suites(only: Option<Suite>) -> (bool, bool) {
    match only {
        None => (true, true),
        Some(Suite::Sql) => (true, false),
        Some(Suite::Shell) => (false, true),
    }
}

/// Arguments for run command
#[derive(Parser, Debug, Default)]
pub struct RunArgs {
    /// Database host
    #[arg(long)]
    pub host: Option<String>,

    /// Database port
    #[arg(long)]
    pub port: Option<u16>,

    /// Database user
    #[arg(short = 'U', long)]
    pub user: Option<String>,

    /// Database password (passed to the client through its environment)
    #[arg(long)]
    pub password: Option<String>,

    /// Database name
    #[arg(short = 'd', long)]
    pub dbname: Option<String>,

    /// Directory with .sql test files
    #[arg(long)]
    pub sql_dir: Option<PathBuf>,

    /// Directory with .sh test files
    #[arg(long)]
    pub bash_dir: Option<PathBuf>,

    /// Run only this .sql file from the SQL directory
    #[arg(long)]
    pub file_sql: Option<String>,

    /// Run only this .sh file from the shell directory
    #[arg(long)]
    pub file_bash: Option<String>,

    /// Run only one suite
    #[arg(long, value_enum)]
    pub only: Option<Suite>,

    /// Number of SQL files executed at once
    #[arg(short = 'j', long)]
    pub concurrency: Option<usize>,

    /// Directory for the log and report files
    #[arg(long)]
    pub report_dir: Option<PathBuf>,

    /// Prefix of the log and report file names
    #[arg(long)]
    pub report_prefix: Option<String>,

    /// Regular expression for SQL errors to ignore (repeatable, replaces configured patterns)
    #[arg(long = "ignore-pattern")]
    pub ignore_patterns: Vec<String>,

    /// Also write a CSV report
    #[arg(long)]
    pub csv: bool,

    /// Disable colored console summary
    #[arg(long)]
    pub no_color: bool,
}

impl RunArgs {
    /// Overlay the flags that were given onto `config`
    pub fn apply(&self, config: &mut AppConfig) {
        let db = &mut config.database;
        if let Some(host) = &self.host {
            db.host = host.clone();
        }
        if let Some(port) = self.port {
            db.port = port;
        }
        if let Some(user) = &self.user {
            db.user = user.clone();
        }
        if let Some(password) = &self.password {
            db.password = password.clone();
        }
        if let Some(dbname) = &self.dbname {
            db.dbname = dbname.clone();
        }

        if let Some(dir) = &self.sql_dir {
            config.sql.dir = dir.clone();
        }
        if let Some(file) = &self.file_sql {
            config.sql.file = Some(file.clone());
        }
        if let Some(concurrency) = self.concurrency {
            config.sql.concurrency = concurrency;
        }
        if !self.ignore_patterns.is_empty() {
            config.sql.ignore_patterns = self.ignore_patterns.clone();
        }

        if let Some(dir) = &self.bash_dir {
            config.shell.dir = dir.clone();
        }
        if let Some(file) = &self.file_bash {
            config.shell.file = Some(file.clone());
        }

        if let Some(dir) = &self.report_dir {
            config.report.dir = dir.clone();
        }
        if let Some(prefix) = &self.report_prefix {
            config.report.prefix = prefix.clone();
        }
        if self.csv {
            config.report.csv = true;
        }
    }
}

/// Arguments for list command
#[derive(Parser, Debug)]
pub struct ListArgs {
    /// List only one suite
    #[arg(long, value_enum)]
    pub only: Option<Suite>,

    /// Directory with .sql test files
    #[arg(long)]
    pub sql_dir: Option<PathBuf>,

    /// Directory with .sh test files
    #[arg(long)]
    pub bash_dir: Option<PathBuf>,

    /// Output format (table, json)
    #[arg(short, long, default_value = "table")]
    pub format: String,
}

/// Arguments for config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the effective configuration (password redacted)
    Show,

    /// Write an example configuration file
    Init {
        /// Destination (.yaml, .yml or .json)
        #[arg(default_value = "multi-test.yaml")]
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// List the recognised environment variables
    Env,
}
