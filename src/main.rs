//! multi-test - SQL and shell regression test runner
//!
//! Discovers `.sql` and `.sh` test files, runs each in its own subprocess and
//! writes a detailed log plus JSON and HTML reports for the whole run.
//!
//! ## Features
//!
//! - Concurrent SQL execution through the database command-line client
//! - Configurable ignorable-error patterns for known-benign client errors
//! - Sequential shell execution with non-executable scripts reported as skipped
//! - Per-file timeouts with forced termination
//! - JSON, HTML and optional CSV reports sharing one timestamped base name
//!
//! ## Usage
//!
//! ```bash
//! # Run both suites
//! multi-test run --host localhost -U postgres -d regression
//!
//! # Run one SQL file only
//! multi-test run --only sql --file-sql 010_roles.sql -d regression
//!
//! # Show what would run
//! multi-test list
//!
//! # Create a config file
//! multi-test config init
//! ```

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{debug, info, warn};

mod cli;
mod config;
mod executor;
mod models;
mod output;
mod results;
mod utils;

use cli::Args;
use config::{AppConfig, ConfigFile, EnvConfig};
use executor::{ShellSuiteRunner, SqlSuiteRunner};
use models::{RunSummary, SuiteRun, TestResult, TestType};
use output::{OutputFormat, ResultFormatter};
use results::{
    absolute, CsvReportWriter, HtmlReportWriter, JsonReportWriter, ReportAggregator, ReportPaths,
};
use utils::logger::{init_logger, LogLevel};
use utils::timer::{format_duration, format_timestamp};
use utils::{FileLogSink, RunLog};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();
    init_logger(LogLevel::for_verbosity(args.verbose));

    let config_path = args.config.as_deref();

    match args.command {
        cli::Command::Run(run_args) => run_tests(run_args, config_path).await,
        cli::Command::List(list_args) => {
            list_tests(list_args, config_path)?;
            Ok(ExitCode::SUCCESS)
        }
        cli::Command::Config(config_args) => {
            manage_config(config_args, config_path)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Defaults, then the config file, then `MULTI_TEST_*` variables
fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    let (file, source) = ConfigFile::load_or_default(path)?;
    match &source {
        Some(path) => info!("Using configuration file {}", path.display()),
        None => debug!("No configuration file found, using defaults"),
    }

    let mut config = file.app;
    let env = EnvConfig::load();
    if env.has_any() {
        debug!("Applying MULTI_TEST_* environment overrides");
    }
    env.apply(&mut config);
    Ok(config)
}

async fn run_tests(args: cli::RunArgs, config_path: Option<&Path>) -> Result<ExitCode> {
    let mut config = load_config(config_path)?;
    args.apply(&mut config);

    let (run_sql, run_shell) = cli::selected_suites(args.only);
    config
        .validate(run_sql)
        .context("Invalid configuration")?;

    let outcome = execute_suites(&config, run_sql, run_shell, true).await?;

    let mut formatter = ResultFormatter::new(OutputFormat::Table);
    if args.no_color {
        formatter = formatter.no_color();
    }

    match &outcome.summary {
        Some(summary) => print!(
            "{}",
            formatter.format_summary(summary, outcome.html.as_deref(), outcome.json.as_deref())
        ),
        None => println!("\nTotal duration: {}", outcome.duration),
    }

    if outcome.has_failures() {
        Ok(ExitCode::from(1))
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

/// Everything a finished run produced
#[derive(Debug)]
struct RunOutcome {
    /// `None` when no test produced a record
    summary: Option<RunSummary>,
    duration: String,
    log: PathBuf,
    html: Option<PathBuf>,
    json: Option<PathBuf>,
}

impl RunOutcome {
    fn has_failures(&self) -> bool {
        self.summary.map(|s| s.has_failures()).unwrap_or(false)
    }
}

/// Run the selected suites, SQL first, and write the reports.
///
/// Only report directory and log file setup are fatal; suite problems end
/// up as records or log lines.
async fn execute_suites(
    config: &AppConfig,
    run_sql: bool,
    run_shell: bool,
    console: bool,
) -> Result<RunOutcome> {
    let started = Local::now();
    let paths = ReportPaths::new(&config.report.dir, &config.report.prefix, &started);
    paths
        .ensure_dir()
        .context("Failed to prepare report directory")?;

    let sink = FileLogSink::create(paths.log()).context("Failed to open log file")?;
    let log_path = sink.path().to_path_buf();
    let mut log = RunLog::new(Arc::new(sink));
    if !console {
        log = log.quiet();
    }
    log.summary(
        &format!(
            "[INFO] Starting test execution. Detailed log: {}",
            absolute(&log_path).display()
        ),
        false,
    );

    log.detail(&format!(
        "--- Test Suite Started at {} ---",
        format_timestamp(&started)
    ));

    let mut records: Vec<TestResult> = Vec::new();

    if run_sql {
        let runner = SqlSuiteRunner::new(config.database.clone(), &config.sql, log.clone())?;
        info!(
            "Running SQL suite from {} with {} workers",
            config.sql.dir.display(),
            runner.concurrency()
        );
        records.extend(finish_suite(&log, runner.run().await));
    } else {
        log.detail("[INFO] SQL tests skipped (--only shell).");
    }

    if run_shell {
        let runner = ShellSuiteRunner::new(&config.shell, log.clone());
        info!("Running shell suite from {}", config.shell.dir.display());
        records.extend(finish_suite(&log, runner.run().await));
    } else {
        log.detail("[INFO] Shell tests skipped (--only sql).");
    }

    let ended = Local::now();
    let duration = format_duration(ended - started);

    let mut outcome = RunOutcome {
        summary: None,
        duration,
        log: log_path,
        html: None,
        json: None,
    };

    if records.is_empty() {
        warn!("No test results were produced");
        log.summary(
            "[WARNING] No test results to report. Report generation skipped.",
            true,
        );
    } else {
        let mut aggregator = ReportAggregator::new(log.clone())
            .with_writer(JsonReportWriter, paths.json())
            .with_writer(HtmlReportWriter, paths.html());
        if config.report.csv {
            aggregator = aggregator.with_writer(CsvReportWriter, paths.csv());
        }

        let report = aggregator.generate(started, ended, records);
        if !report.failed.is_empty() {
            warn!("{} report file(s) could not be written", report.failed.len());
        }
        let written = |path: PathBuf| report.written.contains(&path).then(|| absolute(&path));

        outcome.html = written(paths.html());
        outcome.json = written(paths.json());
        outcome.summary = Some(report.data.summary);
    }

    log.detail(&format!("Log file: {}", absolute(&outcome.log).display()));
    log.detail("\n=== All Selected Tests Completed ===");
    log.flush();

    Ok(outcome)
}

/// Log the suite's window and counts, then hand back its records
fn finish_suite(log: &RunLog, run: SuiteRun) -> Vec<TestResult> {
    if !run.is_empty() {
        log.detail(&format!(
            "[INFO] {} suite finished in {}. {}",
            run.test_type,
            format_duration(run.end_time - run.start_time),
            run.summary()
        ));
    }
    run.records
}

fn list_tests(args: cli::ListArgs, config_path: Option<&Path>) -> Result<()> {
    let mut config = load_config(config_path)?;
    if let Some(dir) = args.sql_dir {
        config.sql.dir = dir;
    }
    if let Some(dir) = args.bash_dir {
        config.shell.dir = dir;
    }

    let format = OutputFormat::from_str(&args.format)
        .ok_or_else(|| anyhow::anyhow!("Unknown output format: {}", args.format))?;
    let formatter = ResultFormatter::new(format);
    let (list_sql, list_shell) = cli::selected_suites(args.only);

    let suites = [
        (list_sql, TestType::Sql, &config.sql.dir, config.sql.file.as_deref()),
        (list_shell, TestType::Shell, &config.shell.dir, config.shell.file.as_deref()),
    ];

    for (selected, test_type, dir, selector) in suites {
        if !selected {
            continue;
        }
        match executor::discover(dir, test_type.extension(), selector) {
            Ok(files) => println!("{}", formatter.format_listing(test_type, dir, &files)),
            Err(e) => eprintln!("{test_type}: {e}"),
        }
    }

    Ok(())
}

fn manage_config(args: cli::ConfigArgs, config_path: Option<&Path>) -> Result<()> {
    match args.action {
        cli::ConfigAction::Show => {
            let config = load_config(config_path)?;
            println!("{}", config.redacted().to_yaml()?);
        }

        cli::ConfigAction::Init { path, force } => {
            if path.exists() && !force {
                anyhow::bail!(
                    "Configuration file already exists: {}. Use --force to overwrite.",
                    path.display()
                );
            }

            ConfigFile::example().save(&path)?;
            println!("Configuration file created: {}", path.display());
            println!("\nEdit the file to customize your settings.");
        }

        cli::ConfigAction::Env => {
            config::print_env_help();
        }
    }

    Ok(())
}
