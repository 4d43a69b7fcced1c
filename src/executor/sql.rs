//! SQL suite runner
//!
//! Runs every discovered `.sql` file through the database command-line client
//! on a bounded worker pool and classifies each outcome.

use anyhow::Result;
use chrono::Local;
use futures::stream::{FuturesUnordered, StreamExt};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use super::classify::{Classification, IgnorableErrorPolicy, OutcomeClassifier};
use super::discovery::{discover, DiscoveryError, TestFile};
use super::process::{CommandExecutor, CommandSpec, ProcessExecutor, ProcessOutput};
use crate::config::SqlConfig;
use crate::models::{DatabaseConfig, SuiteRun, TestResult, TestType};
use crate::results::ResultCollector;
use crate::utils::{RunLog, Timer};

/// Per-file execution context shared by all worker tasks
struct SqlWorker {
    db: DatabaseConfig,
    client: String,
    timeout: Duration,
    executor: Arc<dyn CommandExecutor>,
    classifier: Arc<dyn OutcomeClassifier>,
    log: RunLog,
}

impl SqlWorker {
    fn command(&self, file: &TestFile) -> CommandSpec {
        let script = file.path.to_string_lossy();
        CommandSpec::new(&self.client, self.timeout)
            .args(self.db.script_args(&script))
            .envs(self.db.password_env())
    }

    async fn execute_file(&self, file: &TestFile) -> TestResult {
        let timer = Timer::start(&file.name);
        self.log.detail(&format!(
            "\n--- Executing SQL File ({} -f): {} ---",
            self.client, file.name
        ));

        let spec = self.command(file);
        let outcome = self.executor.execute(&spec).await;
        let duration = timer.stop();

        match outcome {
            Ok(output) => {
                let record = self.classify(file, &output, duration);
                let code = match output.exit_code {
                    Some(code) => code.to_string(),
                    None => "none (terminated)".to_string(),
                };
                self.log_output(file, output.stdout.trim(), output.stderr.trim(), &code);
                record
            }
            Err(e) => {
                self.log_output(file, "", &e.to_string(), "none (not started)");
                TestResult::failed(
                    &file.name,
                    TestType::Sql,
                    duration,
                    format!("Execution subprocess error: {e}"),
                )
            }
        }
    }

    fn classify(&self, file: &TestFile, output: &ProcessOutput, duration: f64) -> TestResult {
        if output.timed_out {
            return TestResult::failed(
                &file.name,
                TestType::Sql,
                duration,
                format!(
                    "{} execution timed out after {} seconds.",
                    self.client,
                    self.timeout.as_secs()
                ),
            );
        }

        let code = output.code();
        let stderr = output.stderr.trim();

        match self.classifier.classify(code, stderr) {
            Classification::Clean => TestResult::success(&file.name, TestType::Sql, duration),
            Classification::Ignored => {
                self.log.detail(&format!(
                    "[SQL WARN] {}: Finished with ignored errors. Status: SUCCESS.",
                    file.name
                ));
                TestResult::success(&file.name, TestType::Sql, duration).with_note(format!(
                    "Execution successful with ignored error(s). Exit Code: {code}. Check log for details."
                ))
            }
            Classification::Failed => {
                let first_line = stderr.lines().next().unwrap_or("Unknown error.");
                TestResult::failed(
                    &file.name,
                    TestType::Sql,
                    duration,
                    format!(
                        "{} execution failed. Exit Code: {code}. Error: {first_line}",
                        self.client
                    ),
                )
            }
        }
    }

    /// One message per file so concurrent workers never interleave
    fn log_output(&self, file: &TestFile, stdout: &str, stderr: &str, code: &str) {
        let client = &self.client;
        let name = &file.name;
        self.log.detail(&format!(
            "{client} STDOUT ({name}):\n{stdout}\n{client} STDERR ({name}):\n{stderr}\nExecution Return Code ({name}): {code}"
        ));
    }
}

/// Concurrent runner for `.sql` test files
pub struct SqlSuiteRunner {
    db: DatabaseConfig,
    dir: PathBuf,
    file: Option<String>,
    client: String,
    concurrency: usize,
    timeout: Duration,
    executor: Arc<dyn CommandExecutor>,
    classifier: Arc<dyn OutcomeClassifier>,
    log: RunLog,
}

impl SqlSuiteRunner {
    /// Create a runner using real processes and the configured ignore patterns
    pub fn new(db: DatabaseConfig, config: &SqlConfig, log: RunLog) -> Result<Self> {
        let classifier = IgnorableErrorPolicy::new(&config.ignore_patterns)?;

        Ok(Self {
            db,
            dir: config.dir.clone(),
            file: config.file.clone(),
            client: config.client.clone(),
            concurrency: config.concurrency.max(1),
            timeout: Duration::from_secs(config.timeout_secs),
            executor: Arc::new(ProcessExecutor::new()),
            classifier: Arc::new(classifier),
            log,
        })
    }

    #[cfg(test)]
    pub fn with_executor(mut self, executor: Arc<dyn CommandExecutor>) -> Self {
        self.executor = executor;
        self
    }

    #[cfg(test)]
    pub fn with_classifier(mut self, classifier: Arc<dyn OutcomeClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    fn worker(&self) -> Arc<SqlWorker> {
        Arc::new(SqlWorker {
            db: self.db.clone(),
            client: self.client.clone(),
            timeout: self.timeout,
            executor: self.executor.clone(),
            classifier: self.classifier.clone(),
            log: self.log.clone(),
        })
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Files this run would execute
    pub fn discover(&self) -> Result<Vec<TestFile>, DiscoveryError> {
        discover(&self.dir, TestType::Sql.extension(), self.file.as_deref())
    }

    fn discover_logged(&self) -> Vec<TestFile> {
        let log = &self.log;
        match self.discover() {
            Ok(files) => {
                if let Some(file) = &self.file {
                    log.detail(&format!("[INFO] Executing specified SQL file: {file}"));
                }
                files
            }
            Err(DiscoveryError::DirectoryNotFound(dir)) => {
                warn!("SQL directory {} not found", dir.display());
                log.detail(&format!(
                    "[WARNING] SQL directory '{}' not found. Skipping SQL tests.",
                    dir.display()
                ));
                Vec::new()
            }
            Err(e) => {
                log.summary(&format!("[ERROR] {e}"), true);
                Vec::new()
            }
        }
    }

    /// Run the suite. Records come back in completion order.
    pub async fn run(&self) -> SuiteRun {
        let log = &self.log;
        log.detail(&format!("\n=== SQL Test Runner ({} -f) ===", self.client));
        log.detail(&format!("SQL directory: {}", self.dir.display()));
        log.detail(&format!("Concurrency level: {}", self.concurrency));

        let files = self.discover_logged();
        let start_time = Local::now();

        if files.is_empty() {
            log.detail("[INFO] No SQL files found to execute.");
            return SuiteRun::empty(TestType::Sql, start_time);
        }

        info!(
            "Running {} SQL files (max {} concurrent)",
            files.len(),
            self.concurrency
        );

        let worker = self.worker();
        let collector = Arc::new(ResultCollector::new());
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut pending = FuturesUnordered::new();

        for file in files {
            let worker = worker.clone();
            let semaphore = semaphore.clone();
            let collector = collector.clone();
            let name = file.name.clone();

            let handle = tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                let record = worker.execute_file(&file).await;
                collector.push(record.clone());
                record
            });

            pending.push(async move { (name, handle.await) });
        }

        while let Some((name, joined)) = pending.next().await {
            let record = match joined {
                Ok(record) => record,
                Err(e) => {
                    let record = TestResult::failed(
                        name,
                        TestType::Sql,
                        0.0,
                        format!("Execution subprocess error: worker task failed: {e}"),
                    );
                    collector.push(record.clone());
                    record
                }
            };
            debug!("Completed {}", record.file);
            log.summary(&record.to_string(), !record.status.is_success());
        }

        let end_time = Local::now();
        let records = match Arc::try_unwrap(collector) {
            Ok(collector) => collector.into_records(),
            Err(shared) => shared.snapshot(),
        };

        SuiteRun {
            test_type: TestType::Sql,
            start_time,
            end_time,
            records,
        }
    }
}
