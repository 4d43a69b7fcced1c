//! Shell suite runner
//!
//! Runs `.sh` files one at a time in discovery order, since shell tests may
//! depend on each other (setup before run before teardown).

use chrono::Local;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use super::discovery::{discover, DiscoveryError, TestFile};
use super::process::{CommandExecutor, CommandSpec, ProcessExecutor};
use crate::config::ShellConfig;
use crate::models::{SuiteRun, TestResult, TestType};
use crate::results::ResultCollector;
use crate::utils::{RunLog, Timer};

const PERMISSION_HINT: &str = "Execution permission denied. Use 'chmod +x' on the file.";

/// Sequential runner for `.sh` test files
pub struct ShellSuiteRunner {
    dir: PathBuf,
    file: Option<String>,
    interpreter: String,
    timeout: Duration,
    executor: Arc<dyn CommandExecutor>,
    log: RunLog,
}

impl ShellSuiteRunner {
    pub fn new(config: &ShellConfig, log: RunLog) -> Self {
        Self {
            dir: config.dir.clone(),
            file: config.file.clone(),
            interpreter: config.interpreter.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
            executor: Arc::new(ProcessExecutor::new()),
            log,
        }
    }

    #[cfg(test)]
    pub fn with_executor(mut self, executor: Arc<dyn CommandExecutor>) -> Self {
        self.executor = executor;
        self
    }

    /// Files this run would execute
    pub fn discover(&self) -> Result<Vec<TestFile>, DiscoveryError> {
        discover(&self.dir, TestType::Shell.extension(), self.file.as_deref())
    }

    fn discover_logged(&self) -> Vec<TestFile> {
        match self.discover() {
            Ok(files) => {
                if let Some(file) = &self.file {
                    self.log
                        .detail(&format!("[INFO] Executing specified Shell file: {file}"));
                }
                files
            }
            Err(DiscoveryError::DirectoryNotFound(dir)) => {
                warn!("Shell directory {} not found", dir.display());
                self.log.detail(&format!(
                    "[WARNING] Shell directory '{}' not found. Skipping Shell tests.",
                    dir.display()
                ));
                Vec::new()
            }
            Err(e) => {
                self.log.summary(&format!("[ERROR] {e}"), true);
                Vec::new()
            }
        }
    }

    /// Run the suite. Records come back in discovery order.
    pub async fn run(&self) -> SuiteRun {
        self.log.detail("\n=== Shell Script Test Runner ===");
        self.log
            .detail(&format!("Shell directory: {}", self.dir.display()));

        let files = self.discover_logged();
        let start_time = Local::now();
        let collector = ResultCollector::new();

        if !files.is_empty() {
            info!("Running {} shell scripts sequentially", files.len());
        }

        for file in &files {
            let record = self.execute_file(file).await;
            self.log
                .summary(&record.to_string(), !record.status.is_success());
            collector.push(record);
        }

        SuiteRun {
            test_type: TestType::Shell,
            start_time,
            end_time: Local::now(),
            records: collector.into_records(),
        }
    }

    async fn execute_file(&self, file: &TestFile) -> TestResult {
        let timer = Timer::start(&file.name);
        self.log
            .detail(&format!("\n--- Executing SHELL: {} ---", file.name));

        if !is_executable(&file.path) {
            self.log
                .detail(&format!("[BASH SKIP] {}: {}", file.name, PERMISSION_HINT));
            return TestResult::skipped(&file.name, TestType::Shell, timer.stop(), PERMISSION_HINT);
        }

        let spec = CommandSpec::new(&self.interpreter, self.timeout)
            .arg(file.path.to_string_lossy());
        let outcome = self.executor.execute(&spec).await;
        let duration = timer.stop();

        let output = match outcome {
            Ok(output) => output,
            Err(e) => {
                let message = format!("Execution subprocess error: {e}");
                self.log
                    .detail(&format!("[BASH FAIL] {}: Error: {}", file.name, message));
                return TestResult::failed(&file.name, TestType::Shell, duration, message);
            }
        };

        let stdout = output.stdout.trim();
        let stderr = output.stderr.trim();
        self.log.detail(&format!("Script STDOUT:\n{stdout}"));
        self.log.detail(&format!("Script STDERR:\n{stderr}"));

        if output.timed_out {
            let message = format!(
                "Script execution timed out after {} seconds.",
                self.timeout.as_secs()
            );
            self.log
                .detail(&format!("[BASH FAIL] {}: Error: {}", file.name, message));
            return TestResult::failed(&file.name, TestType::Shell, duration, message);
        }

        self.log
            .detail(&format!("Execution Return Code: {}", output.code()));

        if output.success() {
            TestResult::success(&file.name, TestType::Shell, duration)
        } else {
            let message = format!("Exit Code {}. Stderr: {}", output.code(), stderr);
            self.log.detail(&format!(
                "[BASH FAIL] {}: Execution failed. {}",
                file.name, message
            ));
            TestResult::failed(&file.name, TestType::Shell, duration, message)
        }
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    std::fs::metadata(path)
        .map(|m| m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::executor::testing::{Scripted, SpyExecutor};
    use crate::models::TestStatus;
    use crate::utils::MemoryLogSink;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::{tempdir, TempDir};

    fn script(dir: &Path, name: &str, body: &str, executable: bool) {
        let path = dir.join(name);
        fs::write(&path, format!("#!/bin/bash\n{body}\n")).unwrap();
        let mode = if executable { 0o755 } else { 0o644 };
        fs::set_permissions(&path, fs::Permissions::from_mode(mode)).unwrap();
    }

    fn config(dir: &Path) -> ShellConfig {
        ShellConfig {
            dir: dir.to_path_buf(),
            ..ShellConfig::default()
        }
    }

    fn make_runner(config: &ShellConfig) -> (ShellSuiteRunner, Arc<MemoryLogSink>) {
        let sink = Arc::new(MemoryLogSink::new());
        let runner = ShellSuiteRunner::new(config, RunLog::new(sink.clone()).quiet());
        (runner, sink)
    }

    fn fixture() -> TempDir {
        let dir = tempdir().unwrap();
        script(dir.path(), "setup.sh", "exit 0", false);
        script(dir.path(), "run.sh", "echo running", true);
        dir
    }

    #[tokio::test]
    async fn test_non_executable_is_skipped_without_invocation() {
        let dir = fixture();
        let spy = Arc::new(SpyExecutor::new());
        let (runner, sink) = make_runner(&config(dir.path()));
        let runner = runner.with_executor(spy.clone());

        let run = runner.run().await;
        let names: Vec<&str> = run.records.iter().map(|r| r.file.as_str()).collect();
        assert_eq!(names, vec!["run.sh", "setup.sh"]);

        let setup = &run.records[1];
        assert_eq!(setup.status, TestStatus::Skipped);
        assert_eq!(setup.error.as_deref(), Some(PERMISSION_HINT));
        assert!(!spy.was_called_for("setup.sh"));
        assert!(spy.was_called_for("run.sh"));
        assert_eq!(spy.call_count(), 1);
        assert!(sink.contains("[BASH SKIP] setup.sh"));

        let summary = run.summary();
        assert_eq!(
            (summary.total, summary.success, summary.failed, summary.skipped),
            (2, 1, 0, 1)
        );
    }

    #[tokio::test]
    async fn test_real_scripts_end_to_end() {
        let dir = fixture();
        script(dir.path(), "z_fail.sh", "echo oops >&2\nexit 4", true);
        let (runner, sink) = make_runner(&config(dir.path()));

        let run = runner.run().await;
        assert_eq!(run.records.len(), 3);
        assert_eq!(run.records[0].status, TestStatus::Success);
        assert_eq!(run.records[1].status, TestStatus::Skipped);

        let failed = &run.records[2];
        assert_eq!(failed.status, TestStatus::Failed);
        assert_eq!(failed.error.as_deref(), Some("Exit Code 4. Stderr: oops"));
        assert!(sink.contains("Script STDOUT:\nrunning"));
        assert!(sink.contains("[BASH OK] run.sh"));
    }

    #[tokio::test]
    async fn test_timeout_fails_with_message() {
        let dir = tempdir().unwrap();
        script(dir.path(), "hang.sh", "sleep 30", true);
        let mut cfg = config(dir.path());
        cfg.timeout_secs = 1;
        let (runner, _) = make_runner(&cfg);

        let run = runner.run().await;
        let record = &run.records[0];
        assert_eq!(record.status, TestStatus::Failed);
        assert_eq!(
            record.error.as_deref(),
            Some("Script execution timed out after 1 seconds.")
        );
        // the sleep dies with the script, so the pipes close right away
        assert!(record.duration < 2.5);
    }

    #[tokio::test]
    async fn test_spawn_fault_fails() {
        let dir = tempdir().unwrap();
        script(dir.path(), "a.sh", "exit 0", true);
        let spy = Arc::new(SpyExecutor::new().on("a.sh", Scripted::spawn_error()));
        let (runner, _) = make_runner(&config(dir.path()));

        let run = runner.with_executor(spy).run().await;
        assert_eq!(run.records[0].status, TestStatus::Failed);
        assert!(run.records[0]
            .error
            .as_deref()
            .unwrap()
            .starts_with("Execution subprocess error:"));
    }

    #[tokio::test]
    async fn test_no_ignore_policy_for_shell() {
        let dir = tempdir().unwrap();
        script(dir.path(), "a.sh", "exit 0", true);
        let spy = Arc::new(
            SpyExecutor::new()
                .on("a.sh", Scripted::exit(1).stderr("ERROR:  role \"x\" does not exist")),
        );
        let (runner, _) = make_runner(&config(dir.path()));

        let run = runner.with_executor(spy).run().await;
        assert_eq!(run.records[0].status, TestStatus::Failed);
    }

    #[tokio::test]
    async fn test_runs_sequentially_in_order() {
        let dir = tempdir().unwrap();
        for name in ["c.sh", "a.sh", "b.sh"] {
            script(dir.path(), name, "exit 0", true);
        }
        let spy = Arc::new(
            SpyExecutor::new().on("a.sh", Scripted::exit(0).delay(Duration::from_millis(50))),
        );
        let (runner, _) = make_runner(&config(dir.path()));

        let run = runner.with_executor(spy.clone()).run().await;
        let names: Vec<&str> = run.records.iter().map(|r| r.file.as_str()).collect();
        assert_eq!(names, vec!["a.sh", "b.sh", "c.sh"]);
        assert_eq!(spy.max_in_flight(), 1);
    }

    #[tokio::test]
    async fn test_selector_and_missing_dir() {
        let dir = fixture();
        let mut cfg = config(dir.path());
        cfg.file = Some("run.sh".to_string());
        let (runner, _) = make_runner(&cfg);
        let run = runner.with_executor(Arc::new(SpyExecutor::new())).run().await;
        assert_eq!(run.records.len(), 1);

        cfg.file = Some("absent.sh".to_string());
        let (runner, sink) = make_runner(&cfg);
        assert!(runner.run().await.is_empty());
        assert!(sink.contains("[ERROR] specified file 'absent.sh'"));

        let (runner, sink) = make_runner(&config(&dir.path().join("gone")));
        assert!(runner.run().await.is_empty());
        assert!(sink.contains("[WARNING] Shell directory"));
    }
}
