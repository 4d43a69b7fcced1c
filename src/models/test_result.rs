//! Test result models
//!
//! Defines result records, status types and suite summaries.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of a single test artifact
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TestStatus {
    Success,
    Failed,
    Skipped,
}

impl TestStatus {
    /// Short tag used on console status lines
    pub fn tag(&self) -> &'static str {
        match self {
            TestStatus::Success => "OK",
            TestStatus::Failed => "FAIL",
            TestStatus::Skipped => "SKIP",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, TestStatus::Success)
    }
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestStatus::Success => write!(f, "SUCCESS"),
            TestStatus::Failed => write!(f, "FAILED"),
            TestStatus::Skipped => write!(f, "SKIPPED"),
        }
    }
}

/// Suite that produced a record
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TestType {
    Sql,
    Shell,
}

impl TestType {
    /// Prefix used on console status lines
    pub fn console_label(&self) -> &'static str {
        match self {
            TestType::Sql => "SQL",
            TestType::Shell => "BASH",
        }
    }

    /// File extension of the artifacts this suite discovers
    pub fn extension(&self) -> &'static str {
        match self {
            TestType::Sql => "sql",
            TestType::Shell => "sh",
        }
    }
}

impl fmt::Display for TestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestType::Sql => write!(f, "SQL"),
            TestType::Shell => write!(f, "SHELL"),
        }
    }
}

/// Result of executing exactly one test artifact.
///
/// Records are never mutated once handed to a collector.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    /// Base name of the artifact
    pub file: String,
    pub status: TestStatus,
    /// Diagnostic text; informational when status is SUCCESS
    pub error: Option<String>,
    /// Wall-clock seconds for this single execution
    pub duration: f64,
    #[serde(rename = "type")]
    pub test_type: TestType,
}

impl TestResult {
    pub fn success(file: impl Into<String>, test_type: TestType, duration: f64) -> Self {
        Self {
            file: file.into(),
            status: TestStatus::Success,
            error: None,
            duration,
            test_type,
        }
    }

    pub fn failed(
        file: impl Into<String>,
        test_type: TestType,
        duration: f64,
        error: impl Into<String>,
    ) -> Self {
        Self {
            file: file.into(),
            status: TestStatus::Failed,
            error: Some(error.into()),
            duration,
            test_type,
        }
    }

    pub fn skipped(
        file: impl Into<String>,
        test_type: TestType,
        duration: f64,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            file: file.into(),
            status: TestStatus::Skipped,
            error: Some(reason.into()),
            duration,
            test_type,
        }
    }

    /// Attach an advisory note to a successful record
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.error = Some(note.into());
        self
    }
}

impl fmt::Display for TestResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{} {}] {} ({:.3}s)",
            self.test_type.console_label(),
            self.status.tag(),
            self.file,
            self.duration
        )
    }
}

/// Records produced by one runner invocation plus its wall-clock window
#[derive(Clone, Debug)]
pub struct SuiteRun {
    pub test_type: TestType,
    pub start_time: DateTime<Local>,
    pub end_time: DateTime<Local>,
    /// Completion order for SQL, discovery order for shell
    pub records: Vec<TestResult>,
}

impl SuiteRun {
    pub fn empty(test_type: TestType, at: DateTime<Local>) -> Self {
        Self {
            test_type,
            start_time: at,
            end_time: at,
            records: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary::from_records(&self.records)
    }
}

/// Counts by status, always derived from a record list
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub total: usize,
    pub success: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl RunSummary {
    pub fn from_records(records: &[TestResult]) -> Self {
        let count = |status: TestStatus| records.iter().filter(|r| r.status == status).count();

        Self {
            total: records.len(),
            success: count(TestStatus::Success),
            failed: count(TestStatus::Failed),
            skipped: count(TestStatus::Skipped),
        }
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Total: {}, Success: {}, Failed: {}, Skipped: {}",
            self.total, self.success, self.failed, self.skipped
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serializes_uppercase() {
        let json = serde_json::to_string(&TestStatus::Skipped).unwrap();
        assert_eq!(json, "\"SKIPPED\"");
        let json = serde_json::to_string(&TestType::Shell).unwrap();
        assert_eq!(json, "\"SHELL\"");
    }

    #[test]
    fn test_record_json_shape() {
        let record = TestResult::failed("b.sql", TestType::Sql, 0.5, "boom");
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["file"], "b.sql");
        assert_eq!(value["status"], "FAILED");
        assert_eq!(value["error"], "boom");
        assert_eq!(value["type"], "SQL");

        let ok = serde_json::to_value(TestResult::success("a.sql", TestType::Sql, 0.1)).unwrap();
        assert!(ok["error"].is_null());
    }

    #[test]
    fn test_record_display() {
        let record = TestResult::skipped("setup.sh", TestType::Shell, 0.0012, "no perms");
        assert_eq!(record.to_string(), "[BASH SKIP] setup.sh (0.001s)");
    }

    #[test]
    fn test_run_summary() {
        let records = vec![
            TestResult::success("a.sql", TestType::Sql, 0.1),
            TestResult::success("c.sql", TestType::Sql, 0.1).with_note("ignored"),
            TestResult::failed("b.sql", TestType::Sql, 0.2, "exit 1"),
            TestResult::skipped("setup.sh", TestType::Shell, 0.0, "not executable"),
        ];

        let summary = RunSummary::from_records(&records);
        assert_eq!(
            summary,
            RunSummary {
                total: 4,
                success: 2,
                failed: 1,
                skipped: 1
            }
        );
        assert!(summary.has_failures());
        assert_eq!(
            summary.to_string(),
            "Total: 4, Success: 2, Failed: 1, Skipped: 1"
        );
    }

    #[test]
    fn test_empty_suite_run() {
        let run = SuiteRun::empty(TestType::Shell, Local::now());
        assert!(run.is_empty());
        assert_eq!(run.summary(), RunSummary::default());
    }
}
