//! Report generation for suite results
//!
//! Merges the records of every suite into one snapshot and hands it to
//! independent writers. A failing writer is logged and never stops the
//! others or changes the run's exit status.

use std::fmt::Write as _;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::{RunSummary, TestResult, TestStatus};
use crate::utils::timer::{format_duration, format_timestamp};
use crate::utils::RunLog;

/// Structured snapshot of one invocation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReportData {
    pub start_time: String,
    pub end_time: String,
    pub duration: String,
    pub summary: RunSummary,
    pub results: Vec<TestResult>,
}

impl ReportData {
    pub fn new(start: DateTime<Local>, end: DateTime<Local>, results: Vec<TestResult>) -> Self {
        Self {
            start_time: format_timestamp(&start),
            end_time: format_timestamp(&end),
            duration: format_duration(end - start),
            summary: RunSummary::from_records(&results),
            results,
        }
    }
}

/// One serialized form of the snapshot
pub trait ReportWriter {
    /// Name used in log lines, e.g. "JSON"
    fn label(&self) -> &'static str;

    fn write(&self, data: &ReportData, path: &Path) -> Result<()>;
}

/// Machine-readable JSON, four-space indented
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonReportWriter;

impl ReportWriter for JsonReportWriter {
    fn label(&self) -> &'static str {
        "JSON"
    }

    fn write(&self, data: &ReportData, path: &Path) -> Result<()> {
        let file = File::create(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        let mut writer = BufWriter::new(file);

        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut writer, formatter);
        data.serialize(&mut serializer)
            .context("Failed to serialize report")?;

        writer.flush().context("Failed to flush JSON report")?;
        Ok(())
    }
}

/// Self-contained HTML document
#[derive(Clone, Copy, Debug, Default)]
pub struct HtmlReportWriter;

impl HtmlReportWriter {
    pub fn render(&self, data: &ReportData) -> Result<String, std::fmt::Error> {
        let mut output = String::new();
        let summary = &data.summary;

        writeln!(output, r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Test Report - {}</title>
    <style>
        body {{ font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; margin: 40px; background: #f5f5f5; }}
        .container {{ max-width: 1200px; margin: 0 auto; background: white; padding: 40px; border-radius: 8px; box-shadow: 0 2px 4px rgba(0,0,0,0.1); }}
        h1 {{ color: #333; border-bottom: 2px solid #007bff; padding-bottom: 10px; }}
        h2 {{ color: #555; margin-top: 30px; }}
        table {{ width: 100%; border-collapse: collapse; margin: 20px 0; }}
        th, td {{ padding: 12px; text-align: left; border-bottom: 1px solid #ddd; vertical-align: top; }}
        th {{ background: #007bff; color: white; }}
        tr:hover {{ background: #f8f9fa; }}
        .success {{ color: #28a745; font-weight: bold; }}
        .failed {{ color: #dc3545; font-weight: bold; }}
        .skipped {{ color: #d39e00; font-weight: bold; }}
        .error {{ font-family: monospace; white-space: pre-wrap; color: #555; }}
        .stat-card {{ display: inline-block; background: #f8f9fa; padding: 20px; margin: 10px; border-radius: 8px; min-width: 150px; text-align: center; }}
        .stat-value {{ font-size: 24px; font-weight: bold; color: #007bff; }}
        .stat-label {{ color: #666; font-size: 14px; }}
    </style>
</head>
<body>
    <div class="container">
        <h1>Test Report</h1>

        <h2>Summary</h2>"#, escape(&data.start_time))?;

        for (value, label) in [
            (summary.total, "Total"),
            (summary.success, "Success"),
            (summary.failed, "Failed"),
            (summary.skipped, "Skipped"),
        ] {
            writeln!(
                output,
                r#"        <div class="stat-card">
            <div class="stat-value">{value}</div>
            <div class="stat-label">{label}</div>
        </div>"#
            )?;
        }

        writeln!(
            output,
            r#"
        <table>
            <tr><th>Property</th><th>Value</th></tr>
            <tr><td>Started</td><td>{}</td></tr>
            <tr><td>Finished</td><td>{}</td></tr>
            <tr><td>Duration</td><td>{}</td></tr>
        </table>

        <h2>Results</h2>
        <table>
            <tr>
                <th>File</th>
                <th>Type</th>
                <th>Status</th>
                <th>Duration</th>
                <th>Details</th>
            </tr>"#,
            escape(&data.start_time),
            escape(&data.end_time),
            escape(&data.duration)
        )?;

        for result in &data.results {
            writeln!(
                output,
                r#"            <tr>
                <td>{}</td>
                <td>{}</td>
                <td class="{}">{}</td>
                <td>{:.3}s</td>
                <td class="error">{}</td>
            </tr>"#,
                escape(&result.file),
                result.test_type,
                status_class(result.status),
                result.status,
                result.duration,
                escape(result.error.as_deref().unwrap_or(""))
            )?;
        }

        writeln!(
            output,
            r#"        </table>
    </div>
</body>
</html>"#
        )?;

        Ok(output)
    }
}

impl ReportWriter for HtmlReportWriter {
    fn label(&self) -> &'static str {
        "HTML"
    }

    fn write(&self, data: &ReportData, path: &Path) -> Result<()> {
        let html = self.render(data).context("Failed to render HTML report")?;
        std::fs::write(path, html)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }
}

/// Flat CSV export of the records
#[derive(Clone, Copy, Debug, Default)]
pub struct CsvReportWriter;

impl ReportWriter for CsvReportWriter {
    fn label(&self) -> &'static str {
        "CSV"
    }

    fn write(&self, data: &ReportData, path: &Path) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;

        writer.write_record(["file", "type", "status", "duration", "error"])?;
        for result in &data.results {
            writer.write_record([
                result.file.clone(),
                result.test_type.to_string(),
                result.status.to_string(),
                format!("{:.3}", result.duration),
                result.error.clone().unwrap_or_default(),
            ])?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// What happened during report generation
#[derive(Debug)]
pub struct ReportOutcome {
    pub data: ReportData,
    pub written: Vec<PathBuf>,
    pub failed: Vec<PathBuf>,
}

/// Merges suite records and drives every configured writer
pub struct ReportAggregator {
    outputs: Vec<(Box<dyn ReportWriter>, PathBuf)>,
    log: RunLog,
}

impl ReportAggregator {
    pub fn new(log: RunLog) -> Self {
        Self {
            outputs: Vec::new(),
            log,
        }
    }

    pub fn with_writer(mut self, writer: impl ReportWriter + 'static, path: PathBuf) -> Self {
        self.outputs.push((Box::new(writer), path));
        self
    }

    /// Build the snapshot and serialize it. Records keep their given order.
    pub fn generate(
        &self,
        start: DateTime<Local>,
        end: DateTime<Local>,
        records: Vec<TestResult>,
    ) -> ReportOutcome {
        self.log.detail("\n--- Generating Reports ---");

        let data = ReportData::new(start, end, records);
        let mut written = Vec::new();
        let mut failed = Vec::new();

        for (writer, path) in &self.outputs {
            debug!("Writing {} report to {}", writer.label(), path.display());
            match writer.write(&data, path) {
                Ok(()) => {
                    self.log.detail(&format!(
                        "[INFO] {} report saved to {}",
                        writer.label(),
                        path.display()
                    ));
                    written.push(path.clone());
                }
                Err(e) => {
                    self.log.summary(
                        &format!(
                            "[ERROR] Failed to save {} report to {}: {:#}",
                            writer.label(),
                            path.display(),
                            e
                        ),
                        true,
                    );
                    failed.push(path.clone());
                }
            }
        }

        ReportOutcome {
            data,
            written,
            failed,
        }
    }
}

fn status_class(status: TestStatus) -> &'static str {
    match status {
        TestStatus::Success => "success",
        TestStatus::Failed => "failed",
        TestStatus::Skipped => "skipped",
    }
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TestType;
    use crate::utils::MemoryLogSink;
    use chrono::Duration;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn records() -> Vec<TestResult> {
        vec![
            TestResult::success("a.sql", TestType::Sql, 0.25),
            TestResult::failed(
                "b.sql",
                TestType::Sql,
                0.5,
                "psql execution failed. Exit Code: 1. Error: ERROR: permission denied",
            ),
            TestResult::skipped("setup.sh", TestType::Shell, 0.0, "chmod <x> & retry"),
        ]
    }

    fn window() -> (DateTime<Local>, DateTime<Local>) {
        let start = Local::now();
        (start, start + Duration::milliseconds(1500))
    }

    #[test]
    fn test_report_data() {
        let (start, end) = window();
        let data = ReportData::new(start, end, records());

        assert_eq!(data.duration, "0:00:01.500000");
        assert_eq!(data.summary.total, 3);
        assert_eq!(data.summary.failed, 1);
        assert_eq!(data.results[1].file, "b.sql");
    }

    #[test]
    fn test_json_writer_four_space_indent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("r.json");
        let (start, end) = window();
        let data = ReportData::new(start, end, records());

        JsonReportWriter.write(&data, &path).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("\n    \"start_time\""));

        let parsed: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed["summary"]["skipped"], 1);
        assert_eq!(parsed["results"][0]["type"], "SQL");
        assert_eq!(parsed["results"][2]["status"], "SKIPPED");
        assert!(parsed["results"][0]["error"].is_null());
    }

    #[test]
    fn test_html_escapes_details() {
        let (start, end) = window();
        let data = ReportData::new(start, end, records());
        let html = HtmlReportWriter.render(&data).unwrap();

        assert!(html.contains("chmod &lt;x&gt; &amp; retry"));
        assert!(html.contains(r#"<td class="failed">FAILED</td>"#));
        assert!(html.contains(r#"<div class="stat-value">3</div>"#));
    }

    #[test]
    fn test_csv_writer() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("r.csv");
        let (start, end) = window();

        CsvReportWriter
            .write(&ReportData::new(start, end, records()), &path)
            .unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        let mut lines = content.lines();
        assert_eq!(lines.next(), Some("file,type,status,duration,error"));
        assert_eq!(lines.next(), Some("a.sql,SQL,SUCCESS,0.250,"));
    }

    #[test]
    fn test_writer_failure_does_not_stop_others() {
        let dir = tempdir().unwrap();
        let sink = Arc::new(MemoryLogSink::new());
        let bad_path = dir.path().join("missing").join("r.json");
        let good_path = dir.path().join("r.html");

        let aggregator = ReportAggregator::new(RunLog::new(sink.clone()).quiet())
            .with_writer(JsonReportWriter, bad_path.clone())
            .with_writer(HtmlReportWriter, good_path.clone());

        let (start, end) = window();
        let outcome = aggregator.generate(start, end, records());

        assert_eq!(outcome.failed, vec![bad_path]);
        assert_eq!(outcome.written, vec![good_path.clone()]);
        assert!(good_path.exists());
        assert!(sink.contains("[ERROR] Failed to save JSON report"));
        assert!(sink.contains("[INFO] HTML report saved to"));
        assert_eq!(outcome.data.summary.total, 3);
    }
}
