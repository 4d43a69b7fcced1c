//! Console formatters for run summaries and suite listings
//!
//! Provides table and JSON output formats.

use serde::Serialize;
use std::path::Path;

use crate::executor::TestFile;
use crate::models::{RunSummary, TestType};

/// Output format options
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
}

impl OutputFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "table" => Some(OutputFormat::Table),
            "json" => Some(OutputFormat::Json),
            _ => None,
        }
    }
}

/// Result formatter
pub struct ResultFormatter {
    format: OutputFormat,
    colorize: bool,
}

impl ResultFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            colorize: true,
        }
    }

    pub fn no_color(mut self) -> Self {
        self.colorize = false;
        self
    }

    /// End-of-run block: header, counts and report locations.
    ///
    /// Always a table; the JSON report already carries the same data.
    pub fn format_summary(
        &self,
        summary: &RunSummary,
        html: Option<&Path>,
        json: Option<&Path>,
    ) -> String {
        let mut output = String::new();
        output.push_str("\n=== Test Completed Summary ===\n");
        output.push_str(&format!(
            "Total: {}, Success: {}, Failed: {}, Skipped: {}\n",
            summary.total,
            self.paint(summary.success, "32", summary.success > 0),
            self.paint(summary.failed, "31", summary.failed > 0),
            self.paint(summary.skipped, "33", summary.skipped > 0),
        ));
        if let Some(path) = html {
            output.push_str(&format!("HTML Report: {}\n", path.display()));
        }
        if let Some(path) = json {
            output.push_str(&format!("JSON Report: {}\n", path.display()));
        }
        output
    }

    /// Files one suite would execute
    pub fn format_listing(&self, test_type: TestType, dir: &Path, files: &[TestFile]) -> String {
        if self.format == OutputFormat::Json {
            #[derive(Serialize)]
            struct ListingJson<'a> {
                #[serde(rename = "type")]
                test_type: TestType,
                dir: &'a Path,
                files: Vec<&'a str>,
            }

            return serde_json::to_string_pretty(&ListingJson {
                test_type,
                dir,
                files: files.iter().map(|f| f.name.as_str()).collect(),
            })
            .unwrap_or_default();
        }

        let mut output = String::new();
        output.push_str(&format!(
            "{} tests in {} ({} files)\n",
            test_type,
            dir.display(),
            files.len()
        ));
        for (i, file) in files.iter().enumerate() {
            output.push_str(&format!("  {:3}. {}\n", i + 1, file.name));
        }
        output
    }

    fn paint(&self, value: usize, color: &str, highlight: bool) -> String {
        if self.colorize && highlight {
            format!("\x1b[{color}m{value}\x1b[0m")
        } else {
            value.to_string()
        }
    }
}

impl Default for ResultFormatter {
    fn default() -> Self {
        Self::new(OutputFormat::Table)
    }
}
