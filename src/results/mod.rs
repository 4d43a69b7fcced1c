//! Result collection and reporting
//!
//! Provides the shared record collector, report file layout and the
//! JSON/HTML/CSV report writers.

mod collector;
mod report;
mod storage;

pub use collector::ResultCollector;
pub use report::{CsvReportWriter, HtmlReportWriter, JsonReportWriter, ReportAggregator};
pub use storage::{absolute, ReportPaths};
