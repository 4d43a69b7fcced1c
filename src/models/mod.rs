//! Data models for suite execution
//!
//! This module contains all data structures shared by the runners and reports.

mod database;
mod test_result;

pub use database::{DatabaseConfig, PASSWORD_ENV};
pub use test_result::{RunSummary, SuiteRun, TestResult, TestStatus, TestType};
