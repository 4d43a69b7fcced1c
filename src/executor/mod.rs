//! Test execution engine
//!
//! Provides process execution, discovery, outcome classification and the
//! concurrent SQL / sequential shell suite runners.

mod classify;
mod discovery;
mod process;
mod shell;
mod sql;

#[cfg(test)]
pub(crate) mod testing;

pub use classify::{IgnorableErrorPolicy, PatternError, DEFAULT_IGNORE_PATTERN};
pub use discovery::{discover, TestFile};
pub use shell::ShellSuiteRunner;
pub use sql::SqlSuiteRunner;
