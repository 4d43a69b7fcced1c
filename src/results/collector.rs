//! Append-only result collection
//!
//! Records are kept in the order they were appended. For the concurrent SQL
//! suite that is completion order, not submission order; callers must not
//! re-sort.

use std::sync::{Mutex, MutexGuard};

use crate::models::TestResult;

/// Thread-safe, append-only sequence of records
#[derive(Debug, Default)]
pub struct ResultCollector {
    records: Mutex<Vec<TestResult>>,
}

impl ResultCollector {
    pub fn new() -> Self {
        Self::default()
    }

    fn guard(&self) -> MutexGuard<'_, Vec<TestResult>> {
        // A panicking writer cannot leave a half-pushed record behind.
        match self.records.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn push(&self, record: TestResult) {
        self.guard().push(record);
    }

    /// Copy of the records appended so far
    pub fn snapshot(&self) -> Vec<TestResult> {
        self.guard().clone()
    }

    pub fn into_records(self) -> Vec<TestResult> {
        match self.records.into_inner() {
            Ok(records) => records,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
