//! Shared utilities
//!
//! Logging setup, the detailed run log and timing helpers.

pub mod logger;
pub mod sink;
pub mod timer;

pub use sink::{FileLogSink, RunLog};

#[cfg(test)]
pub use sink::MemoryLogSink;
pub use timer::Timer;
