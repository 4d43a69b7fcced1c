//! Timer utilities
//!
//! Provides timing helpers for per-file and per-suite measurements.

use chrono::{DateTime, Duration as ChronoDuration, Local};
use std::time::{Duration, Instant};

/// Simple timer for measuring elapsed time
#[derive(Debug)]
pub struct Timer {
    start: Instant,
    label: String,
}

impl Timer {
    /// Create and start a new timer
    pub fn start(label: impl Into<String>) -> Self {
        Self {
            start: Instant::now(),
            label: label.into(),
        }
    }

    /// Get elapsed time
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Stop timer and return elapsed seconds
    pub fn stop(self) -> f64 {
        let elapsed = self.elapsed();
        tracing::debug!("{}: {}ms", self.label, elapsed.as_millis());
        elapsed.as_secs_f64()
    }
}

/// Format a local timestamp as `YYYY-mm-dd HH:MM:SS.ffffff`
pub fn format_timestamp(dt: &DateTime<Local>) -> String {
    dt.format("%Y-%m-%d %H:%M:%S%.6f").to_string()
}

/// Timestamp used in report file names
pub fn file_stamp(dt: &DateTime<Local>) -> String {
    dt.format("%Y%m%d_%H%M%S").to_string()
}

/// Format a wall-clock window as `H:MM:SS.ffffff`
pub fn format_duration(duration: ChronoDuration) -> String {
    let total_micros = duration.num_microseconds().unwrap_or(i64::MAX).max(0);
    let micros = total_micros % 1_000_000;
    let total_secs = total_micros / 1_000_000;
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    format!("{hours}:{minutes:02}:{seconds:02}.{micros:06}")
}
