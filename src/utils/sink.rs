//! Detailed execution log
//!
//! The log sink is passed explicitly into every runner. Implementations must
//! keep each `write_line` call atomic with respect to concurrent writers.

use anyhow::{Context, Result};
use chrono::Local;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Destination for detailed log lines
pub trait LogSink: Send + Sync {
    /// Write one logical message. Multi-line messages stay contiguous.
    fn write_line(&self, line: &str);

    fn flush(&self);
}

/// Log sink backed by a file, one timestamp per message
pub struct FileLogSink {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
}

impl FileLogSink {
    /// Create (truncate) the log file
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::create(path)
            .with_context(|| format!("Could not open log file {}", path.display()))?;

        Ok(Self {
            path: path.to_path_buf(),
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LogSink for FileLogSink {
    fn write_line(&self, line: &str) {
        let stamp = Local::now().format("%Y-%m-%d %H:%M:%S");
        let mut writer = match self.writer.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let written = writeln!(writer, "{stamp} - {line}").and_then(|_| writer.flush());
        if let Err(e) = written {
            tracing::error!("Failed to write to {}: {}", self.path.display(), e);
        }
    }

    fn flush(&self) {
        let mut writer = match self.writer.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Err(e) = writer.flush() {
            tracing::error!("Failed to flush {}: {}", self.path.display(), e);
        }
    }
}

/// In-memory sink for runner tests
#[cfg(test)]
#[derive(Default)]
pub struct MemoryLogSink {
    lines: Mutex<Vec<String>>,
}

#[cfg(test)]
impl MemoryLogSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().map(|l| l.clone()).unwrap_or_default()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines().iter().any(|l| l.contains(needle))
    }
}

#[cfg(test)]
impl LogSink for MemoryLogSink {
    fn write_line(&self, line: &str) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(line.to_string());
        }
    }

    fn flush(&self) {}
}

/// Handle used by runners: detail goes to the sink only, summaries are echoed
/// to the console as well.
#[derive(Clone)]
pub struct RunLog {
    sink: Arc<dyn LogSink>,
    console: bool,
}

impl RunLog {
    pub fn new(sink: Arc<dyn LogSink>) -> Self {
        Self {
            sink,
            console: true,
        }
    }

    /// Keep summaries out of stdout/stderr
    pub fn quiet(mut self) -> Self {
        self.console = false;
        self
    }

    /// Detailed log only
    pub fn detail(&self, message: &str) {
        self.sink.write_line(message.trim());
    }

    /// Detailed log plus one console line
    pub fn summary(&self, message: &str, is_error: bool) {
        let message = message.trim();
        self.sink.write_line(message);

        if self.console {
            if is_error {
                eprintln!("{message}");
            } else {
                println!("{message}");
            }
        }
    }

    pub fn flush(&self) {
        self.sink.flush();
    }
}
