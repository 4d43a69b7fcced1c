//! Report directory layout
//!
//! Every artifact of one invocation shares a `<prefix>_<YYYYmmdd_HHMMSS>` base
//! name inside the report directory.

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::utils::timer::file_stamp;

/// Paths of the log and report files for one run
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReportPaths {
    pub dir: PathBuf,
    pub base_name: String,
}

impl ReportPaths {
    pub fn new(dir: impl Into<PathBuf>, prefix: &str, started: &DateTime<Local>) -> Self {
        Self {
            dir: dir.into(),
            base_name: format!("{prefix}_{}", file_stamp(started)),
        }
    }

    /// Create the report directory if needed.
    ///
    /// Returns `true` when the directory was created by this call.
    pub fn ensure_dir(&self) -> Result<bool> {
        if self.dir.is_dir() {
            return Ok(false);
        }
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create directory {}", self.dir.display()))?;
        info!("Created report directory {}", self.dir.display());
        Ok(true)
    }

    pub fn file(&self, extension: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", self.base_name, extension))
    }

    pub fn log(&self) -> PathBuf {
        self.file("log")
    }

    pub fn json(&self) -> PathBuf {
        self.file("json")
    }

    pub fn html(&self) -> PathBuf {
        self.file("html")
    }

    pub fn csv(&self) -> PathBuf {
        self.file("csv")
    }
}

/// Absolute form of `path` for console output, falling back to the input
pub fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    fs::canonicalize(path)
        .or_else(|_| std::env::current_dir().map(|cwd| cwd.join(path)))
        .unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::tempdir;

    #[test]
    fn test_paths_share_base_name() {
        let started = Local.with_ymd_and_hms(2025, 11, 4, 13, 45, 0).unwrap();
        let paths = ReportPaths::new("test_report", "nightly", &started);

        assert_eq!(paths.base_name, "nightly_20251104_134500");
        assert_eq!(
            paths.log(),
            PathBuf::from("test_report/nightly_20251104_134500.log")
        );
        assert_eq!(
            paths.json(),
            PathBuf::from("test_report/nightly_20251104_134500.json")
        );
        assert_eq!(paths.html().extension().unwrap(), "html");
        assert_eq!(paths.csv().extension().unwrap(), "csv");
    }

    #[test]
    fn test_ensure_dir() {
        let root = tempdir().unwrap();
        let paths = ReportPaths::new(root.path().join("reports"), "run", &Local::now());

        assert!(paths.ensure_dir().unwrap());
        assert!(!paths.ensure_dir().unwrap());
        assert!(paths.dir.is_dir());
    }

    #[test]
    fn test_ensure_dir_fails_on_file() {
        let root = tempdir().unwrap();
        let blocker = root.path().join("blocker");
        fs::write(&blocker, "x").unwrap();
        let paths = ReportPaths::new(blocker.join("reports"), "run", &Local::now());

        assert!(paths.ensure_dir().is_err());
    }
}
