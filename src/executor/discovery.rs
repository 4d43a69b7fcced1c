//! Test file discovery
//!
//! Lists candidate artifacts in a directory, or validates one explicitly
//! named file. Results are sorted lexicographically by file name.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Discovery failures; each one empties the affected suite
#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("directory '{}' not found", .0.display())]
    DirectoryNotFound(PathBuf),

    #[error("specified file '{file}' not found or is not a .{extension} file in '{}'", .dir.display())]
    InvalidSelection {
        file: String,
        dir: PathBuf,
        extension: String,
    },

    #[error("failed to read directory '{}': {source}", .dir.display())]
    Unreadable {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A discovered test artifact
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TestFile {
    pub path: PathBuf,
    /// Base name, used as the record identifier
    pub name: String,
}

impl TestFile {
    pub fn new(path: PathBuf) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self { path, name }
    }
}

/// Discover files with `extension` in `dir`, or just `selector` when given
pub fn discover(
    dir: &Path,
    extension: &str,
    selector: Option<&str>,
) -> Result<Vec<TestFile>, DiscoveryError> {
    if !dir.exists() {
        return Err(DiscoveryError::DirectoryNotFound(dir.to_path_buf()));
    }

    if let Some(file) = selector {
        let path = dir.join(file);
        if path.is_file() && has_extension(&path, extension) {
            return Ok(vec![TestFile::new(path)]);
        }
        return Err(DiscoveryError::InvalidSelection {
            file: file.to_string(),
            dir: dir.to_path_buf(),
            extension: extension.to_string(),
        });
    }

    let entries = std::fs::read_dir(dir).map_err(|source| DiscoveryError::Unreadable {
        dir: dir.to_path_buf(),
        source,
    })?;

    let mut files: Vec<TestFile> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && has_extension(path, extension))
        .map(TestFile::new)
        .collect();

    files.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(files)
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension().map(|e| e == extension).unwrap_or(false)
}
