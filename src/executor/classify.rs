//! SQL outcome classification
//!
//! Decides whether a non-zero client exit is a real failure or a known-benign
//! condition. The match runs on free-text stderr from an external tool, so
//! every supported client version needs a fixture that pins the wording.

use regex::{Regex, RegexBuilder};
use thiserror::Error;

/// Matches `ERROR:  role "x" does not exist` as printed by psql
pub const DEFAULT_IGNORE_PATTERN: &str = r#"ERROR:  role ".*" does not exist"#;

#[derive(Error, Debug)]
#[error("invalid ignore pattern '{pattern}': {source}")]
pub struct PatternError {
    pub pattern: String,
    #[source]
    pub source: regex::Error,
}

/// Verdict for one client invocation
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Classification {
    /// Exit code 0
    Clean,
    /// Non-zero exit whose stderr matched an ignorable pattern
    Ignored,
    Failed,
}

/// Pluggable `(exit_code, stderr) -> verdict` predicate
pub trait OutcomeClassifier: Send + Sync {
    fn classify(&self, exit_code: i32, stderr: &str) -> Classification;
}

/// Case-insensitive regular expressions whose match downgrades a failure
#[derive(Clone, Debug)]
pub struct IgnorableErrorPolicy {
    patterns: Vec<Regex>,
}

impl IgnorableErrorPolicy {
    pub fn new<I, S>(patterns: I) -> Result<Self, PatternError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .map(|p| {
                let p = p.as_ref();
                RegexBuilder::new(p)
                    .case_insensitive(true)
                    .build()
                    .map_err(|source| PatternError {
                        pattern: p.to_string(),
                        source,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { patterns })
    }

    /// Never downgrades anything
    pub fn strict() -> Self {
        Self {
            patterns: Vec::new(),
        }
    }

    pub fn is_ignorable(&self, stderr: &str) -> bool {
        !stderr.is_empty() && self.patterns.iter().any(|re| re.is_match(stderr))
    }
}

impl Default for IgnorableErrorPolicy {
    fn default() -> Self {
        Self::new([DEFAULT_IGNORE_PATTERN]).unwrap_or_else(|_| Self::strict())
    }
}

impl OutcomeClassifier for IgnorableErrorPolicy {
    fn classify(&self, exit_code: i32, stderr: &str) -> Classification {
        if exit_code == 0 {
            Classification::Clean
        } else if self.is_ignorable(stderr) {
            Classification::Ignored
        } else {
            Classification::Failed
        }
    }
}
