//! Output formatting module
//!
//! Console rendering of run summaries and suite listings.

mod formatter;

pub use formatter::{OutputFormat, ResultFormatter};
