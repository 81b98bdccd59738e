//! Reading target lists.
//!
//! One target per line. Blank lines and lines starting with `#` or `;` are
//! skipped.

use crate::model::Target;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Reads and normalizes the targets listed in `path`.
pub fn read_targets(path: &Path) -> Result<Vec<Target>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read target list {}", path.display()))?;
    Ok(parse_targets(&content))
}

/// Parses a newline-delimited target list.
pub fn parse_targets(content: &str) -> Vec<Target> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.starts_with('#') && !line.starts_with(';'))
        .filter_map(Target::parse)
        .collect()
}
