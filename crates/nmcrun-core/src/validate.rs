//! Post-write content check
//!
//! A file made only of `#` comment lines (headers, error placeholders) is
//! reported so the operator knows it carries no cluster data.

use crate::types::EmptyContentWarning;
use std::path::Path;

#[derive(Debug, Clone, Copy, Default)]
pub struct ContentValidator;

impl ContentValidator {
    /// `Err` when every non-blank line is a comment, or the file is empty or unreadable
    pub fn check(&self, path: &Path) -> Result<(), EmptyContentWarning> {
        let warning = || EmptyContentWarning {
            path: path.to_path_buf(),
        };

        let content = std::fs::read_to_string(path).map_err(|_| warning())?;
        if has_content(&content) {
            Ok(())
        } else {
            Err(warning())
        }
    }
}

fn has_content(text: &str) -> bool {
    text.lines()
        .map(str::trim)
        .any(|line| !line.is_empty() && !line.starts_with('#'))
}
