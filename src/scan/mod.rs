//! Linear content search used when no index is configured.

pub mod builtin;
pub mod grep;

pub use builtin::BuiltinScanner;
pub use grep::GrepScanner;

use crate::config::ScannerKind;
use crate::error::Result;
use crate::index::types::SearchResults;
use crate::utils::MarkupSuffixes;
use std::path::{Path, PathBuf};

/// Case-insensitive line search over the markup files of a tree
pub trait LineScanner: Send + Sync {
    /// Matching lines grouped by path relative to `root`, in file order
    fn scan(&self, text: &str, root: &Path, suffixes: &MarkupSuffixes) -> Result<SearchResults>;

    fn name(&self) -> &'static str;
}

/// A [`LineScanner`] bound to one document tree
pub struct FallbackScanner {
    root: PathBuf,
    suffixes: MarkupSuffixes,
    scanner: Box<dyn LineScanner>,
}

impl FallbackScanner {
    pub fn new(root: &Path, suffixes: &MarkupSuffixes, kind: ScannerKind) -> Self {
        let scanner: Box<dyn LineScanner> = match kind {
            ScannerKind::Builtin => Box::new(BuiltinScanner),
            ScannerKind::Grep => Box::new(GrepScanner::default()),
        };
        Self::with_scanner(root, suffixes, scanner)
    }

    pub fn with_scanner(root: &Path, suffixes: &MarkupSuffixes, scanner: Box<dyn LineScanner>) -> Self {
        Self {
            root: root.to_path_buf(),
            suffixes: suffixes.clone(),
            scanner,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn scanner_name(&self) -> &'static str {
        self.scanner.name()
    }

    /// Blank text matches nothing
    pub fn scan(&self, text: &str) -> Result<SearchResults> {
        if text.trim().is_empty() {
            return Ok(SearchResults::new());
        }
        let results = self.scanner.scan(text, &self.root, &self.suffixes)?;
        log::debug!(
            "{} scan for {:?}: {} files matched",
            self.scanner.name(),
            text,
            results.len()
        );
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_blank_text_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.md"), "anything\n").unwrap();

        let scanner = FallbackScanner::new(dir.path(), &MarkupSuffixes::default(), ScannerKind::Builtin);
        assert!(scanner.scan("  ").unwrap().is_empty());
        assert_eq!(scanner.scanner_name(), "builtin");
    }
}
