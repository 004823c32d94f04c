use super::LineScanner;
use crate::error::{Error, Result};
use crate::index::types::SearchResults;
use crate::utils::{MarkupSuffixes, is_listed, relative_path};
use std::path::{Path, PathBuf};
use std::process::Command;

/// Exit status grep uses for "no lines selected"
const NO_MATCH_STATUS: i32 = 1;

/// Scanner that shells out to `grep -Hir`
#[derive(Debug, Clone)]
pub struct GrepScanner {
    program: PathBuf,
}

impl Default for GrepScanner {
    fn default() -> Self {
        Self {
            program: PathBuf::from("grep"),
        }
    }
}

impl GrepScanner {
    /// Use a specific grep binary
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl LineScanner for GrepScanner {
    fn scan(&self, text: &str, root: &Path, suffixes: &MarkupSuffixes) -> Result<SearchResults> {
        let output = Command::new(&self.program)
            .args(["-H", "-i", "-r", "--null", "-e"])
            .arg(text)
            .arg(root)
            .output()
            .map_err(|e| Error::Search(format!("cannot run {}: {}", self.program.display(), e)))?;

        match output.status.code() {
            Some(0) => Ok(parse_output(&output.stdout, root, suffixes)),
            Some(NO_MATCH_STATUS) => Ok(SearchResults::new()),
            status => Err(Error::Search(format!(
                "{} exited with {}: {} {}",
                self.program.display(),
                status.map_or_else(|| "a signal".to_string(), |c| format!("status {}", c)),
                String::from_utf8_lossy(&output.stdout).trim(),
                String::from_utf8_lossy(&output.stderr).trim()
            ))),
        }
    }

    fn name(&self) -> &'static str {
        "grep"
    }
}

/// Parse `path\0line` records, keeping the files the markup walk would yield
pub fn parse_output(stdout: &[u8], root: &Path, suffixes: &MarkupSuffixes) -> SearchResults {
    let mut results = SearchResults::new();

    for record in stdout.split(|&b| b == b'\n') {
        let Some(split) = record.iter().position(|&b| b == 0) else {
            continue;
        };
        let Ok(path) = std::str::from_utf8(&record[..split]) else {
            continue;
        };
        let line = String::from_utf8_lossy(&record[split + 1..]);

        let path = Path::new(path);
        if !suffixes.matches(path) {
            continue;
        }
        let Some(rel) = relative_path(root, path) else {
            continue;
        };
        if !is_listed(&rel) {
            continue;
        }

        results
            .entry(rel)
            .or_default()
            .push(line.trim_end_matches('\r').to_string());
    }
    results
}
