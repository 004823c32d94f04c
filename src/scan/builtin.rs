use super::LineScanner;
use crate::error::{Error, Result};
use crate::index::types::SearchResults;
use crate::utils::{MarkupSuffixes, MarkupWalker, relative_path};
use rayon::prelude::*;
use regex::{Regex, RegexBuilder};
use std::fs;
use std::path::{Path, PathBuf};

/// In-process scanner: walks with the markup enumerator and matches lines
/// with a case-insensitive regex
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinScanner;

/// Compile `text` as a case-insensitive pattern, or as a literal when it is
/// not a valid regex
pub fn build_matcher(text: &str) -> Result<Regex> {
    RegexBuilder::new(text)
        .case_insensitive(true)
        .build()
        .or_else(|_| {
            RegexBuilder::new(&regex::escape(text))
                .case_insensitive(true)
                .build()
        })
        .map_err(|e| Error::Search(format!("invalid pattern {:?}: {}", text, e)))
}

fn matching_lines(matcher: &Regex, path: &Path) -> Result<Vec<String>> {
    let bytes = fs::read(path).map_err(|e| Error::Search(format!("cannot read {}: {}", path.display(), e)))?;
    let content = String::from_utf8_lossy(&bytes);
    Ok(content
        .lines()
        .filter(|line| matcher.is_match(line))
        .map(str::to_string)
        .collect())
}

impl LineScanner for BuiltinScanner {
    fn scan(&self, text: &str, root: &Path, suffixes: &MarkupSuffixes) -> Result<SearchResults> {
        let matcher = build_matcher(text)?;

        let files: Vec<(String, PathBuf)> = MarkupWalker::new(root, suffixes)
            .iter()
            .filter_map(|abs| relative_path(root, &abs).map(|rel| (rel, abs)))
            .collect();

        let matches = files
            .par_iter()
            .map(|(rel, abs)| Ok((rel.clone(), matching_lines(&matcher, abs)?)))
            .collect::<Result<Vec<_>>>()?;

        Ok(matches
            .into_iter()
            .filter(|(_, lines)| !lines.is_empty())
            .collect())
    }

    fn name(&self) -> &'static str {
        "builtin"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree(files: &[(&str, &str)]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for (rel, content) in files {
            let path = dir.path().join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }
        dir
    }

    #[test]
    fn test_groups_lines_by_relative_path() {
        let dir = tree(&[
            ("a.md", "TODO fix bug\nsomething else\n"),
            ("notes/b.md", "nothing\ntodo: water plants\n"),
            ("c.txt", "TODO not markup\n"),
        ]);

        let results = BuiltinScanner
            .scan("TODO", dir.path(), &MarkupSuffixes::new([".md"]))
            .unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results["a.md"], vec!["TODO fix bug".to_string()]);
        assert_eq!(results["notes/b.md"], vec!["todo: water plants".to_string()]);
    }

    #[test]
    fn test_invalid_regex_falls_back_to_literal() {
        let dir = tree(&[("a.md", "call foo( now\n")]);
        let results = BuiltinScanner
            .scan("foo(", dir.path(), &MarkupSuffixes::default())
            .unwrap();
        assert_eq!(results["a.md"], vec!["call foo( now".to_string()]);
    }

    #[test]
    fn test_non_ascii_lines() {
        let dir = tree(&[("menu.md", "Un CAFÉ noir\n")]);
        let results = BuiltinScanner
            .scan("café", dir.path(), &MarkupSuffixes::default())
            .unwrap();
        assert_eq!(results["menu.md"], vec!["Un CAFÉ noir".to_string()]);
    }

    #[test]
    fn test_no_match_is_empty() {
        let dir = tree(&[("a.md", "hello\n")]);
        let results = BuiltinScanner
            .scan("absent", dir.path(), &MarkupSuffixes::default())
            .unwrap();
        assert!(results.is_empty());
    }
}
