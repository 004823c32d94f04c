//! Recursive enumeration of markup files under a document root.
//!
//! The walk descends into every directory and ignores `.gitignore` and
//! friends: hiding is left to whoever displays the tree. A file is yielded
//! when its own name is listable (see [`is_listed_name`]), its suffix is
//! configured and its path relative to the root is valid UTF-8.

use ignore::{Walk, WalkBuilder};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

/// Extension of the sidecar entries that hold a document's attachments
const RESOURCES_EXTENSION: &str = "resources";

/// Set of file suffixes (leading dot included) treated as markup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "Vec<String>", from = "Vec<String>")]
pub struct MarkupSuffixes(BTreeSet<String>);

impl MarkupSuffixes {
    /// Build a suffix set. Entries are trimmed and given a leading dot when
    /// missing; blank entries are dropped.
    pub fn new<I, S>(suffixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let set = suffixes
            .into_iter()
            .filter_map(|s| {
                let s = s.as_ref().trim();
                if s.is_empty() {
                    None
                } else if s.starts_with('.') {
                    Some(s.to_string())
                } else {
                    Some(format!(".{}", s))
                }
            })
            .collect();
        MarkupSuffixes(set)
    }

    /// Parse the comma-separated form used by older config files (`.md, .org`)
    pub fn from_comma_list(list: &str) -> Self {
        Self::new(list.split(','))
    }

    /// Case-sensitive extension test
    pub fn matches(&self, path: &Path) -> bool {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) => self.0.iter().any(|s| &s[1..] == ext),
            None => false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl Default for MarkupSuffixes {
    fn default() -> Self {
        MarkupSuffixes::new([".md", ".org"])
    }
}

impl From<Vec<String>> for MarkupSuffixes {
    fn from(list: Vec<String>) -> Self {
        MarkupSuffixes::new(list)
    }
}

impl From<MarkupSuffixes> for Vec<String> {
    fn from(suffixes: MarkupSuffixes) -> Self {
        suffixes.0.into_iter().collect()
    }
}

/// False for dot-named entries and `.resources` sidecars. Applies to a
/// file's own name only; directories are always descended into.
pub fn is_listed_name(name: &OsStr) -> bool {
    if name.as_encoded_bytes().starts_with(b".") {
        return false;
    }
    Path::new(name).extension() != Some(OsStr::new(RESOURCES_EXTENSION))
}

/// [`is_listed_name`] applied to the last component of a relative path
pub fn is_listed(rel: &str) -> bool {
    match rel.rsplit('/').next() {
        Some(name) => is_listed_name(OsStr::new(name)),
        None => false,
    }
}

/// Restartable description of a markup walk. Each call to [`MarkupWalker::iter`]
/// walks the tree afresh.
#[derive(Debug, Clone)]
pub struct MarkupWalker {
    root: PathBuf,
    suffixes: MarkupSuffixes,
}

impl MarkupWalker {
    pub fn new(root: &Path, suffixes: &MarkupSuffixes) -> Self {
        Self {
            root: root.to_path_buf(),
            suffixes: suffixes.clone(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Start a new walk
    pub fn iter(&self) -> MarkupFiles {
        let walk = WalkBuilder::new(&self.root)
            .standard_filters(false)
            .follow_links(false)
            .sort_by_file_name(|a, b| a.cmp(b))
            .build();

        MarkupFiles {
            walk,
            root: self.root.clone(),
            suffixes: self.suffixes.clone(),
        }
    }
}

impl IntoIterator for &MarkupWalker {
    type Item = PathBuf;
    type IntoIter = MarkupFiles;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// One pass over the markup files of a tree
pub struct MarkupFiles {
    walk: Walk,
    root: PathBuf,
    suffixes: MarkupSuffixes,
}

impl Iterator for MarkupFiles {
    type Item = PathBuf;

    fn next(&mut self) -> Option<PathBuf> {
        loop {
            match self.walk.next()? {
                Ok(entry) => {
                    let is_file = entry.file_type().map(|t| t.is_file()).unwrap_or(false);
                    if !is_file || !is_listed_name(entry.file_name()) || !self.suffixes.matches(entry.path()) {
                        continue;
                    }
                    // Stored paths are strings; a lossy one would never match the file again
                    if relative_path(&self.root, entry.path()).is_none() {
                        log::warn!("skipping {}: name is not valid UTF-8", entry.path().display());
                        continue;
                    }
                    return Some(entry.into_path());
                }
                Err(e) => {
                    log::warn!("skipping unreadable entry: {}", e);
                }
            }
        }
    }
}

/// Path of `path` relative to `root`, `/`-separated regardless of platform.
/// None when `path` is outside `root` or not valid UTF-8.
pub fn relative_path(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let parts = rel
        .components()
        .map(|c| c.as_os_str().to_str())
        .collect::<Option<Vec<_>>>()?;
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}
