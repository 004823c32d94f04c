//! Shared document trees for integration tests

#![allow(dead_code)]

use markdex::{Config, ReadErrorPolicy};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A temporary document root with a sibling index directory
pub struct DocTree {
    dir: TempDir,
}

impl DocTree {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        fs::create_dir(dir.path().join("docs")).expect("Failed to create document root");
        Self { dir }
    }

    /// The tree from the quick fox scenario: `a.md` and `b.md`
    pub fn fox_and_turtle() -> Self {
        let tree = Self::new();
        tree.write("a.md", "The quick fox");
        tree.write("b.md", "A slow turtle");
        tree
    }

    pub fn root(&self) -> PathBuf {
        self.dir.path().join("docs")
    }

    pub fn index_dir(&self) -> PathBuf {
        self.dir.path().join("index")
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.root().join(rel)
    }

    pub fn write(&self, rel: &str, content: &str) {
        let path = self.path(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    pub fn remove(&self, rel: &str) {
        fs::remove_file(self.path(rel)).unwrap();
    }

    /// Config with an index, md only
    pub fn indexed_config(&self) -> Config {
        Config::new(self.root())
            .with_index_dir(self.index_dir())
            .with_suffixes(markdex::utils::MarkupSuffixes::new([".md"]))
            .resolve()
            .unwrap()
    }

    pub fn indexed_config_with(&self, policy: ReadErrorPolicy) -> Config {
        Config::new(self.root())
            .with_index_dir(self.index_dir())
            .with_suffixes(markdex::utils::MarkupSuffixes::new([".md"]))
            .with_read_error_policy(policy)
            .resolve()
            .unwrap()
    }

    /// Config without an index, md only
    pub fn unindexed_config(&self) -> Config {
        Config::new(self.root())
            .with_suffixes(markdex::utils::MarkupSuffixes::new([".md"]))
            .resolve()
            .unwrap()
    }
}

/// Make a file unreadable. Returns false when running as root, where
/// permissions don't stop reads.
#[cfg(unix)]
pub fn make_unreadable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, fs::Permissions::from_mode(0o000)).unwrap();
    if fs::read(path).is_ok() {
        fs::set_permissions(path, fs::Permissions::from_mode(0o644)).unwrap();
        return false;
    }
    true
}

#[cfg(unix)]
pub fn make_readable(path: &Path) {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, fs::Permissions::from_mode(0o644)).unwrap();
}

/// True when a program is on PATH
pub fn have_program(name: &str) -> bool {
    markdex::render::find_program(name).is_some()
}
