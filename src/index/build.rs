//! Initial population and incremental reconciliation of the index.

use crate::config::ReadErrorPolicy;
use crate::error::{Error, Result};
use crate::index::store::IndexStore;
use crate::index::types::{IndexReport, IndexedDocument};
use crate::index::writer::ReconcileBatch;
use crate::utils::{
    ContentHash, MarkupSuffixes, MarkupWalker, hash_bytes, hash_file, is_listed, relative_path,
};
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Read one markup file into a document keyed by its path under `root`
pub fn read_markup(root: &Path, path: &Path) -> io::Result<IndexedDocument> {
    let rel = relative_path(root, path).ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} is not under {}", path.display(), root.display()),
        )
    })?;

    let bytes = fs::read(path)?;
    let file_hash = hash_bytes(&bytes);
    let content = String::from_utf8(bytes)
        .unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned());
    let title = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    Ok(IndexedDocument {
        path: rel,
        title,
        content,
        file_hash,
    })
}

/// Keeps an index in step with a document tree
#[derive(Debug, Clone)]
pub struct Indexer {
    root: PathBuf,
    suffixes: MarkupSuffixes,
    policy: ReadErrorPolicy,
}

/// What step 2 of a reconciliation decided for one known path
enum Known {
    Unchanged,
    Changed,
    Missing,
    Unreadable(io::Error),
}

impl Indexer {
    pub fn new(root: &Path, suffixes: &MarkupSuffixes) -> Self {
        Self {
            root: root.to_path_buf(),
            suffixes: suffixes.clone(),
            policy: ReadErrorPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: ReadErrorPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn walker(&self) -> MarkupWalker {
        MarkupWalker::new(&self.root, &self.suffixes)
    }

    /// Index every markup file under the root in one session.
    ///
    /// Any read failure aborts with [`Error::IndexBuild`] and nothing is
    /// committed, whatever the read error policy.
    pub fn populate(&self, store: &IndexStore) -> Result<IndexReport> {
        let start = Instant::now();
        let mut session = store.writer()?;

        let files: Vec<PathBuf> = self.walker().iter().collect();
        log::debug!("populate: found {} markup files under {}", files.len(), self.root.display());

        let docs = files
            .par_iter()
            .map(|path| {
                read_markup(&self.root, path).map_err(|source| Error::IndexBuild {
                    path: path.clone(),
                    source,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let added = docs.len();
        for doc in docs {
            session.add_document(doc)?;
        }
        session.commit()?;

        let report = IndexReport {
            added,
            duration: start.elapsed(),
            ..Default::default()
        };
        log::info!(
            "indexed {} documents from {} in {:.2?}",
            report.added,
            self.root.display(),
            report.duration
        );
        Ok(report)
    }

    /// Bring the index in line with the tree as it is now.
    ///
    /// The writer session is taken before anything is read, so a second
    /// concurrent reconciliation fails with [`Error::Lock`] straight away.
    /// When nothing changed, nothing is committed.
    pub fn reconcile(&self, store: &IndexStore) -> Result<IndexReport> {
        let start = Instant::now();
        let mut session = store.writer()?;
        let mut report = IndexReport::default();

        let known = store.known_documents()?;
        let mut batch = ReconcileBatch::new();
        let mut reindex = BTreeSet::new();

        for (path, verdict) in self.check_known(&known) {
            match verdict {
                Known::Unchanged => report.unchanged += 1,
                Known::Missing => {
                    log::debug!("reconcile: {} is gone", path);
                    batch.delete(path);
                    report.deleted += 1;
                }
                Known::Changed => {
                    log::debug!("reconcile: {} changed", path);
                    reindex.insert(path);
                }
                Known::Unreadable(source) => {
                    self.unreadable(&path, source, &mut report)?;
                }
            }
        }

        let fresh: Vec<(String, PathBuf)> = self
            .walker()
            .iter()
            .filter_map(|abs| relative_path(&self.root, &abs).map(|rel| (rel, abs)))
            .filter(|(rel, _)| reindex.contains(rel) || !known.contains_key(rel))
            .collect();

        let read: Vec<(String, io::Result<IndexedDocument>)> = fresh
            .par_iter()
            .map(|(rel, abs)| (rel.clone(), read_markup(&self.root, abs)))
            .collect();

        for (rel, result) in read {
            match result {
                Ok(doc) => {
                    if reindex.remove(&rel) {
                        batch.replace(doc)?;
                        report.updated += 1;
                    } else {
                        log::debug!("reconcile: {} is new", rel);
                        batch.add(doc)?;
                        report.added += 1;
                    }
                }
                Err(source) => {
                    self.unreadable(&rel, source, &mut report)?;
                    reindex.remove(&rel);
                }
            }
        }

        // Hash changed but the walk no longer yields the file (removed or
        // renamed to a hidden name in between): treat as deleted.
        for path in reindex {
            batch.delete(path);
            report.deleted += 1;
        }

        if batch.is_empty() {
            drop(session);
            report.duration = start.elapsed();
            log::info!(
                "index up to date: {} unchanged, {} skipped",
                report.unchanged,
                report.skipped.len()
            );
            return Ok(report);
        }

        batch.apply(&mut session)?;
        session.commit()?;

        report.duration = start.elapsed();
        log::info!(
            "reconciled in {:.2?}: {} added, {} updated, {} deleted, {} unchanged, {} skipped",
            report.duration,
            report.added,
            report.updated,
            report.deleted,
            report.unchanged,
            report.skipped.len()
        );
        Ok(report)
    }

    /// Re-hash every known path in parallel
    fn check_known(&self, known: &BTreeMap<String, ContentHash>) -> Vec<(String, Known)> {
        known
            .par_iter()
            .map(|(path, stored)| {
                let abs = self.root.join(path);
                let verdict = match hash_file(&abs) {
                    Ok(current) if &current == stored => {
                        if self.still_listed(path, &abs) {
                            Known::Unchanged
                        } else {
                            Known::Missing
                        }
                    }
                    Ok(_) => Known::Changed,
                    Err(e) if e.kind() == io::ErrorKind::NotFound => Known::Missing,
                    Err(e) if abs.is_dir() => {
                        log::debug!("{} is now a directory: {}", abs.display(), e);
                        Known::Missing
                    }
                    Err(e) => Known::Unreadable(e),
                };
                (path.clone(), verdict)
            })
            .collect()
    }

    /// Whether the file would still be enumerated, e.g. its suffix may have
    /// been dropped from the configuration since it was indexed
    fn still_listed(&self, path: &str, abs: &Path) -> bool {
        is_listed(path) && self.suffixes.matches(abs)
    }

    fn unreadable(&self, path: &str, source: io::Error, report: &mut IndexReport) -> Result<()> {
        match self.policy {
            ReadErrorPolicy::Abort => Err(Error::IndexBuild {
                path: self.root.join(path),
                source,
            }),
            ReadErrorPolicy::Skip => {
                log::warn!("skipping {}: {}", path, source);
                report.skipped.push(path.to_string());
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Tree {
        dir: tempfile::TempDir,
    }

    impl Tree {
        fn new() -> Self {
            Tree {
                dir: tempfile::tempdir().unwrap(),
            }
        }

        fn root(&self) -> PathBuf {
            self.dir.path().join("docs")
        }

        fn write(&self, rel: &str, content: &str) {
            let path = self.root().join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }

        fn store(&self) -> IndexStore {
            fs::create_dir_all(self.root()).unwrap();
            IndexStore::create(&self.dir.path().join("index")).unwrap()
        }

        fn indexer(&self) -> Indexer {
            Indexer::new(&self.root(), &MarkupSuffixes::new([".md"]))
        }
    }

    #[test]
    fn test_read_markup_derives_title_and_path() {
        let tree = Tree::new();
        tree.write("journal/2024-01-01.md", "# New year");

        let doc = read_markup(&tree.root(), &tree.root().join("journal/2024-01-01.md")).unwrap();
        assert_eq!(doc.path, "journal/2024-01-01.md");
        assert_eq!(doc.title, "2024-01-01");
        assert_eq!(doc.file_hash, hash_bytes(b"# New year"));
    }

    #[test]
    fn test_populate_indexes_only_markup() {
        let tree = Tree::new();
        tree.write("a.md", "The quick fox");
        tree.write("b.txt", "not markup");
        tree.write(".hidden.md", "dot-named file");
        tree.write(".notes/plan.md", "inside a dot directory");
        tree.write("att.resources/inner.md", "inside a sidecar directory");
        let store = tree.store();

        let report = tree.indexer().populate(&store).unwrap();
        assert_eq!(report.added, 3);
        assert_eq!(
            store.known_documents().unwrap().keys().collect::<Vec<_>>(),
            vec![".notes/plan.md", "a.md", "att.resources/inner.md"]
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_name_does_not_flap() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let tree = Tree::new();
        tree.write("a.md", "plain");
        let odd = tree.root().join(OsStr::from_bytes(b"caf\xe9.md"));
        if fs::write(&odd, "hello").is_err() {
            return;
        }
        let store = tree.store();
        let indexer = tree.indexer();

        assert_eq!(indexer.populate(&store).unwrap().added, 1);
        for _ in 0..3 {
            let report = indexer.reconcile(&store).unwrap();
            assert!(report.is_noop(), "{:?}", report);
            assert_eq!(store.num_docs(), 1);
        }
    }

    #[test]
    fn test_reconcile_after_populate_is_noop() {
        let tree = Tree::new();
        tree.write("a.md", "one");
        tree.write("sub/b.md", "two");
        let store = tree.store();
        let indexer = tree.indexer();
        indexer.populate(&store).unwrap();

        let report = indexer.reconcile(&store).unwrap();
        assert!(report.is_noop());
        assert_eq!(report.unchanged, 2);
    }

    #[test]
    fn test_reconcile_detects_add_change_delete() {
        let tree = Tree::new();
        tree.write("keep.md", "same");
        tree.write("edit.md", "before");
        tree.write("gone.md", "bye");
        let store = tree.store();
        let indexer = tree.indexer();
        indexer.populate(&store).unwrap();

        tree.write("edit.md", "after");
        tree.write("new.md", "hello");
        fs::remove_file(tree.root().join("gone.md")).unwrap();

        let report = indexer.reconcile(&store).unwrap();
        assert_eq!(
            (report.added, report.updated, report.deleted, report.unchanged),
            (1, 1, 1, 1)
        );

        let known = store.known_documents().unwrap();
        assert_eq!(
            known.keys().map(String::as_str).collect::<Vec<_>>(),
            vec!["edit.md", "keep.md", "new.md"]
        );
        assert_eq!(known["edit.md"], hash_bytes(b"after"));
    }

    #[test]
    fn test_reconcile_holds_writer_lock() {
        let tree = Tree::new();
        tree.write("a.md", "one");
        let store = tree.store();

        let _session = store.writer().unwrap();
        assert!(matches!(tree.indexer().reconcile(&store), Err(Error::Lock)));
    }

    #[test]
    fn test_populate_fails_on_lock() {
        let tree = Tree::new();
        let store = tree.store();
        let _session = store.writer().unwrap();
        assert!(matches!(tree.indexer().populate(&store), Err(Error::Lock)));
    }

    #[test]
    fn test_reconcile_drops_paths_whose_suffix_was_removed() {
        let tree = Tree::new();
        tree.write("a.md", "one");
        tree.write("b.org", "two");
        let store = tree.store();
        Indexer::new(&tree.root(), &MarkupSuffixes::new([".md", ".org"]))
            .populate(&store)
            .unwrap();

        let report = tree.indexer().reconcile(&store).unwrap();
        assert_eq!(report.deleted, 1);
        assert!(!store.known_documents().unwrap().contains_key("b.org"));
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_file_abort_and_skip() {
        use std::os::unix::fs::PermissionsExt;

        let tree = Tree::new();
        tree.write("a.md", "one");
        let store = tree.store();
        tree.indexer().populate(&store).unwrap();

        tree.write("locked.md", "secret");
        let locked = tree.root().join("locked.md");
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();
        if fs::read(&locked).is_ok() {
            // Running as root: permissions are not enforced
            return;
        }

        let err = tree.indexer().reconcile(&store).unwrap_err();
        assert!(matches!(err, Error::IndexBuild { .. }));
        assert_eq!(store.num_docs(), 1);

        let report = tree
            .indexer()
            .with_policy(ReadErrorPolicy::Skip)
            .reconcile(&store)
            .unwrap();
        assert_eq!(report.skipped, vec!["locked.md".to_string()]);
        assert_eq!(store.num_docs(), 1);
    }
}
