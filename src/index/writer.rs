//! Writer sessions and ordered batches.
//!
//! Within one session a path may be added once. Re-adding a path is only
//! accepted after a `delete_by_path` for it, which is exactly what
//! [`WriterSession::replace`] and [`ReconcileBatch`] do.

use crate::error::{Error, Result};
use crate::index::types::{DocumentFields, IndexedDocument};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tantivy::collector::Count;
use tantivy::query::TermQuery;
use tantivy::schema::IndexRecordOption;
use tantivy::{IndexReader, IndexWriter, Searcher, TantivyDocument, Term};

/// Clears the store's writer flag when the session ends
pub(crate) struct WriterGuard(Arc<AtomicBool>);

impl WriterGuard {
    pub(crate) fn new(flag: Arc<AtomicBool>) -> Self {
        WriterGuard(flag)
    }
}

impl Drop for WriterGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Exclusive, uncommitted set of changes to the store.
///
/// Nothing is visible to readers until [`WriterSession::commit`]. Dropping
/// the session discards every pending change.
pub struct WriterSession {
    writer: IndexWriter,
    reader: IndexReader,
    committed: Searcher,
    fields: DocumentFields,
    added: HashSet<String>,
    deleted: HashSet<String>,
    guard: WriterGuard,
}

impl WriterSession {
    pub(crate) fn new(
        writer: IndexWriter,
        reader: IndexReader,
        fields: DocumentFields,
        guard: WriterGuard,
    ) -> Self {
        let committed = reader.searcher();
        Self {
            writer,
            reader,
            committed,
            fields,
            added: HashSet::new(),
            deleted: HashSet::new(),
            guard,
        }
    }

    /// Queue a new document.
    ///
    /// Rejected with [`Error::DuplicatePath`] when the path was already added
    /// in this session, or exists in the committed index and has not been
    /// deleted in this session.
    pub fn add_document(&mut self, doc: IndexedDocument) -> Result<()> {
        if self.added.contains(&doc.path)
            || (!self.deleted.contains(&doc.path) && self.is_committed(&doc.path)?)
        {
            return Err(Error::DuplicatePath(doc.path));
        }

        let mut document = TantivyDocument::default();
        document.add_text(self.fields.path, &doc.path);
        document.add_text(self.fields.title, &doc.title);
        document.add_text(self.fields.content, &doc.content);
        document.add_text(self.fields.file_hash, doc.file_hash.as_str());
        self.writer.add_document(document)?;

        self.added.insert(doc.path);
        Ok(())
    }

    /// Queue removal of every document with this exact path. Removing an
    /// unknown path is a no-op.
    pub fn delete_by_path(&mut self, path: &str) {
        self.writer
            .delete_term(Term::from_field_text(self.fields.path, path));
        self.added.remove(path);
        self.deleted.insert(path.to_string());
    }

    /// Delete then add, as one step
    pub fn replace(&mut self, doc: IndexedDocument) -> Result<()> {
        self.delete_by_path(&doc.path);
        self.add_document(doc)
    }

    /// Number of paths touched so far
    pub fn pending(&self) -> usize {
        self.added.union(&self.deleted).count()
    }

    /// Make every queued change visible at once, then release the lock
    pub fn commit(self) -> Result<()> {
        let WriterSession {
            mut writer,
            reader,
            guard,
            ..
        } = self;

        writer.commit()?;
        reader.reload()?;

        if let Err(e) = writer.wait_merging_threads() {
            log::warn!("index merge did not finish cleanly: {}", e);
        }
        drop(guard);
        Ok(())
    }

    fn is_committed(&self, path: &str) -> Result<bool> {
        let query = TermQuery::new(
            Term::from_field_text(self.fields.path, path),
            IndexRecordOption::Basic,
        );
        Ok(self.committed.search(&query, &Count)? > 0)
    }
}

/// Changes computed by a reconciliation pass.
///
/// Applying a batch issues every delete before any add, so a changed file
/// is always removed before its new version is written.
#[derive(Debug, Default)]
pub struct ReconcileBatch {
    deletes: BTreeSet<String>,
    adds: BTreeMap<String, IndexedDocument>,
}

impl ReconcileBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove a path
    pub fn delete(&mut self, path: impl Into<String>) {
        self.deletes.insert(path.into());
    }

    /// Add a document for a path not yet in the index
    pub fn add(&mut self, doc: IndexedDocument) -> Result<()> {
        if self.adds.contains_key(&doc.path) {
            return Err(Error::DuplicatePath(doc.path));
        }
        self.adds.insert(doc.path.clone(), doc);
        Ok(())
    }

    /// Delete the stored version of a path and add the new one
    pub fn replace(&mut self, doc: IndexedDocument) -> Result<()> {
        self.delete(doc.path.clone());
        self.add(doc)
    }

    pub fn is_empty(&self) -> bool {
        self.deletes.is_empty() && self.adds.is_empty()
    }

    pub fn deletes(&self) -> impl Iterator<Item = &str> {
        self.deletes.iter().map(String::as_str)
    }

    pub fn adds(&self) -> impl Iterator<Item = &IndexedDocument> {
        self.adds.values()
    }

    /// Queue the batch on a session: deletes first, then adds
    pub fn apply(self, session: &mut WriterSession) -> Result<()> {
        for path in &self.deletes {
            session.delete_by_path(path);
        }
        for doc in self.adds.into_values() {
            session.add_document(doc)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::IndexStore;
    use crate::utils::hash_bytes;

    fn doc(path: &str, content: &str) -> IndexedDocument {
        IndexedDocument {
            path: path.to_string(),
            title: path.trim_end_matches(".md").to_string(),
            content: content.to_string(),
            file_hash: hash_bytes(content.as_bytes()),
        }
    }

    fn store() -> (tempfile::TempDir, IndexStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = IndexStore::create(&dir.path().join("index")).unwrap();
        (dir, store)
    }

    #[test]
    fn test_uncommitted_adds_are_invisible() {
        let (_dir, store) = store();
        let mut session = store.writer().unwrap();
        session.add_document(doc("a.md", "The quick fox")).unwrap();

        assert_eq!(store.searcher().num_docs(), 0);
        session.commit().unwrap();
        assert_eq!(store.searcher().num_docs(), 1);
    }

    #[test]
    fn test_dropped_session_discards_changes() {
        let (_dir, store) = store();
        {
            let mut session = store.writer().unwrap();
            session.add_document(doc("a.md", "The quick fox")).unwrap();
        }
        store.refresh().unwrap();
        assert_eq!(store.searcher().num_docs(), 0);
    }

    #[test]
    fn test_duplicate_add_in_session_is_rejected() {
        let (_dir, store) = store();
        let mut session = store.writer().unwrap();
        session.add_document(doc("a.md", "one")).unwrap();

        let err = session.add_document(doc("a.md", "two")).unwrap_err();
        assert!(matches!(err, Error::DuplicatePath(ref p) if p == "a.md"));
    }

    #[test]
    fn test_add_over_committed_path_is_rejected() {
        let (_dir, store) = store();
        let mut session = store.writer().unwrap();
        session.add_document(doc("a.md", "one")).unwrap();
        session.commit().unwrap();

        let mut session = store.writer().unwrap();
        assert!(matches!(
            session.add_document(doc("a.md", "two")),
            Err(Error::DuplicatePath(_))
        ));
    }

    #[test]
    fn test_delete_then_add_leaves_one_document() {
        let (_dir, store) = store();
        let mut session = store.writer().unwrap();
        session.add_document(doc("a.md", "one")).unwrap();
        session.commit().unwrap();

        let mut session = store.writer().unwrap();
        session.delete_by_path("a.md");
        session.add_document(doc("a.md", "two")).unwrap();
        session.commit().unwrap();

        let known = store.known_documents().unwrap();
        assert_eq!(known.len(), 1);
        assert_eq!(known["a.md"], hash_bytes(b"two"));
    }

    #[test]
    fn test_replace_within_same_session() {
        let (_dir, store) = store();
        let mut session = store.writer().unwrap();
        session.add_document(doc("a.md", "one")).unwrap();
        session.replace(doc("a.md", "two")).unwrap();
        session.commit().unwrap();

        assert_eq!(store.searcher().num_docs(), 1);
        assert_eq!(store.known_documents().unwrap()["a.md"], hash_bytes(b"two"));
    }

    #[test]
    fn test_delete_unknown_path_is_noop() {
        let (_dir, store) = store();
        let mut session = store.writer().unwrap();
        session.delete_by_path("ghost.md");
        session.commit().unwrap();
        assert_eq!(store.searcher().num_docs(), 0);
    }

    #[test]
    fn test_batch_rejects_duplicate_add() {
        let mut batch = ReconcileBatch::new();
        batch.add(doc("a.md", "one")).unwrap();
        assert!(matches!(batch.add(doc("a.md", "two")), Err(Error::DuplicatePath(_))));
    }

    #[test]
    fn test_batch_applies_deletes_before_adds() {
        let (_dir, store) = store();
        let mut session = store.writer().unwrap();
        session.add_document(doc("a.md", "old")).unwrap();
        session.add_document(doc("b.md", "gone")).unwrap();
        session.commit().unwrap();

        let mut batch = ReconcileBatch::new();
        batch.replace(doc("a.md", "new")).unwrap();
        batch.delete("b.md");
        assert_eq!(batch.deletes().count(), 2);

        let mut session = store.writer().unwrap();
        batch.apply(&mut session).unwrap();
        session.commit().unwrap();

        let known = store.known_documents().unwrap();
        assert_eq!(known.len(), 1);
        assert_eq!(known["a.md"], hash_bytes(b"new"));
    }

    #[test]
    fn test_commit_releases_lock() {
        let (_dir, store) = store();
        let session = store.writer().unwrap();
        session.commit().unwrap();
        assert!(store.writer().is_ok());
    }
}
