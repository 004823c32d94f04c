use crate::index::store::IndexStore;
use crate::utils::{dir_size, format_size};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Snapshot of an index for the `stats` command and daemon status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexStats {
    pub document_root: PathBuf,
    pub index_dir: PathBuf,
    pub doc_count: u64,
    pub segment_count: usize,
    /// Bytes on disk, None when the directory could not be measured
    pub size_bytes: Option<u64>,
}

impl IndexStats {
    pub fn collect(store: &IndexStore, document_root: &Path) -> Self {
        let searcher = store.searcher();
        let size_bytes = match dir_size(store.location()) {
            Ok(size) => Some(size),
            Err(e) => {
                log::debug!("cannot measure {}: {}", store.location().display(), e);
                None
            }
        };

        Self {
            document_root: document_root.to_path_buf(),
            index_dir: store.location().to_path_buf(),
            doc_count: searcher.num_docs(),
            segment_count: searcher.segment_readers().len(),
            size_bytes,
        }
    }
}

impl fmt::Display for IndexStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Index Statistics")?;
        writeln!(f, "================")?;
        writeln!(f)?;
        writeln!(f, "Document root:    {}", self.document_root.display())?;
        writeln!(f, "Index location:   {}", self.index_dir.display())?;
        writeln!(f, "Document count:   {}", self.doc_count)?;
        writeln!(f, "Segment count:    {}", self.segment_count)?;
        if let Some(size) = self.size_bytes {
            writeln!(f, "Index size:       {}", format_size(size))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::IndexedDocument;
    use crate::utils::hash_bytes;

    #[test]
    fn test_stats_count_documents() {
        let dir = tempfile::tempdir().unwrap();
        let store = IndexStore::create(&dir.path().join("index")).unwrap();
        let mut session = store.writer().unwrap();
        session
            .add_document(IndexedDocument {
                path: "a.md".into(),
                title: "a".into(),
                content: "alpha".into(),
                file_hash: hash_bytes(b"alpha"),
            })
            .unwrap();
        session.commit().unwrap();

        let stats = IndexStats::collect(&store, dir.path());
        assert_eq!(stats.doc_count, 1);
        assert!(stats.size_bytes.unwrap() > 0);
        assert!(stats.to_string().contains("Document count:   1"));
    }
}
