//! Read-only views over the committed index.
//!
//! Every method works on one searcher snapshot, so a reconciliation
//! committing in between never shows up half-applied.

use crate::error::{Error, Result};
use crate::index::store::IndexStore;
use crate::index::types::{DocumentFields, IndexedDocument, StoredHit};
use crate::utils::ContentHash;
use std::collections::BTreeMap;
use tantivy::collector::{DocSetCollector, TopDocs};
use tantivy::query::{AllQuery, Query};
use tantivy::schema::Value;
use tantivy::{DocAddress, Searcher, TantivyDocument};

impl IndexStore {
    /// Number of committed documents
    pub fn num_docs(&self) -> u64 {
        self.searcher().num_docs()
    }

    /// `path -> file_hash` for every committed document
    pub fn known_documents(&self) -> Result<BTreeMap<String, ContentHash>> {
        let searcher = self.searcher();
        let fields = self.fields();

        let mut known = BTreeMap::new();
        for address in all_addresses(&searcher)? {
            let doc: TantivyDocument = searcher.doc(address)?;
            let path = stored_text(&doc, fields.path)
                .ok_or_else(|| missing_field(address, "path"))?;
            let hash = stored_text(&doc, fields.file_hash)
                .ok_or_else(|| missing_field(address, "file_hash"))?;
            known.insert(path.to_string(), ContentHash::from(hash));
        }
        Ok(known)
    }

    /// Every committed document, ordered by path
    pub fn documents(&self) -> Result<Vec<IndexedDocument>> {
        let searcher = self.searcher();
        let fields = self.fields();

        let mut docs = all_addresses(&searcher)?
            .into_iter()
            .map(|address| {
                let doc: TantivyDocument = searcher.doc(address)?;
                to_indexed(&doc, fields).ok_or_else(|| missing_field(address, "path"))
            })
            .collect::<Result<Vec<_>>>()?;
        docs.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(docs)
    }

    /// Identifies the committed state: segment ids and their delete
    /// opstamps, which change with every commit that touched the index
    pub fn version(&self) -> Vec<(String, Option<u64>)> {
        self.searcher()
            .segment_readers()
            .iter()
            .map(|segment| (segment.segment_id().uuid_string(), segment.delete_opstamp()))
            .collect()
    }

    /// Run a query, best hits first. A `limit` of 0 returns every match.
    pub fn search(&self, query: &dyn Query, limit: usize) -> Result<Vec<StoredHit>> {
        let searcher = self.searcher();
        let fields = self.fields();

        let limit = if limit == 0 {
            searcher.num_docs() as usize
        } else {
            limit
        };
        let top = searcher.search(query, &TopDocs::with_limit(limit.max(1)))?;

        let mut hits = Vec::with_capacity(top.len());
        for (score, address) in top {
            let doc: TantivyDocument = searcher.doc(address)?;
            let document = to_indexed(&doc, fields).ok_or_else(|| missing_field(address, "path"))?;
            hits.push(StoredHit { score, document });
        }
        Ok(hits)
    }
}

fn all_addresses(searcher: &Searcher) -> Result<Vec<DocAddress>> {
    let mut addresses: Vec<_> = searcher.search(&AllQuery, &DocSetCollector)?.into_iter().collect();
    addresses.sort();
    Ok(addresses)
}

pub(crate) fn stored_text(doc: &TantivyDocument, field: tantivy::schema::Field) -> Option<&str> {
    doc.get_first(field).and_then(|v| v.as_str())
}

/// Rebuild an [`IndexedDocument`] from its stored fields
pub(crate) fn to_indexed(doc: &TantivyDocument, fields: DocumentFields) -> Option<IndexedDocument> {
    Some(IndexedDocument {
        path: stored_text(doc, fields.path)?.to_string(),
        title: stored_text(doc, fields.title).unwrap_or_default().to_string(),
        content: stored_text(doc, fields.content).unwrap_or_default().to_string(),
        file_hash: ContentHash::from(stored_text(doc, fields.file_hash).unwrap_or_default()),
    })
}

fn missing_field(address: DocAddress, field: &str) -> Error {
    Error::Io(std::io::Error::new(
        std::io::ErrorKind::InvalidData,
        format!(
            "stored document {}:{} has no {} field",
            address.segment_ord, address.doc_id, field
        ),
    ))
}
