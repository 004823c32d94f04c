use crate::utils::ContentHash;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tantivy::schema::{
    Field, IndexRecordOption, STORED, STRING, Schema, TextFieldIndexing, TextOptions,
};

/// Search results: relative path -> excerpts or matching lines
pub type SearchResults = BTreeMap<String, Vec<String>>;

/// Field names of the on-disk schema
pub const FIELD_PATH: &str = "path";
pub const FIELD_TITLE: &str = "title";
pub const FIELD_CONTENT: &str = "content";
pub const FIELD_FILE_HASH: &str = "file_hash";

/// Tokenizer for `content`: lowercased and English-stemmed
pub const CONTENT_TOKENIZER: &str = "en_stem";

/// One indexed markup file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexedDocument {
    /// Path relative to the document root, `/`-separated
    pub path: String,
    /// File name without extension
    pub title: String,
    /// Full file contents
    pub content: String,
    /// Digest of the file bytes at index time
    pub file_hash: ContentHash,
}

/// Field handles of the document schema
#[derive(Debug, Clone, Copy)]
pub struct DocumentFields {
    pub path: Field,
    pub title: Field,
    pub content: Field,
    pub file_hash: Field,
}

impl DocumentFields {
    /// Build the expected schema together with its field handles
    pub fn schema() -> (Schema, DocumentFields) {
        let mut builder = Schema::builder();

        let content_options = TextOptions::default()
            .set_indexing_options(
                TextFieldIndexing::default()
                    .set_tokenizer(CONTENT_TOKENIZER)
                    .set_index_option(IndexRecordOption::WithFreqsAndPositions),
            )
            .set_stored();

        let title_options = TextOptions::default()
            .set_indexing_options(
                TextFieldIndexing::default()
                    .set_tokenizer("default")
                    .set_index_option(IndexRecordOption::WithFreqsAndPositions),
            )
            .set_stored();

        let path = builder.add_text_field(FIELD_PATH, STRING | STORED);
        let title = builder.add_text_field(FIELD_TITLE, title_options);
        let content = builder.add_text_field(FIELD_CONTENT, content_options);
        let file_hash = builder.add_text_field(FIELD_FILE_HASH, STORED);

        let fields = DocumentFields {
            path,
            title,
            content,
            file_hash,
        };
        (builder.build(), fields)
    }
}

/// A stored document returned by a store-level search
#[derive(Debug, Clone)]
pub struct StoredHit {
    pub score: f32,
    pub document: IndexedDocument,
}

/// What a populate or reconcile pass changed
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexReport {
    /// Documents for files the index had never seen
    pub added: usize,
    /// Documents replaced because their hash changed
    pub updated: usize,
    /// Documents removed because their file is gone
    pub deleted: usize,
    pub unchanged: usize,
    /// Paths that could not be read under the skip policy
    pub skipped: Vec<String>,
    #[serde(with = "duration_ms")]
    pub duration: Duration,
}

impl IndexReport {
    /// True when the pass wrote nothing
    pub fn is_noop(&self) -> bool {
        self.added == 0 && self.updated == 0 && self.deleted == 0
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64() * 1000.0)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let ms = f64::deserialize(d)?;
        Ok(Duration::from_secs_f64(ms.max(0.0) / 1000.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_field_names() {
        let (schema, fields) = DocumentFields::schema();
        assert_eq!(schema.get_field(FIELD_PATH).unwrap(), fields.path);
        assert_eq!(schema.get_field(FIELD_CONTENT).unwrap(), fields.content);
        assert_eq!(schema.get_field(FIELD_FILE_HASH).unwrap(), fields.file_hash);
    }

    #[test]
    fn test_file_hash_is_not_indexed() {
        let (schema, fields) = DocumentFields::schema();
        assert!(!schema.get_field_entry(fields.file_hash).is_indexed());
        assert!(schema.get_field_entry(fields.file_hash).is_stored());
    }

    #[test]
    fn test_report_noop() {
        let mut report = IndexReport {
            unchanged: 4,
            ..Default::default()
        };
        assert!(report.is_noop());

        report.deleted = 1;
        assert!(!report.is_noop());
    }
}
