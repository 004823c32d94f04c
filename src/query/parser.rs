//! Free-text query parsing.
//!
//! Input is parsed leniently: syntax the parser cannot make sense of is
//! dropped rather than reported, so any user text yields a query.

use crate::index::types::DocumentFields;
use tantivy::Index;
use tantivy::query::{Query, QueryParser};

/// Parse `text` against the stemmed `content` field, all terms required.
///
/// Returns None for blank input.
pub fn parse_query(index: &Index, fields: DocumentFields, text: &str) -> Option<Box<dyn Query>> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    let mut parser = QueryParser::for_index(index, vec![fields.content]);
    parser.set_conjunction_by_default();

    let (query, errors) = parser.parse_query_lenient(text);
    for error in errors {
        log::debug!("query {:?}: ignored {}", text, error);
    }
    Some(query)
}
