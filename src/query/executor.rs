use crate::config::ExcerptOptions;
use crate::error::Result;
use crate::index::store::IndexStore;
use crate::index::types::SearchResults;
use crate::query::highlight::render_highlighted;
use crate::query::parser::parse_query;
use tantivy::snippet::{Snippet, SnippetGenerator};

/// Answers free-text queries from the index with highlighted excerpts
pub struct QueryEngine {
    store: IndexStore,
    options: ExcerptOptions,
}

impl QueryEngine {
    pub fn new(store: IndexStore, options: ExcerptOptions) -> Self {
        Self { store, options }
    }

    pub fn store(&self) -> &IndexStore {
        &self.store
    }

    pub fn options(&self) -> &ExcerptOptions {
        &self.options
    }

    /// Every matching document, keyed by path, with up to `max_excerpts`
    /// highlighted excerpts each. Blank text matches nothing.
    pub fn query(&self, text: &str) -> Result<SearchResults> {
        let mut results = SearchResults::new();

        let fields = self.store.fields();
        let Some(query) = parse_query(self.store.index(), fields, text) else {
            return Ok(results);
        };

        // The daemon may be serving while a CLI reconcile commits
        self.store.refresh()?;

        let hits = self.store.search(&*query, 0)?;
        if hits.is_empty() {
            return Ok(results);
        }

        let mut generator = SnippetGenerator::create(&self.store.searcher(), &*query, fields.content)?;
        generator.set_max_num_chars(self.options.max_chars);

        for hit in hits {
            let excerpts = self.excerpts(&generator, &hit.document.content);
            results.insert(hit.document.path, excerpts);
        }
        Ok(results)
    }

    /// Best fragment per paragraph, in document order
    fn excerpts(&self, generator: &SnippetGenerator, content: &str) -> Vec<String> {
        let mut excerpts: Vec<String> = paragraphs(content)
            .map(|paragraph| generator.snippet(paragraph))
            .filter(|snippet| !snippet.highlighted().is_empty())
            .take(self.options.max_excerpts)
            .map(|snippet| self.render(&snippet))
            .collect();

        if excerpts.is_empty() {
            // Phrase or proximity hits that span a paragraph break
            let snippet = generator.snippet(content);
            let excerpt = if snippet.fragment().is_empty() {
                leading_chars(content, self.options.max_chars).to_string()
            } else {
                self.render(&snippet)
            };
            excerpts.push(excerpt);
        }
        excerpts
    }

    fn render(&self, snippet: &Snippet) -> String {
        render_highlighted(
            snippet.fragment(),
            snippet.highlighted(),
            &self.options.highlight_open,
            &self.options.highlight_close,
        )
        .trim()
        .to_string()
    }
}

/// Blank-line separated blocks of text
fn paragraphs(content: &str) -> impl Iterator<Item = &str> {
    let mut rest = content;
    std::iter::from_fn(move || {
        loop {
            if rest.is_empty() {
                return None;
            }
            let (block, tail) = split_block(rest);
            rest = tail;
            if !block.trim().is_empty() {
                return Some(block);
            }
        }
    })
}

fn split_block(text: &str) -> (&str, &str) {
    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        if line.trim().is_empty() && offset > 0 {
            return (&text[..offset], &text[offset + line.len()..]);
        }
        offset += line.len();
    }
    (text, "")
}

fn leading_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => text[..end].trim(),
        None => text.trim(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::IndexedDocument;
    use crate::utils::hash_bytes;

    fn engine(docs: &[(&str, &str)]) -> (tempfile::TempDir, QueryEngine) {
        let dir = tempfile::tempdir().unwrap();
        let store = IndexStore::create(&dir.path().join("index")).unwrap();
        let mut session = store.writer().unwrap();
        for (path, content) in docs {
            session
                .add_document(IndexedDocument {
                    path: path.to_string(),
                    title: path.trim_end_matches(".md").to_string(),
                    content: content.to_string(),
                    file_hash: hash_bytes(content.as_bytes()),
                })
                .unwrap();
        }
        session.commit().unwrap();
        (dir, QueryEngine::new(store, ExcerptOptions::default()))
    }

    #[test]
    fn test_paragraph_split() {
        let text = "one\ntwo\n\n\nthree\n  \nfour";
        let blocks: Vec<_> = paragraphs(text).map(str::trim).collect();
        assert_eq!(blocks, vec!["one\ntwo", "three", "four"]);
    }

    #[test]
    fn test_leading_chars_respects_boundaries() {
        assert_eq!(leading_chars("café au lait", 4), "café");
        assert_eq!(leading_chars("short", 50), "short");
    }

    #[test]
    fn test_query_highlights_match() {
        let (_dir, engine) = engine(&[("a.md", "The quick fox"), ("b.md", "A slow turtle")]);

        let results = engine.query("fox").unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results["a.md"].len(), 1);
        assert!(results["a.md"][0].contains("quick <b>fox</b>"));
    }

    #[test]
    fn test_query_matches_stemmed_variants() {
        let (_dir, engine) = engine(&[("a.md", "She was running late")]);
        let results = engine.query("runs").unwrap();
        assert!(results["a.md"][0].contains("<b>running</b>"));
    }

    #[test]
    fn test_multiple_paragraphs_give_multiple_excerpts() {
        let content = "fox one\n\nnothing here\n\nfox two\n\nfox three\n\nfox four";
        let (_dir, engine) = engine(&[("a.md", content)]);

        let excerpts = &engine.query("fox").unwrap()["a.md"];
        assert_eq!(excerpts.len(), 3);
        assert!(excerpts[1].contains("<b>fox</b> two"));
    }

    #[test]
    fn test_blank_query_is_empty() {
        let (_dir, engine) = engine(&[("a.md", "anything")]);
        assert!(engine.query("   ").unwrap().is_empty());
    }

    #[test]
    fn test_non_ascii_round_trip() {
        let (_dir, engine) = engine(&[("menu.md", "Un café crème, \\n s'il vous plaît")]);
        let excerpt = &engine.query("café").unwrap()["menu.md"][0];
        assert!(excerpt.contains("<b>café</b>"));
        assert!(excerpt.contains("crème"));
        assert!(excerpt.contains("\\n"));
    }

    #[test]
    fn test_custom_markers() {
        let (_dir, engine) = engine(&[("a.md", "The quick fox")]);
        let engine = QueryEngine::new(
            IndexStore::open(engine.store().location()).unwrap(),
            ExcerptOptions {
                highlight_open: "[".into(),
                highlight_close: "]".into(),
                ..Default::default()
            },
        );
        assert!(engine.query("quick").unwrap()["a.md"][0].contains("[quick]"));
    }
}
