//! The one search entry point, and the service that owns it.
//!
//! Whether searches go to the index or to a linear scan is decided once,
//! when the [`Service`] is opened, from whether an index directory is
//! configured.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::index::{IndexReport, IndexStats, IndexStore, Indexer, OpenMode, SearchResults};
use crate::query::QueryEngine;
use crate::render::Renderer;
use crate::scan::FallbackScanner;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Indexed,
    Unindexed,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::Indexed => f.write_str("indexed"),
            BackendKind::Unindexed => f.write_str("unindexed"),
        }
    }
}

pub enum SearchBackend {
    Indexed(QueryEngine),
    Unindexed(FallbackScanner),
}

impl SearchBackend {
    pub fn search(&self, text: &str) -> Result<SearchResults> {
        match self {
            SearchBackend::Indexed(engine) => engine.query(text),
            SearchBackend::Unindexed(scanner) => scanner.scan(text),
        }
    }

    pub fn kind(&self) -> BackendKind {
        match self {
            SearchBackend::Indexed(_) => BackendKind::Indexed,
            SearchBackend::Unindexed(_) => BackendKind::Unindexed,
        }
    }

    pub fn store(&self) -> Option<&IndexStore> {
        match self {
            SearchBackend::Indexed(engine) => Some(engine.store()),
            SearchBackend::Unindexed(_) => None,
        }
    }
}

/// Everything a request needs, built once from the configuration
pub struct Service {
    config: Config,
    backend: SearchBackend,
    indexer: Indexer,
    renderer: Option<Renderer>,
}

impl Service {
    /// Open the configured backend.
    ///
    /// A missing index is created and populated; the population report is
    /// returned alongside the service. If population fails the half-built
    /// index is removed so the next start tries again.
    pub fn open(config: Config) -> Result<(Self, Option<IndexReport>)> {
        let indexer = Indexer::new(&config.document_root, &config.markup_suffixes)
            .with_policy(config.read_error_policy);
        let renderer = config
            .converter_binary
            .as_deref()
            .map(|bin| Renderer::new(bin, &config.document_root, &config.markup_suffixes));

        let mut report = None;
        let backend = match &config.index_dir {
            Some(dir) => {
                let (store, mode) = IndexStore::open_or_create(dir)?;
                let store = store.with_writer_heap(config.writer_heap_bytes);

                if mode == OpenMode::Created {
                    match indexer.populate(&store) {
                        Ok(r) => report = Some(r),
                        Err(e) => {
                            drop(store);
                            if let Err(cleanup) = IndexStore::remove(dir) {
                                log::warn!("cannot remove partial index {}: {}", dir.display(), cleanup);
                            }
                            return Err(e);
                        }
                    }
                }
                SearchBackend::Indexed(QueryEngine::new(store, config.excerpt_options()))
            }
            None => {
                log::info!("no index configured, searching with the {:?} scanner", config.fallback_scanner);
                SearchBackend::Unindexed(FallbackScanner::new(
                    &config.document_root,
                    &config.markup_suffixes,
                    config.fallback_scanner,
                ))
            }
        };

        Ok((
            Self {
                config,
                backend,
                indexer,
                renderer,
            },
            report,
        ))
    }

    /// Throw away the on-disk index and build it again
    pub fn rebuild(config: Config) -> Result<(Self, Option<IndexReport>)> {
        let dir = config.index_dir.as_deref().ok_or(Error::NotIndexed)?;
        log::info!("removing index at {}", dir.display());
        IndexStore::remove(dir)?;
        Self::open(config)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn backend(&self) -> &SearchBackend {
        &self.backend
    }

    pub fn search(&self, text: &str) -> Result<SearchResults> {
        self.backend.search(text)
    }

    /// Bring the index in line with the document tree
    pub fn reconcile(&self) -> Result<IndexReport> {
        let store = self.backend.store().ok_or(Error::NotIndexed)?;
        self.indexer.reconcile(store)
    }

    pub fn stats(&self) -> Result<IndexStats> {
        let store = self.backend.store().ok_or(Error::NotIndexed)?;
        Ok(IndexStats::collect(store, &self.config.document_root))
    }

    pub fn render(&self, rel_path: &str) -> Result<String> {
        let renderer = self
            .renderer
            .as_ref()
            .ok_or_else(|| Error::Config("no converter_binary configured".to_string()))?;
        renderer.render(rel_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn root() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("docs")).unwrap();
        fs::write(dir.path().join("docs/a.md"), "The quick fox\n").unwrap();
        dir
    }

    #[test]
    fn test_unindexed_service() {
        let dir = root();
        let config = Config::new(dir.path().join("docs")).resolve().unwrap();
        let (service, report) = Service::open(config).unwrap();

        assert!(report.is_none());
        assert_eq!(service.backend().kind(), BackendKind::Unindexed);
        assert_eq!(service.search("QUICK").unwrap()["a.md"], vec!["The quick fox".to_string()]);
        assert!(matches!(service.reconcile(), Err(Error::NotIndexed)));
        assert!(matches!(service.stats(), Err(Error::NotIndexed)));
    }

    #[test]
    fn test_indexed_service_populates_once() {
        let dir = root();
        let config = Config::new(dir.path().join("docs"))
            .with_index_dir(dir.path().join("index"))
            .resolve()
            .unwrap();

        let (service, report) = Service::open(config.clone()).unwrap();
        assert_eq!(report.unwrap().added, 1);
        assert_eq!(service.backend().kind(), BackendKind::Indexed);
        assert!(service.search("fox").unwrap().contains_key("a.md"));
        drop(service);

        let (service, report) = Service::open(config).unwrap();
        assert!(report.is_none());
        assert_eq!(service.stats().unwrap().doc_count, 1);
    }

    #[test]
    fn test_rebuild_repopulates() {
        let dir = root();
        let config = Config::new(dir.path().join("docs"))
            .with_index_dir(dir.path().join("index"))
            .resolve()
            .unwrap();
        drop(Service::open(config.clone()).unwrap());

        let (_service, report) = Service::rebuild(config).unwrap();
        assert_eq!(report.unwrap().added, 1);
    }

    #[test]
    fn test_render_without_converter() {
        let dir = root();
        let config = Config::new(dir.path().join("docs")).resolve().unwrap();
        let (service, _) = Service::open(config).unwrap();
        assert!(matches!(service.render("a.md"), Err(Error::Config(_))));
    }
}
