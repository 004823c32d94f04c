//! # markdex - markup document index and search
//!
//! markdex serves a tree of markup documents (Markdown, Org, ...) and keeps
//! a full-text index of it in step with the files on disk. Changes are found
//! by content hash when a reconciliation is requested; when no index is
//! configured, searches fall back to a linear scan of the files.
//!
//! ## Architecture
//!
//! - [`utils`] - Content hashing and markup file enumeration
//! - [`index`] - The persistent store, writer sessions, populate and reconcile
//! - [`query`] - Query parsing and highlighted excerpts
//! - [`scan`] - Line scanners used without an index
//! - [`search`] - The search backend and the [`Service`] that owns it
//! - [`render`] - External markup-to-HTML conversion
//! - [`server`] - Daemon and client over a Unix socket
//! - [`output`] - Terminal formatting
//!
//! ## Quick Start
//!
//! ```no_run
//! use markdex::{Config, Service};
//!
//! let config = Config::new("/srv/notes")
//!     .with_index_dir("/var/lib/markdex")
//!     .resolve()?;
//! let (service, _) = Service::open(config)?;
//!
//! service.reconcile()?;
//! for (path, excerpts) in service.search("quick fox")? {
//!     println!("{}: {}", path, excerpts.join(" ... "));
//! }
//! # Ok::<(), markdex::Error>(())
//! ```

pub mod config;
pub mod error;
pub mod index;
pub mod output;
pub mod query;
pub mod render;
pub mod scan;
pub mod search;
#[cfg(all(unix, feature = "daemon"))]
pub mod server;
pub mod utils;

pub use config::{Config, ReadErrorPolicy, ScannerKind};
pub use error::{Error, Result};
pub use index::{IndexReport, IndexStore, IndexedDocument, Indexer, SearchResults};
pub use search::{BackendKind, SearchBackend, Service};
