//! Utility functions shared by the indexer, the scanner and the server.
//!
//! ## Modules
//!
//! - [`app_data`] - Application data directory management (XDG-compliant)
//! - [`hash`] - Content digests for change detection
//! - [`progress`] - Progress bars that compile away without the `progress` feature
//! - [`walk`] - Markup file enumeration
//!
//! ```no_run
//! use markdex::utils::{hash_bytes, MarkupSuffixes, MarkupWalker};
//! use std::path::Path;
//!
//! let suffixes = MarkupSuffixes::new([".md", ".org"]);
//! for path in &MarkupWalker::new(Path::new("/srv/notes"), &suffixes) {
//!     let digest = hash_bytes(&std::fs::read(&path).unwrap());
//!     println!("{} {}", digest, path.display());
//! }
//! ```

pub mod app_data;
pub mod hash;
pub mod progress;
pub mod walk;

pub use app_data::*;
pub use hash::*;
pub use walk::*;
