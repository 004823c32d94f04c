pub mod build;
pub mod reader;
pub mod stats;
pub mod store;
pub mod types;
pub mod writer;

pub use build::{Indexer, read_markup};
pub use stats::IndexStats;
pub use store::{IndexStore, OpenMode};
pub use types::*;
pub use writer::{ReconcileBatch, WriterSession};
