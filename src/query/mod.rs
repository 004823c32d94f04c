pub mod executor;
pub mod highlight;
pub mod parser;

pub use executor::QueryEngine;
pub use highlight::{render_highlighted, strip_markers};
pub use parser::parse_query;
