//! LanceDB-backed review collection: build once, query many times.

pub mod schema;
pub mod search;
pub mod table;
pub mod writer;

pub use search::{CollectionStats, ReviewSearchEngine};
pub use writer::ReviewIndexer;
