//! Estthmar Store: persistent vector index over SQLite.
//!
//! Each ingested file becomes a `documents` row; its chunks carry the text,
//! the `{source, page}` metadata and a float32 embedding. Similarity queries
//! run against a normalized in-memory matrix rebuilt from the table on demand.

pub mod schema;
pub mod sqlite;
pub mod types;
pub mod vector;

pub use sqlite::SqliteStore;
pub use types::*;
