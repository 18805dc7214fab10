//! Estthmar Core: configuration, data directories and the shared error type.

pub mod config;
pub mod error;

pub use config::{ChunkingConfig, DataPaths, EmbeddingConfig, EstthmarConfig, RetrievalConfig};
pub use error::{Error, Result};
