//! Configuration and data directory management.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Default HTTP port.
pub const DEFAULT_PORT: u16 = 8000;
/// Maximum characters per chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 1024;
/// Characters shared between neighbouring chunks.
pub const DEFAULT_CHUNK_OVERLAP: usize = 80;
/// Number of chunks handed to the model as context.
pub const DEFAULT_TOP_K: usize = 20;
/// Minimum cosine similarity (exclusive) for a chunk to be retrieved.
pub const DEFAULT_SCORE_THRESHOLD: f64 = 0.1;
pub const DEFAULT_OLLAMA_BASE_URL: &str = "http://127.0.0.1:11434";
pub const DEFAULT_EMBEDDING_MODEL: &str = "all-minilm";
/// Embedding dimension (384 for all-minilm and bge-small-en-v1.5).
pub const DEFAULT_EMBEDDING_DIM: usize = 384;

/// Paths to all Estthmar data directories.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataPaths {
    /// Root data directory (e.g., `data/`).
    pub root: PathBuf,
    /// Vector index directory (`data/vectordb/`).
    pub vectordb: PathBuf,
    /// Uploaded source files (`data/Documents/`).
    pub documents: PathBuf,
    /// Local embedding model files (`data/models/`).
    pub models: PathBuf,
}

impl DataPaths {
    /// Create data paths from a root directory. Creates directories if needed.
    pub fn new(root: impl AsRef<Path>) -> std::io::Result<Self> {
        let root = root.as_ref().to_path_buf();
        let paths = Self {
            vectordb: root.join("vectordb"),
            documents: root.join("Documents"),
            models: root.join("models"),
            root,
        };
        paths.ensure_dirs()?;
        Ok(paths)
    }

    fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.vectordb)?;
        std::fs::create_dir_all(&self.documents)?;
        std::fs::create_dir_all(&self.models)?;
        tracing::debug!("Data directories ready under {}", self.root.display());
        Ok(())
    }
}

/// Text splitter settings applied to every ingested page.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

/// Similarity retrieval settings for the answering endpoint.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RetrievalConfig {
    pub top_k: usize,
    pub score_threshold: f64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            score_threshold: DEFAULT_SCORE_THRESHOLD,
        }
    }
}

/// Which embedding backend to build at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// `ollama` or `onnx`.
    pub backend: String,
    pub model: String,
    pub dimension: usize,
    pub ollama_base_url: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            backend: "ollama".into(),
            model: DEFAULT_EMBEDDING_MODEL.into(),
            dimension: DEFAULT_EMBEDDING_DIM,
            ollama_base_url: DEFAULT_OLLAMA_BASE_URL.into(),
        }
    }
}

/// Top-level Estthmar configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EstthmarConfig {
    /// HTTP server port.
    pub port: u16,
    /// Data directory paths.
    pub data_paths: DataPaths,
    pub chunking: ChunkingConfig,
    pub retrieval: RetrievalConfig,
    pub embedding: EmbeddingConfig,
}

impl EstthmarConfig {
    /// Create configuration from environment and defaults.
    pub fn from_env(data_dir: impl AsRef<Path>) -> Result<Self> {
        Self::from_lookup(data_dir, |key| std::env::var(key).ok())
    }

    /// Same as [`EstthmarConfig::from_env`] with an injectable variable source.
    pub fn from_lookup<F>(data_dir: impl AsRef<Path>, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port = match lookup("PORT") {
            Some(p) => p
                .parse()
                .map_err(|_| Error::Config(format!("PORT is not a valid port: {}", p)))?,
            None => DEFAULT_PORT,
        };

        let mut embedding = EmbeddingConfig::default();
        if let Some(backend) = lookup("EMBEDDING_BACKEND") {
            embedding.backend = backend.to_lowercase();
        }
        if let Some(model) = lookup("EMBEDDING_MODEL") {
            embedding.model = model;
        }
        if let Some(dim) = lookup("EMBEDDING_DIM") {
            embedding.dimension = dim
                .parse()
                .map_err(|_| Error::Config(format!("EMBEDDING_DIM is not a number: {}", dim)))?;
        }
        if let Some(url) = lookup("OLLAMA_BASE_URL") {
            embedding.ollama_base_url = url.trim_end_matches('/').to_string();
        }

        match embedding.backend.as_str() {
            "ollama" | "onnx" => {}
            other => {
                return Err(Error::Config(format!(
                    "Unknown embedding backend: '{}'. Must be ollama or onnx.",
                    other
                )))
            }
        }
        if embedding.dimension == 0 {
            return Err(Error::Config("EMBEDDING_DIM must be > 0".into()));
        }

        let data_paths = DataPaths::new(data_dir)?;

        Ok(Self {
            port,
            data_paths,
            chunking: ChunkingConfig::default(),
            retrieval: RetrievalConfig::default(),
            embedding,
        })
    }
}
