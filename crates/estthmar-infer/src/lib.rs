//! Estthmar Infer: embedding backends.
//!
//! `OllamaEmbedder` calls a local Ollama server. When the `onnx` feature is
//! enabled, `OnnxEmbedder` runs bge-small-en-v1.5 in-process from
//! `data/models/`.

pub mod embedder;
pub mod ollama_embedder;
pub mod onnx_embedder;

pub use embedder::EmbedderBackend;
pub use ollama_embedder::OllamaEmbedder;

#[cfg(feature = "onnx")]
pub use onnx_embedder::OnnxEmbedder;

use std::path::Path;
use std::sync::Arc;

use estthmar_core::{EmbeddingConfig, Error, Result};

/// Build the embedder selected by `config.backend`.
///
/// Blocking: call from a blocking context.
pub fn create_embedder(
    config: &EmbeddingConfig,
    model_dir: &Path,
) -> Result<Arc<dyn EmbedderBackend>> {
    match config.backend.as_str() {
        "ollama" => {
            let embedder =
                OllamaEmbedder::new(&config.ollama_base_url, &config.model, config.dimension)?;
            tracing::info!(
                "Using Ollama embedder {} at {} (dim={})",
                config.model,
                embedder.endpoint(),
                config.dimension
            );
            Ok(Arc::new(embedder))
        }
        #[cfg(feature = "onnx")]
        "onnx" => {
            let embedder = OnnxEmbedder::load(model_dir, config.dimension)?;
            tracing::info!("Using ONNX embedder (dim={})", embedder.dimension());
            Ok(Arc::new(embedder))
        }
        #[cfg(not(feature = "onnx"))]
        "onnx" => {
            let _ = model_dir;
            Err(Error::Config(
                "EMBEDDING_BACKEND=onnx requires building with the `onnx` feature".into(),
            ))
        }
        other => Err(Error::Config(format!("unknown embedding backend: {}", other))),
    }
}
