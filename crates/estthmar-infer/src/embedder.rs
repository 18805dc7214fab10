//! Embedding backend trait.
//!
//! Implementations are synchronous; async callers run them on the blocking
//! pool.

use ndarray::Array1;

use estthmar_core::Result;

/// Trait for embedding backends.
pub trait EmbedderBackend: Send + Sync {
    /// Embed a single text.
    fn embed(&self, text: &str) -> Result<Array1<f32>>;

    /// Embed a batch of texts, preserving order.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Array1<f32>>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }

    /// Output dimension.
    fn dimension(&self) -> usize;

    /// Short human-readable backend name, used in logs and stats.
    fn name(&self) -> &str;
}
