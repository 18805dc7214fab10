//! Document ingestion pipeline: PDF → pages → chunks → embeddings → store.

use std::path::Path;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::chunking::RecursiveChunker;
use crate::file;
use estthmar_core::{ChunkingConfig, Error, Result};
use estthmar_infer::EmbedderBackend;
use estthmar_store::{NewChunk, SqliteStore};

/// Outcome of ingesting one file.
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub document_id: i64,
    /// Number of pages the loader produced.
    pub pages: usize,
    /// Number of chunks written to the index.
    pub chunks: usize,
}

/// Handles document ingestion: text extraction, chunking, embedding and storage.
pub struct Ingester<'a> {
    store: &'a SqliteStore,
    embedder: &'a dyn EmbedderBackend,
    chunker: RecursiveChunker,
}

impl<'a> Ingester<'a> {
    pub fn new(
        store: &'a SqliteStore,
        embedder: &'a dyn EmbedderBackend,
        chunking: ChunkingConfig,
    ) -> Self {
        Self {
            store,
            embedder,
            chunker: chunking.into(),
        }
    }

    /// Ingest a PDF already saved at `path`.
    ///
    /// Every chunk records `{source: <path>, page: <0-based page>}`.
    pub fn ingest_pdf(&self, path: &Path) -> Result<IngestReport> {
        let pages = file::extract_pdf_pages(path)?;
        let source = path.to_string_lossy().to_string();
        self.ingest_pages(&source, &pages)
    }

    /// Chunk, embed and store already-extracted pages under `source`.
    pub fn ingest_pages(&self, source: &str, pages: &[String]) -> Result<IngestReport> {
        let mut texts = Vec::new();
        let mut page_of = Vec::new();
        for (page, text) in pages.iter().enumerate() {
            for chunk in self.chunker.chunk(text) {
                texts.push(chunk.text);
                page_of.push(page);
            }
        }

        if texts.is_empty() {
            warn!("No extractable text in {} ({} pages)", source, pages.len());
        }

        let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
        let embeddings = self.embedder.embed_batch(&refs)?;
        if embeddings.len() != texts.len() {
            return Err(Error::Ingest(format!(
                "embedder returned {} vectors for {} chunks",
                embeddings.len(),
                texts.len()
            )));
        }
        debug!("Embedded {} chunks with {}", texts.len(), self.embedder.name());

        let chunks: Vec<NewChunk> = texts
            .into_iter()
            .zip(page_of)
            .zip(embeddings)
            .map(|((text, page), embedding)| NewChunk {
                text,
                page: Some(page as i32),
                metadata: serde_json::json!({ "source": source, "page": page }),
                embedding: embedding.to_vec(),
            })
            .collect();

        let metadata = serde_json::json!({
            "source": source,
            "pages": pages.len(),
            "chunks": chunks.len(),
            "embedder": self.embedder.name(),
        });
        let document_id = self
            .store
            .add_document(source, pages.len(), Some(&metadata), &chunks)?;

        info!(
            "Ingested {} as document {}: {} pages, {} chunks",
            source,
            document_id,
            pages.len(),
            chunks.len()
        );

        Ok(IngestReport {
            document_id,
            pages: pages.len(),
            chunks: chunks.len(),
        })
    }
}
