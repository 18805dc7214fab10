//! Embeddings from a local Ollama server (`POST /api/embeddings`).

use std::time::Duration;

use ndarray::Array1;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::embedder::EmbedderBackend;
use estthmar_core::{Error, Result};

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

/// Blocking Ollama embedding client.
///
/// Must be constructed and called off the async runtime.
pub struct OllamaEmbedder {
    client: reqwest::blocking::Client,
    url: String,
    model: String,
    dimension: usize,
    label: String,
}

impl OllamaEmbedder {
    pub fn new(base_url: &str, model: &str, dimension: usize) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;
        Ok(Self {
            client,
            url: format!("{}/api/embeddings", base_url.trim_end_matches('/')),
            model: model.to_string(),
            dimension,
            label: format!("ollama:{}", model),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.url
    }
}

impl EmbedderBackend for OllamaEmbedder {
    fn embed(&self, text: &str) -> Result<Array1<f32>> {
        let resp = self
            .client
            .post(&self.url)
            .json(&EmbeddingRequest {
                model: &self.model,
                prompt: text,
            })
            .send()
            .map_err(|e| Error::Inference(format!("Ollama request failed: {}", e)))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(Error::Inference(format!(
                "Ollama returned {}: {}",
                status, body
            )));
        }

        let parsed: EmbeddingResponse = resp
            .json()
            .map_err(|e| Error::Inference(format!("Bad Ollama embedding response: {}", e)))?;
        check_dimension(parsed.embedding, self.dimension)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        &self.label
    }
}

fn check_dimension(embedding: Vec<f32>, expected: usize) -> Result<Array1<f32>> {
    if embedding.len() != expected {
        return Err(Error::Inference(format!(
            "embedding model returned {} dimensions, expected {}",
            embedding.len(),
            expected
        )));
    }
    debug!("Embedded text into {} dims", expected);
    Ok(Array1::from_vec(embedding))
}
