//! Text-generation types shared by the providers and the server.

use std::str::FromStr;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

use estthmar_core::{Error, Result};

/// LLM provider identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    /// Local Ollama server, `/api/generate`.
    Ollama,
    /// Any OpenAI-compatible `/chat/completions` endpoint.
    OpenAi,
}

impl std::fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LlmProvider::Ollama => write!(f, "ollama"),
            LlmProvider::OpenAi => write!(f, "openai"),
        }
    }
}

impl FromStr for LlmProvider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "openai" => Ok(Self::OpenAi),
            other => Err(Error::Config(format!("unknown LLM provider: {}", other))),
        }
    }
}

/// A single streamed token, end marker or provider error.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamChunk {
    Token(String),
    Done { tokens_used: usize },
    Error(String),
}

/// Single-shot text generation: prompt in, completion out.
///
/// The server holds one behind an `Arc<dyn TextGenerator>`.
pub trait TextGenerator: Send + Sync {
    fn generate<'a>(&'a self, prompt: &'a str) -> BoxFuture<'a, Result<String>>;

    /// Model name for logs and stats.
    fn model(&self) -> &str;
}
