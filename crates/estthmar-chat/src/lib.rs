//! Text generation, prompt templates and question extraction.
//!
//! LLM calls go to a local Ollama server or an OpenAI-compatible API and are
//! streamed, then collected into a single completion.

pub mod config;
pub mod prompts;
pub mod providers;
pub mod questions;
pub mod types;

pub use config::LlmConfig;
pub use prompts::{PromptTemplate, Prompts};
pub use providers::LlmClient;
pub use questions::{extract_questions, Question};
pub use types::*;
