//! LLM provider selection from the environment.

use std::time::Duration;

use estthmar_core::config::DEFAULT_OLLAMA_BASE_URL;
use estthmar_core::{Error, Result};

use crate::types::LlmProvider;

pub const DEFAULT_LLM_MODEL: &str = "llama3";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
/// Ollama's own default sampling temperature.
pub const DEFAULT_TEMPERATURE: f64 = 0.8;

/// Which text-generation backend to call and how.
#[derive(Clone)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub model: String,
    pub ollama_base_url: String,
    pub openai_base_url: String,
    pub openai_api_key: Option<String>,
    pub temperature: f64,
    /// Whole-request timeout. `None` waits for the model indefinitely.
    pub timeout: Option<Duration>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::Ollama,
            model: DEFAULT_LLM_MODEL.into(),
            ollama_base_url: DEFAULT_OLLAMA_BASE_URL.into(),
            openai_base_url: DEFAULT_OPENAI_BASE_URL.into(),
            openai_api_key: None,
            temperature: DEFAULT_TEMPERATURE,
            timeout: None,
        }
    }
}

// API keys stay out of logs.
impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("ollama_base_url", &self.ollama_base_url)
            .field("openai_base_url", &self.openai_base_url)
            .field("openai_api_key", &self.openai_api_key.as_ref().map(|_| "***"))
            .field("temperature", &self.temperature)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl LlmConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`LlmConfig::from_env`] with an injectable variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(p) = lookup("LLM_PROVIDER") {
            config.provider = p.parse()?;
        }
        if let Some(m) = lookup("LLM_MODEL") {
            config.model = m;
        }
        if let Some(u) = lookup("OLLAMA_BASE_URL") {
            config.ollama_base_url = u;
        }
        if let Some(u) = lookup("OPENAI_BASE_URL") {
            config.openai_base_url = u;
        }
        config.openai_api_key = lookup("OPENAI_API_KEY").filter(|k| !k.is_empty());

        if let Some(t) = lookup("LLM_TEMPERATURE") {
            config.temperature = t
                .parse()
                .map_err(|_| Error::Config(format!("LLM_TEMPERATURE is not a number: {}", t)))?;
        }
        if let Some(s) = lookup("LLM_TIMEOUT_SECS") {
            let secs: u64 = s
                .parse()
                .map_err(|_| Error::Config(format!("LLM_TIMEOUT_SECS is not an integer: {}", s)))?;
            config.timeout = Some(Duration::from_secs(secs));
        }

        Ok(config)
    }

    /// Full URL of the generation endpoint for the configured provider.
    pub fn endpoint(&self) -> String {
        match self.provider {
            LlmProvider::Ollama => {
                format!("{}/api/generate", self.ollama_base_url.trim_end_matches('/'))
            }
            LlmProvider::OpenAi => format!(
                "{}/chat/completions",
                self.openai_base_url.trim_end_matches('/')
            ),
        }
    }
}
