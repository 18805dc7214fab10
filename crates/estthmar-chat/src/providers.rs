//! LLM provider streaming implementations.
//!
//! Ollama streams newline-delimited JSON objects from `/api/generate`;
//! OpenAI-compatible servers stream SSE `data:` lines from
//! `/chat/completions`. Both are exposed as a stream of [`StreamChunk`]s and
//! [`LlmClient`] collects that stream into the final completion.

use std::pin::Pin;

use futures::future::BoxFuture;
use futures::Stream;
use reqwest::Client;
use serde_json::json;
use tokio_stream::StreamExt;
use tracing::{debug, error, info};

use crate::config::LlmConfig;
use crate::types::{LlmProvider, StreamChunk, TextGenerator};
use estthmar_core::{Error, Result};

/// Boxed stream type for returning different stream implementations.
pub type BoxedStream = Pin<Box<dyn Stream<Item = StreamChunk> + Send>>;

/// Stream a completion for `prompt` from the configured provider.
pub fn stream_llm(client: &Client, config: &LlmConfig, prompt: &str) -> BoxedStream {
    match config.provider {
        LlmProvider::Ollama => Box::pin(stream_ollama(
            client.clone(),
            config.endpoint(),
            config.model.clone(),
            prompt.to_string(),
            config.temperature,
        )),
        LlmProvider::OpenAi => Box::pin(stream_openai_compat(
            client.clone(),
            config.endpoint(),
            config.model.clone(),
            config.openai_api_key.clone(),
            prompt.to_string(),
            config.temperature,
        )),
    }
}

/// Parse one NDJSON line from Ollama's `/api/generate`.
pub fn parse_ollama_line(line: &str, tokens_so_far: usize) -> Option<StreamChunk> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let parsed: serde_json::Value = match serde_json::from_str(line) {
        Ok(v) => v,
        Err(e) => return Some(StreamChunk::Error(format!("Malformed Ollama line: {}", e))),
    };

    if let Some(err) = parsed["error"].as_str() {
        return Some(StreamChunk::Error(err.to_string()));
    }
    if parsed["done"].as_bool() == Some(true) {
        let tokens_used = parsed["eval_count"]
            .as_u64()
            .map(|n| n as usize)
            .unwrap_or(tokens_so_far);
        return Some(StreamChunk::Done { tokens_used });
    }
    parsed["response"]
        .as_str()
        .filter(|s| !s.is_empty())
        .map(|s| StreamChunk::Token(s.to_string()))
}

/// Parse one SSE line from an OpenAI-compatible stream.
pub fn parse_openai_line(line: &str, tokens_so_far: usize) -> Option<StreamChunk> {
    let line = line.trim();
    if line.is_empty() || line.starts_with(':') {
        return None;
    }
    let data = line.strip_prefix("data:")?.trim();
    if data == "[DONE]" {
        return Some(StreamChunk::Done {
            tokens_used: tokens_so_far,
        });
    }

    let parsed: serde_json::Value = serde_json::from_str(data).ok()?;
    if let Some(msg) = parsed["error"]["message"].as_str() {
        return Some(StreamChunk::Error(msg.to_string()));
    }
    parsed["choices"][0]["delta"]["content"]
        .as_str()
        .filter(|s| !s.is_empty())
        .map(|s| StreamChunk::Token(s.to_string()))
}

/// Decode one complete line. Lines are only cut at `\n`, so a character
/// split across network chunks is whole by the time it gets here.
fn decode_line(bytes: Vec<u8>) -> std::result::Result<String, StreamChunk> {
    String::from_utf8(bytes)
        .map_err(|e| StreamChunk::Error(format!("Invalid UTF-8 in stream: {}", e)))
}

/// Shared body of both providers: send the request, split the byte stream
/// into lines and hand each to `parse`.
fn stream_lines(
    request: reqwest::RequestBuilder,
    parse: fn(&str, usize) -> Option<StreamChunk>,
) -> impl Stream<Item = StreamChunk> + Send + 'static {
    async_stream::stream! {
        let response = match request.send().await {
            Ok(r) => r,
            Err(e) => {
                yield StreamChunk::Error(format!("Request failed: {}", e));
                return;
            }
        };

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            yield StreamChunk::Error(format!("API error {}: {}", status, body));
            return;
        }

        let mut stream = response.bytes_stream();
        let mut buffer: Vec<u8> = Vec::new();
        let mut token_count = 0usize;

        while let Some(chunk) = stream.next().await {
            let bytes = match chunk {
                Ok(b) => b,
                Err(e) => {
                    yield StreamChunk::Error(format!("Stream read error: {}", e));
                    return;
                }
            };

            buffer.extend_from_slice(&bytes);

            while let Some(line_end) = buffer.iter().position(|&b| b == b'\n') {
                let line = match decode_line(buffer.drain(..=line_end).collect()) {
                    Ok(line) => line,
                    Err(chunk) => {
                        yield chunk;
                        return;
                    }
                };
                match parse(&line, token_count) {
                    Some(StreamChunk::Token(t)) => {
                        token_count += 1;
                        yield StreamChunk::Token(t);
                    }
                    Some(other @ (StreamChunk::Done { .. } | StreamChunk::Error(_))) => {
                        yield other;
                        return;
                    }
                    None => {}
                }
            }
        }

        // Trailing line without a newline.
        let rest = match decode_line(buffer) {
            Ok(rest) => rest,
            Err(chunk) => {
                yield chunk;
                return;
            }
        };
        if let Some(chunk) = parse(&rest, token_count) {
            if matches!(chunk, StreamChunk::Token(_)) {
                token_count += 1;
            }
            let finished = !matches!(chunk, StreamChunk::Token(_));
            yield chunk;
            if finished {
                return;
            }
        }

        yield StreamChunk::Done { tokens_used: token_count };
    }
}

fn stream_ollama(
    client: Client,
    url: String,
    model: String,
    prompt: String,
    temperature: f64,
) -> impl Stream<Item = StreamChunk> + Send + 'static {
    debug!("Streaming from {} with model {}", url, model);
    let body = json!({
        "model": model,
        "prompt": prompt,
        "stream": true,
        "options": { "temperature": temperature },
    });
    stream_lines(client.post(&url).json(&body), parse_ollama_line)
}

fn stream_openai_compat(
    client: Client,
    url: String,
    model: String,
    api_key: Option<String>,
    prompt: String,
    temperature: f64,
) -> impl Stream<Item = StreamChunk> + Send + 'static {
    debug!("Streaming from {} with model {}", url, model);
    let body = json!({
        "model": model,
        "messages": [{"role": "user", "content": prompt}],
        "temperature": temperature,
        "stream": true,
    });
    let mut request = client.post(&url).json(&body);
    if let Some(key) = api_key {
        request = request.header("Authorization", format!("Bearer {}", key));
    }
    stream_lines(request, parse_openai_line)
}

/// Drain a chunk stream into the full completion text.
pub async fn collect_stream<S>(mut stream: S) -> Result<String>
where
    S: Stream<Item = StreamChunk> + Unpin,
{
    let mut text = String::new();
    while let Some(chunk) = stream.next().await {
        match chunk {
            StreamChunk::Token(t) => text.push_str(&t),
            StreamChunk::Done { tokens_used } => {
                debug!("Generation finished: {} tokens", tokens_used);
                break;
            }
            StreamChunk::Error(e) => {
                error!("LLM stream error: {}", e);
                return Err(Error::Llm(e));
            }
        }
    }
    Ok(text)
}

/// HTTP text-generation client for the configured provider.
pub struct LlmClient {
    client: Client,
    config: LlmConfig,
}

impl LlmClient {
    pub fn new(config: LlmConfig) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(|e| Error::Http(e.to_string()))?;
        info!(
            "LLM client: provider={}, model={}, endpoint={}",
            config.provider,
            config.model,
            config.endpoint()
        );
        Ok(Self { client, config })
    }
}

impl TextGenerator for LlmClient {
    fn generate<'a>(&'a self, prompt: &'a str) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move {
            let stream = stream_llm(&self.client, &self.config, prompt);
            collect_stream(stream).await
        })
    }

    fn model(&self) -> &str {
        &self.config.model
    }
}
