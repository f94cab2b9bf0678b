use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::io::{self, Write};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::{endpoint, http_client, map_send_error, TextGenerator};
use crate::core::prompts::SYSTEM_PROMPT_TDD;
use crate::error::GenerationError;
use crate::models::OllamaConfig;

/// No tokens for this long means the model has stalled
const STALL_TIMEOUT: Duration = Duration::from_secs(120);

/// Ollama API client
pub struct OllamaClient {
    client: Client,
    config: OllamaConfig,
    timeout_seconds: u64,
    stream_to_stdout: bool,
}

/// Chat message for Ollama chat API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: "system".to_string(), content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".to_string(), content: content.into() }
    }
}

/// Request body for Ollama chat endpoint
#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
}

/// Response from Ollama chat endpoint (streaming)
#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    message: Option<ChatMessageResponse>,
    #[serde(default)]
    done: bool,
    /// Set instead of `message` when the server fails mid-stream
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    total_duration: Option<u64>,
    #[serde(default)]
    eval_count: Option<u64>,
}

/// Message content in chat response
#[derive(Debug, Deserialize)]
struct ChatMessageResponse {
    #[serde(default)]
    role: String,
    #[serde(default)]
    content: String,
}

impl OllamaClient {
    /// Create a new Ollama client with the given configuration
    pub fn new(
        config: OllamaConfig,
        timeout_seconds: u64,
        stream_to_stdout: bool,
    ) -> Result<Self, GenerationError> {
        Ok(Self {
            client: http_client(timeout_seconds)?,
            config,
            timeout_seconds,
            stream_to_stdout,
        })
    }

    /// Send one chat request and collect the streamed reply.
    ///
    /// When `stream_to_stdout` is set every token is echoed as it arrives;
    /// otherwise progress is logged every few seconds.
    pub async fn chat(
        &self,
        system_prompt: Option<&str>,
        prompt: &str,
        stream_to_stdout: bool,
    ) -> Result<String, GenerationError> {
        let url = endpoint(&self.config.url, "api/chat");

        let mut messages = Vec::new();
        if let Some(sys) = system_prompt {
            messages.push(ChatMessage::system(sys));
        }
        messages.push(ChatMessage::user(prompt));

        let request = ChatRequest {
            model: self.config.model.clone(),
            messages,
            stream: true,
        };

        debug!("Sending chat request to Ollama: {} (model {})", url, self.config.model);

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| map_send_error(e, &url, self.timeout_seconds))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(GenerationError::HttpError { status, message });
        }

        let mut full_response = String::new();
        let mut stream = response.bytes_stream();
        let mut lines = LineBuffer::default();
        let mut token_count = 0usize;
        let mut last_progress_log = Instant::now();
        let mut last_token_time = Instant::now();
        let progress_interval = Duration::from_secs(10);
        let mut finished = false;

        'outer: while let Some(chunk_result) = stream.next().await {
            let chunk = chunk_result.map_err(|e| GenerationError::StreamError(e.to_string()))?;

            if last_token_time.elapsed() > STALL_TIMEOUT {
                warn!("Generation stalled - no tokens received for {:?}", STALL_TIMEOUT);
                return Err(GenerationError::Timeout(STALL_TIMEOUT.as_secs()));
            }

            // Ollama sends newline-delimited JSON
            lines.push(&chunk);
            while let Some(line) = lines.next_line() {
                let Some(parsed) = decode_line(&line)? else {
                    continue;
                };

                let content = parsed.message.as_ref().map(|m| m.content.as_str()).unwrap_or("");
                full_response.push_str(content);
                token_count += 1;
                last_token_time = Instant::now();

                if stream_to_stdout {
                    print!("{}", content);
                    io::stdout().flush().ok();
                } else if last_progress_log.elapsed() > progress_interval {
                    info!(
                        "Generation in progress: {} tokens, {} chars so far...",
                        token_count,
                        full_response.len()
                    );
                    last_progress_log = Instant::now();
                }

                if parsed.done {
                    if stream_to_stdout {
                        println!();
                    }
                    if let Some(duration) = parsed.total_duration {
                        debug!("Generation completed in {}ms", duration / 1_000_000);
                    }
                    if let Some(count) = parsed.eval_count {
                        debug!("Tokens generated: {}", count);
                    }
                    finished = true;
                    break 'outer;
                }
            }
        }

        if !finished {
            // a final line without its newline is only trusted if it parses
            let rest = lines.take_rest();
            match decode_line(&rest) {
                Ok(Some(parsed)) => {
                    if let Some(message) = parsed.message {
                        full_response.push_str(&message.content);
                    }
                }
                Ok(None) => {}
                Err(GenerationError::ParseError(e)) if !full_response.is_empty() => {
                    debug!("Ignoring incomplete final chunk: {}", e);
                }
                Err(e) => return Err(e),
            }
        }

        if full_response.trim().is_empty() {
            return Err(GenerationError::EmptyResponse);
        }

        info!("Generated {} characters", full_response.len());
        Ok(full_response)
    }
}

/// Accumulates raw stream bytes and hands out complete lines.
///
/// Lines are split on raw bytes so a multi-byte character cut by a chunk
/// boundary is only decoded once both halves have arrived.
#[derive(Debug, Default)]
struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    fn push(&mut self, chunk: &[u8]) {
        self.pending.extend_from_slice(chunk);
    }

    /// Next complete line, without its newline
    fn next_line(&mut self) -> Option<Vec<u8>> {
        let pos = self.pending.iter().position(|b| *b == b'\n')?;
        let mut line: Vec<u8> = self.pending.drain(..=pos).collect();
        line.pop();
        Some(line)
    }

    /// Whatever is left after the stream ends
    fn take_rest(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.pending)
    }
}

/// Decode one NDJSON line. Blank lines yield `None`, server errors become `StreamError`.
fn decode_line(line: &[u8]) -> Result<Option<ChatResponse>, GenerationError> {
    let text = std::str::from_utf8(line)
        .map_err(|e| GenerationError::ParseError(format!("Invalid UTF-8 in stream: {}", e)))?
        .trim();
    if text.is_empty() {
        return Ok(None);
    }

    let parsed: ChatResponse = serde_json::from_str(text).map_err(|e| {
        let preview: String = text.chars().take(200).collect();
        GenerationError::ParseError(format!("Failed to parse: {} - {}", preview, e))
    })?;

    if let Some(message) = &parsed.error {
        warn!("Ollama reported an error mid-stream: {}", message);
        return Err(GenerationError::StreamError(message.clone()));
    }
    Ok(Some(parsed))
}

#[async_trait]
impl TextGenerator for OllamaClient {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        self.chat(Some(SYSTEM_PROMPT_TDD), prompt, self.stream_to_stdout).await
    }

    fn name(&self) -> &str {
        "ollama"
    }
}
