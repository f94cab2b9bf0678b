use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{endpoint, http_client, map_send_error, TextGenerator};
use crate::core::prompts::SYSTEM_PROMPT_TDD;
use crate::error::GenerationError;
use crate::models::AnthropicConfig;

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic Messages API client
pub struct AnthropicClient {
    client: Client,
    config: AnthropicConfig,
    timeout_seconds: u64,
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<RequestMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

impl MessagesResponse {
    /// Concatenate every text block; other block kinds are skipped with a warning
    fn into_text(self) -> String {
        let mut text = String::new();
        for block in self.content {
            if block.kind != "text" {
                warn!("Skipping unexpected content block type: {}", block.kind);
                continue;
            }
            text.push_str(&block.text);
        }
        text
    }
}

impl AnthropicClient {
    pub fn new(config: AnthropicConfig, timeout_seconds: u64) -> Result<Self, GenerationError> {
        Ok(Self {
            client: http_client(timeout_seconds)?,
            config,
            timeout_seconds,
        })
    }
}

#[async_trait]
impl TextGenerator for AnthropicClient {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let url = endpoint(&self.config.base_url, "v1/messages");
        let request = MessagesRequest {
            model: &self.config.model,
            max_tokens: self.config.max_tokens,
            system: SYSTEM_PROMPT_TDD,
            messages: vec![RequestMessage { role: "user", content: prompt }],
        };

        debug!("Sending messages request to {} (model {})", url, self.config.model);

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .send()
            .await
            .map_err(|e| map_send_error(e, &url, self.timeout_seconds))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(GenerationError::HttpError { status, message });
        }

        let body: MessagesResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::ParseError(e.to_string()))?;

        if let Some(reason) = &body.stop_reason {
            debug!("Stop reason: {}", reason);
        }

        let text = body.into_text();
        if text.trim().is_empty() {
            return Err(GenerationError::EmptyResponse);
        }

        info!("Generated {} characters", text.len());
        Ok(text)
    }

    fn name(&self) -> &str {
        "anthropic"
    }
}
