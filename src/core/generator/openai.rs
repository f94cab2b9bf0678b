use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use super::{endpoint, http_client, map_send_error, TextGenerator};
use crate::core::prompts::SYSTEM_PROMPT_TDD;
use crate::error::GenerationError;
use crate::models::OpenAiConfig;

/// OpenAI Chat Completions client
pub struct OpenAiClient {
    client: Client,
    config: OpenAiConfig,
    timeout_seconds: u64,
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<CompletionMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct CompletionMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl CompletionResponse {
    fn first_content(self) -> Option<String> {
        self.choices.into_iter().next().and_then(|c| c.message.content)
    }
}

impl OpenAiClient {
    pub fn new(config: OpenAiConfig, timeout_seconds: u64) -> Result<Self, GenerationError> {
        Ok(Self {
            client: http_client(timeout_seconds)?,
            config,
            timeout_seconds,
        })
    }
}

#[async_trait]
impl TextGenerator for OpenAiClient {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let url = endpoint(&self.config.base_url, "chat/completions");
        let request = CompletionRequest {
            model: &self.config.model,
            messages: vec![
                CompletionMessage { role: "system", content: SYSTEM_PROMPT_TDD },
                CompletionMessage { role: "user", content: prompt },
            ],
        };

        debug!("Sending chat completion request to {} (model {})", url, self.config.model);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| map_send_error(e, &url, self.timeout_seconds))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(GenerationError::HttpError { status, message });
        }

        let body: CompletionResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::ParseError(e.to_string()))?;

        let Some(text) = body.first_content().filter(|t| !t.trim().is_empty()) else {
            error!("No choices returned from {}", url);
            return Err(GenerationError::EmptyResponse);
        };

        info!("Generated {} characters", text.len());
        Ok(text)
    }

    fn name(&self) -> &str {
        "openai"
    }
}
