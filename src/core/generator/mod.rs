//! Text-generation providers behind a single `TextGenerator` capability.

mod anthropic;
mod ollama;
mod openai;

pub use anthropic::AnthropicClient;
pub use ollama::{ChatMessage, OllamaClient};
pub use openai::OpenAiClient;

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::info;

use crate::error::{GenerationError, TddError};
use crate::models::{Config, ConfigError, Provider};

/// Turns a prompt into generated text. No retries: a failure ends the session.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError>;

    /// Short label for logs
    fn name(&self) -> &str;
}

#[async_trait]
impl<T: TextGenerator + ?Sized> TextGenerator for Box<T> {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        (**self).generate(prompt).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Build the generator for `provider` from the matching config section
pub fn create_generator(
    provider: Provider,
    config: &Config,
) -> Result<Box<dyn TextGenerator>, TddError> {
    let timeout = config.generation.timeout_seconds;
    let generator: Box<dyn TextGenerator> = match provider {
        Provider::Anthropic => {
            require_key(&config.anthropic.api_key, provider)?;
            Box::new(AnthropicClient::new(config.anthropic.clone(), timeout)?)
        }
        Provider::Openai => {
            require_key(&config.openai.api_key, provider)?;
            Box::new(OpenAiClient::new(config.openai.clone(), timeout)?)
        }
        Provider::Ollama => Box::new(OllamaClient::new(
            config.ollama.clone(),
            timeout,
            config.generation.stream_output,
        )?),
    };
    info!("Using {} generator", generator.name());
    Ok(generator)
}

fn require_key(key: &str, provider: Provider) -> Result<(), ConfigError> {
    if key.trim().is_empty() {
        return Err(ConfigError::MissingApiKey {
            provider: provider.display_name().to_string(),
            section: provider.config_key(),
        });
    }
    Ok(())
}

/// Shared reqwest client with the configured request timeout
pub(crate) fn http_client(timeout_seconds: u64) -> Result<Client, GenerationError> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_seconds))
        .build()
        .map_err(|e| GenerationError::RequestFailed(e.to_string()))
}

/// Join a base URL and an endpoint path without doubling or dropping slashes
pub(crate) fn endpoint(base_url: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Map a send error, keeping the configured timeout and a readable connect message
pub(crate) fn map_send_error(err: reqwest::Error, url: &str, timeout: u64) -> GenerationError {
    if err.is_connect() {
        GenerationError::ConnectionRefused(format!("Could not connect to {}", url))
    } else if err.is_timeout() {
        GenerationError::Timeout(timeout)
    } else {
        GenerationError::from(err)
    }
}
