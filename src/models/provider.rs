//! Text-generation provider selection

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Supported text-generation providers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// Anthropic Messages API
    #[default]
    Anthropic,
    /// OpenAI Chat Completions API
    #[value(alias = "oai")]
    #[serde(alias = "oai")]
    Openai,
    /// Local Ollama chat API
    Ollama,
}

impl Provider {
    /// Returns the display name for the provider
    pub fn display_name(&self) -> &'static str {
        match self {
            Provider::Anthropic => "Anthropic",
            Provider::Openai => "OpenAI",
            Provider::Ollama => "Ollama",
        }
    }

    /// Key used in `tddforge.toml`, both as the provider value and the section name
    pub fn config_key(&self) -> &'static str {
        match self {
            Provider::Anthropic => "anthropic",
            Provider::Openai => "openai",
            Provider::Ollama => "ollama",
        }
    }

    /// Whether the provider needs an API key to be configured
    pub fn requires_api_key(&self) -> bool {
        matches!(self, Provider::Anthropic | Provider::Openai)
    }

    /// Returns all available providers
    pub fn all() -> &'static [Provider] {
        &[Provider::Anthropic, Provider::Openai, Provider::Ollama]
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}
