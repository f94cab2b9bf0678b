use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::Provider;

/// Name of the config file looked up in the project directory
pub const CONFIG_FILE_NAME: &str = "tddforge.toml";

/// Configuration loaded from tddforge.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub anthropic: AnthropicConfig,
    #[serde(default)]
    pub openai: OpenAiConfig,
    #[serde(default)]
    pub ollama: OllamaConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub sandbox: SandboxConfig,
    #[serde(default)]
    pub behavior: BehaviorConfig,
}

/// Anthropic Messages API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnthropicConfig {
    #[serde(default = "default_anthropic_url")]
    pub base_url: String,
    #[serde(default, alias = "key")]
    pub api_key: String,
    #[serde(default = "default_anthropic_model")]
    pub model: String,
    /// Upper bound on tokens in a single reply
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            base_url: default_anthropic_url(),
            api_key: String::new(),
            model: default_anthropic_model(),
            max_tokens: default_max_tokens(),
        }
    }
}

fn default_anthropic_url() -> String {
    "https://api.anthropic.com".to_string()
}

fn default_anthropic_model() -> String {
    "claude-3-5-sonnet-latest".to_string()
}

fn default_max_tokens() -> u32 {
    2048
}

/// OpenAI Chat Completions API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    #[serde(default = "default_openai_url")]
    pub base_url: String,
    #[serde(default, alias = "key")]
    pub api_key: String,
    #[serde(default = "default_openai_model")]
    pub model: String,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            base_url: default_openai_url(),
            api_key: String::new(),
            model: default_openai_model(),
        }
    }
}

fn default_openai_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_openai_model() -> String {
    "chatgpt-4o-latest".to_string()
}

/// Ollama API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    /// Ollama API URL
    #[serde(default = "default_ollama_url")]
    pub url: String,
    /// Model name to use
    #[serde(default = "default_ollama_model")]
    pub model: String,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            url: default_ollama_url(),
            model: default_ollama_model(),
        }
    }
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_ollama_model() -> String {
    "qwen2.5-coder:latest".to_string()
}

/// Settings shared by every provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Which provider section is used
    #[serde(default)]
    pub provider: Provider,
    /// Timeout in seconds for a single generation request
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
    /// Echo streamed tokens to the terminal (providers that stream)
    #[serde(default = "default_stream_output")]
    pub stream_output: bool,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: Provider::default(),
            timeout_seconds: default_timeout(),
            stream_output: default_stream_output(),
        }
    }
}

fn default_timeout() -> u64 {
    300
}

fn default_stream_output() -> bool {
    true
}

/// Where the candidate artifacts live and how they are verified
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxConfig {
    /// Implementation artifact path
    #[serde(default = "default_impl_path")]
    pub impl_path: PathBuf,
    /// Test artifact path
    #[serde(default = "default_test_path")]
    pub test_path: PathBuf,
    /// Directory the toolchain runs in (defaults to the implementation's parent)
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
    /// Target language name used in prompts
    #[serde(default = "default_language")]
    pub language: String,
    /// Language tag placed on code fences in prompts
    #[serde(default = "default_fence_tag")]
    pub fence_tag: String,
    /// Commands that must succeed before tests run
    #[serde(default = "default_prepare_commands")]
    pub prepare_commands: Vec<String>,
    /// Best-effort formatting commands
    #[serde(default = "default_format_commands")]
    pub format_commands: Vec<String>,
    /// Command whose exit status decides pass/fail
    #[serde(default = "default_test_command")]
    pub test_command: String,
    /// Timeout in seconds for each toolchain command
    #[serde(default = "default_timeout")]
    pub command_timeout_seconds: u64,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            impl_path: default_impl_path(),
            test_path: default_test_path(),
            working_dir: None,
            language: default_language(),
            fence_tag: default_fence_tag(),
            prepare_commands: default_prepare_commands(),
            format_commands: default_format_commands(),
            test_command: default_test_command(),
            command_timeout_seconds: default_timeout(),
        }
    }
}

fn default_impl_path() -> PathBuf {
    PathBuf::from("./sandbox/main.go")
}

fn default_test_path() -> PathBuf {
    PathBuf::from("./sandbox/main_test.go")
}

fn default_language() -> String {
    "Go".to_string()
}

fn default_fence_tag() -> String {
    "go".to_string()
}

fn default_prepare_commands() -> Vec<String> {
    vec!["go mod tidy".to_string()]
}

fn default_format_commands() -> Vec<String> {
    vec!["gofmt -w .".to_string(), "goimports -w .".to_string()]
}

fn default_test_command() -> String {
    "go test . -v".to_string()
}

impl SandboxConfig {
    /// Directory commands run in: explicit `working_dir`, else the implementation's parent
    pub fn effective_working_dir(&self) -> PathBuf {
        if let Some(dir) = &self.working_dir {
            return dir.clone();
        }
        match self.impl_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }
}

/// Behavior configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BehaviorConfig {
    /// Stop after this many failed iterations (unbounded when unset)
    #[serde(default)]
    pub max_iterations: Option<u32>,
    /// Show a side-by-side diff of old vs new artifacts before applying them
    #[serde(default)]
    pub show_diff: bool,
}

/// Values given on the command line that take precedence over the file
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub provider: Option<Provider>,
    pub model: Option<String>,
    pub timeout: Option<u64>,
    pub no_stream: bool,
    pub impl_path: Option<PathBuf>,
    pub test_path: Option<PathBuf>,
    pub show_diff: bool,
    pub max_iterations: Option<u32>,
}

impl Config {
    /// Load config from a TOML file
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(path.to_path_buf(), e))?;
        toml::from_str(&contents).map_err(|e| ConfigError::ParseError(path.to_path_buf(), e))
    }

    /// Try to load config from tddforge.toml in the given directory
    pub fn load_from_dir(dir: &Path) -> Result<Self, ConfigError> {
        let config_path = dir.join(CONFIG_FILE_NAME);
        if config_path.exists() {
            Self::load_from_file(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Merge CLI overrides into the config. `model` applies to every provider
    /// section since only one of them is used per run.
    pub fn with_overrides(mut self, overrides: ConfigOverrides) -> Self {
        if let Some(p) = overrides.provider {
            self.generation.provider = p;
        }
        if let Some(m) = overrides.model {
            self.anthropic.model = m.clone();
            self.openai.model = m.clone();
            self.ollama.model = m;
        }
        if let Some(t) = overrides.timeout {
            self.generation.timeout_seconds = t;
        }
        if overrides.no_stream {
            self.generation.stream_output = false;
        }
        if let Some(p) = overrides.impl_path {
            self.sandbox.impl_path = p;
        }
        if let Some(p) = overrides.test_path {
            self.sandbox.test_path = p;
        }
        if overrides.show_diff {
            self.behavior.show_diff = true;
        }
        if let Some(max) = overrides.max_iterations {
            self.behavior.max_iterations = Some(max);
        }
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {0}: {1}")]
    ReadError(PathBuf, std::io::Error),
    #[error("Failed to parse config file {0}: {1}")]
    ParseError(PathBuf, toml::de::Error),
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),
    #[error("Missing API key for {provider}: set `api_key` in the [{section}] section")]
    MissingApiKey {
        provider: String,
        section: &'static str,
    },
    #[error("max_iterations must be at least 1")]
    InvalidIterationLimit,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.anthropic.base_url, "https://api.anthropic.com");
        assert_eq!(config.anthropic.max_tokens, 2048);
        assert_eq!(config.openai.base_url, "https://api.openai.com/v1");
        assert_eq!(config.ollama.url, "http://localhost:11434");
        assert_eq!(config.generation.provider, Provider::Anthropic);
        assert_eq!(config.generation.timeout_seconds, 300);
        assert!(config.generation.stream_output);
        assert_eq!(config.sandbox.impl_path, PathBuf::from("./sandbox/main.go"));
        assert_eq!(config.sandbox.test_path, PathBuf::from("./sandbox/main_test.go"));
        assert_eq!(config.sandbox.test_command, "go test . -v");
        assert_eq!(config.sandbox.prepare_commands, vec!["go mod tidy"]);
        assert_eq!(config.sandbox.format_commands.len(), 2);
        assert_eq!(config.sandbox.fence_tag, "go");
        assert!(config.behavior.max_iterations.is_none());
        assert!(!config.behavior.show_diff);
    }

    #[test]
    fn test_config_with_overrides() {
        let config = Config::default().with_overrides(ConfigOverrides {
            provider: Some(Provider::Ollama),
            model: Some("llama3".to_string()),
            timeout: Some(600),
            no_stream: true,
            impl_path: Some(PathBuf::from("work/lib.go")),
            test_path: None,
            show_diff: true,
            max_iterations: Some(4),
        });
        assert_eq!(config.generation.provider, Provider::Ollama);
        assert_eq!(config.anthropic.model, "llama3");
        assert_eq!(config.openai.model, "llama3");
        assert_eq!(config.ollama.model, "llama3");
        assert_eq!(config.generation.timeout_seconds, 600);
        assert!(!config.generation.stream_output);
        assert_eq!(config.sandbox.impl_path, PathBuf::from("work/lib.go"));
        assert_eq!(config.sandbox.test_path, PathBuf::from("./sandbox/main_test.go"));
        assert!(config.behavior.show_diff);
        assert_eq!(config.behavior.max_iterations, Some(4));
    }

    #[test]
    fn test_empty_overrides_keep_file_values() {
        let mut config = Config::default();
        config.behavior.show_diff = true;
        config.behavior.max_iterations = Some(3);
        let config = config.with_overrides(ConfigOverrides::default());
        assert!(config.behavior.show_diff);
        assert_eq!(config.behavior.max_iterations, Some(3));
        assert!(config.generation.stream_output);
    }

    #[test]
    fn test_parse_toml() {
        let toml_str = r#"
[anthropic]
base_url = "https://proxy.internal"
key = "sk-ant-test"

[openai]
api_key = "sk-test"
model = "gpt-4o"

[generation]
provider = "oai"

[sandbox]
impl_path = "work/main.go"
test_path = "work/main_test.go"
prepare_commands = []
command_timeout_seconds = 30

[behavior]
max_iterations = 5
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.anthropic.base_url, "https://proxy.internal");
        assert_eq!(config.anthropic.api_key, "sk-ant-test");
        assert_eq!(config.anthropic.model, "claude-3-5-sonnet-latest"); // default
        assert_eq!(config.openai.api_key, "sk-test");
        assert_eq!(config.openai.model, "gpt-4o");
        assert_eq!(config.generation.provider, Provider::Openai);
        assert!(config.generation.stream_output); // default
        assert_eq!(config.sandbox.impl_path, PathBuf::from("work/main.go"));
        assert!(config.sandbox.prepare_commands.is_empty());
        assert_eq!(config.sandbox.command_timeout_seconds, 30);
        assert_eq!(config.sandbox.test_command, "go test . -v"); // default
        assert_eq!(config.behavior.max_iterations, Some(5));
    }

    #[test]
    fn test_effective_working_dir() {
        let mut sandbox = SandboxConfig::default();
        assert_eq!(sandbox.effective_working_dir(), PathBuf::from("./sandbox"));

        sandbox.impl_path = PathBuf::from("main.go");
        assert_eq!(sandbox.effective_working_dir(), PathBuf::from("."));

        sandbox.working_dir = Some(PathBuf::from("/tmp/work"));
        assert_eq!(sandbox.effective_working_dir(), PathBuf::from("/tmp/work"));
    }
}
