use std::path::Path;
use tracing::info;

use crate::error::Result;
use crate::models::{Config, ConfigError, ConfigOverrides};

/// Load configuration with CLI overrides.
///
/// An explicit `config_path` must exist. Without one, `tddforge.toml` in
/// `project_root` is used when present, defaults otherwise.
pub fn load_config(
    project_root: &Path,
    config_path: Option<&Path>,
    overrides: ConfigOverrides,
) -> Result<Config> {
    let config = match config_path {
        Some(path) => {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()).into());
            }
            Config::load_from_file(path)?
        }
        None => Config::load_from_dir(project_root)?,
    };
    let config = config.with_overrides(overrides);

    if config.behavior.max_iterations == Some(0) {
        return Err(ConfigError::InvalidIterationLimit.into());
    }

    info!(
        "Configuration loaded: provider={}, timeout={}s, impl={}, test={}",
        config.generation.provider,
        config.generation.timeout_seconds,
        config.sandbox.impl_path.display(),
        config.sandbox.test_path.display()
    );

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TddError;
    use crate::models::Provider;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[test]
    fn test_load_config_default() {
        let temp_dir = TempDir::new().unwrap();
        let config = load_config(temp_dir.path(), None, ConfigOverrides::default()).unwrap();

        assert_eq!(config.generation.provider, Provider::Anthropic);
        assert_eq!(config.sandbox.test_command, "go test . -v");
    }

    #[test]
    fn test_load_config_from_dir() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(
            temp_dir.path().join("tddforge.toml"),
            r#"
[generation]
provider = "ollama"

[ollama]
model = "llama3"
url = "http://custom:8080"
"#,
        )
        .unwrap();

        let config = load_config(temp_dir.path(), None, ConfigOverrides::default()).unwrap();
        assert_eq!(config.generation.provider, Provider::Ollama);
        assert_eq!(config.ollama.model, "llama3");
        assert_eq!(config.ollama.url, "http://custom:8080");
    }

    #[test]
    fn test_load_config_explicit_path() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("custom.toml");
        fs::write(&path, "[anthropic]\nkey = \"sk-ant\"\n").unwrap();

        let config = load_config(temp_dir.path(), Some(&path), ConfigOverrides::default()).unwrap();
        assert_eq!(config.anthropic.api_key, "sk-ant");
    }

    #[test]
    fn test_load_config_explicit_path_missing() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("nope.toml");
        let err = load_config(temp_dir.path(), Some(&missing), ConfigOverrides::default())
            .unwrap_err();
        assert!(matches!(err, TddError::Config(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_load_config_invalid_toml() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("tddforge.toml"), "[sandbox\nbroken").unwrap();
        let err = load_config(temp_dir.path(), None, ConfigOverrides::default()).unwrap_err();
        assert!(matches!(err, TddError::Config(ConfigError::ParseError(_, _))));
    }

    #[test]
    fn test_load_config_with_overrides() {
        let temp_dir = TempDir::new().unwrap();
        let config = load_config(
            temp_dir.path(),
            None,
            ConfigOverrides {
                provider: Some(Provider::Openai),
                test_path: Some(PathBuf::from("w/x_test.go")),
                max_iterations: Some(2),
                ..ConfigOverrides::default()
            },
        )
        .unwrap();

        assert_eq!(config.generation.provider, Provider::Openai);
        assert_eq!(config.sandbox.test_path, PathBuf::from("w/x_test.go"));
        assert_eq!(config.behavior.max_iterations, Some(2));
    }

    #[test]
    fn test_zero_iteration_limit_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let err = load_config(
            temp_dir.path(),
            None,
            ConfigOverrides {
                max_iterations: Some(0),
                ..ConfigOverrides::default()
            },
        )
        .unwrap_err();
        assert!(matches!(err, TddError::Config(ConfigError::InvalidIterationLimit)));
    }
}
