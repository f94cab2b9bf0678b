use std::fs;
use std::path::Path;
use tracing::info;

use dialoguer::{theme::ColorfulTheme, Select};

use crate::error::{Result, TddError};
use crate::models::{Provider, CONFIG_FILE_NAME};
use crate::templates::{config_template, go::GO_MOD};

/// Write a starter config and sandbox module for the specified or selected provider
pub fn init_project(project_root: &Path, provider: Option<Provider>) -> Result<()> {
    let provider = match provider {
        Some(p) => p,
        None => prompt_for_provider()?,
    };

    info!("Initializing project for {}", provider.display_name());

    let sandbox_dir = project_root.join("sandbox");
    if !sandbox_dir.exists() {
        fs::create_dir_all(&sandbox_dir)?;
        info!("Created sandbox directory: {}", sandbox_dir.display());
    } else {
        info!("Sandbox directory already exists: {}", sandbox_dir.display());
    }

    create_file_if_not_exists(
        &project_root.join(CONFIG_FILE_NAME),
        &config_template(provider),
    )?;
    create_file_if_not_exists(&sandbox_dir.join("go.mod"), GO_MOD)?;

    print_next_steps(project_root, provider);
    Ok(())
}

fn prompt_for_provider() -> Result<Provider> {
    let providers = Provider::all();
    let items: Vec<&str> = providers.iter().map(|p| p.display_name()).collect();

    let selection = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("Select text-generation provider")
        .items(&items)
        .default(0)
        .interact()
        .map_err(|e| TddError::InitError(format!("Failed to get user input: {}", e)))?;

    Ok(providers[selection])
}

fn create_file_if_not_exists(path: &Path, content: &str) -> Result<()> {
    if !path.exists() {
        fs::write(path, content)?;
        info!("Created file: {}", path.display());
    } else {
        info!("File already exists: {}", path.display());
    }
    Ok(())
}

fn print_next_steps(project_root: &Path, provider: Provider) {
    println!("tddforge project initialized at {}", project_root.display());
    println!("\nProvider: {}", provider.display_name());
    println!("\nNext steps:");
    if provider.requires_api_key() {
        println!(
            "1. Set `key` in the [{}] section of {}",
            provider.config_key(),
            CONFIG_FILE_NAME
        );
    } else {
        println!("1. Make sure Ollama is running and the model in [ollama] is pulled");
    }
    println!("2. Run: tddforge run --spec \"<requirements>\" --sig \"<function signature>\"");
    println!("\nTip: use --iterate to pick up from the code already in sandbox/");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Config;
    use tempfile::TempDir;

    #[test]
    fn test_init_writes_config_and_go_mod() {
        let temp = TempDir::new().unwrap();
        init_project(temp.path(), Some(Provider::Ollama)).unwrap();

        let config = Config::load_from_dir(temp.path()).unwrap();
        assert_eq!(config.generation.provider, Provider::Ollama);
        assert_eq!(
            fs::read_to_string(temp.path().join("sandbox/go.mod")).unwrap(),
            GO_MOD
        );
    }

    #[test]
    fn test_init_keeps_existing_files() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(CONFIG_FILE_NAME), "# mine\n").unwrap();

        init_project(temp.path(), Some(Provider::Anthropic)).unwrap();
        assert_eq!(
            fs::read_to_string(temp.path().join(CONFIG_FILE_NAME)).unwrap(),
            "# mine\n"
        );
    }
}
