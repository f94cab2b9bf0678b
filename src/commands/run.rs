use std::path::{Path, PathBuf};
use tracing::info;

use crate::core::{
    create_generator, load_config, LocalSandbox, PromptBuilder, Runner, RunnerOptions,
    TerminalCheckpoint,
};
use crate::error::{Result, TddError};
use crate::models::{ConfigOverrides, Provider, RunReport, Session, SessionOutcome};

/// Run options
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Requirements for the function to implement
    pub spec: String,
    /// Function signature to implement
    pub sig: String,
    /// Explicit config file (otherwise tddforge.toml in the project root)
    pub config: Option<PathBuf>,
    /// Provider override
    pub provider: Option<Provider>,
    /// Implementation artifact path override
    pub impl_file: Option<PathBuf>,
    /// Test artifact path override
    pub test_file: Option<PathBuf>,
    /// Show a diff of each new draft against the previous one
    pub diff: bool,
    /// Start by testing the code already on disk
    pub iterate: bool,
    /// Stop after this many failed iterations
    pub max_iterations: Option<u32>,
    /// Model override
    pub model: Option<String>,
    /// Timeout override
    pub timeout: Option<u64>,
    /// Disable streaming output
    pub no_stream: bool,
}

impl RunOptions {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            provider: self.provider,
            model: self.model.clone(),
            timeout: self.timeout,
            no_stream: self.no_stream,
            impl_path: self.impl_file.clone(),
            test_path: self.test_file.clone(),
            show_diff: self.diff,
            max_iterations: self.max_iterations,
        }
    }
}

/// Run one test-first session against the local sandbox
pub async fn run_session(project_root: &Path, options: RunOptions) -> Result<RunReport> {
    if options.spec.trim().is_empty() || options.sig.trim().is_empty() {
        return Err(TddError::InvalidArgs(
            "requirements and function signature are required".to_string(),
        ));
    }

    let config = load_config(project_root, options.config.as_deref(), options.overrides())?;

    let generator = create_generator(config.generation.provider, &config)?;
    let sandbox = LocalSandbox::from_config(&config.sandbox);
    let prompts = PromptBuilder::new(&config.sandbox.language, &config.sandbox.fence_tag);
    let runner_options = RunnerOptions {
        resume: options.iterate,
        show_diff: config.behavior.show_diff,
        max_iterations: config.behavior.max_iterations,
    };

    info!(
        "Starting session: impl={}, test={}, working dir={}",
        sandbox.impl_path().display(),
        sandbox.test_path().display(),
        sandbox.working_dir().display()
    );

    let mut runner = Runner::new(
        generator,
        sandbox,
        TerminalCheckpoint::new(),
        prompts,
        Session::new(options.spec, options.sig),
        runner_options,
    )?;
    let report = runner.run().await?;

    print_report(&report);
    Ok(report)
}

fn print_report(report: &RunReport) {
    println!();
    match report.outcome {
        SessionOutcome::Passed { iterations } => {
            println!("PASSED after {} iteration(s)", iterations);
        }
        SessionOutcome::Aborted { reason } => {
            println!("ABORTED on iteration {}: {}", report.iterations, reason);
        }
    }
    println!("Generation calls: {}", report.generation_calls);
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_run_requires_spec_and_signature() {
        let temp = TempDir::new().unwrap();
        let err = run_session(
            temp.path(),
            RunOptions {
                spec: "reverse a string".to_string(),
                ..RunOptions::default()
            },
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("function signature are required"));
    }

    #[tokio::test]
    async fn test_run_missing_api_key_fails_before_generation() {
        let temp = TempDir::new().unwrap();
        let err = run_session(
            temp.path(),
            RunOptions {
                spec: "reverse a string".to_string(),
                sig: "func Reverse(s string) string".to_string(),
                provider: Some(Provider::Anthropic),
                ..RunOptions::default()
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, TddError::Config(_)));
    }
}
