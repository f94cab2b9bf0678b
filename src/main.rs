use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, Level};
use tracing_subscriber::FmtSubscriber;

use tddforge::commands::{init_project, run_session, RunOptions};
use tddforge::models::{Provider, SessionOutcome};

/// tddforge - test-first code generation with a human in the loop
#[derive(Parser)]
#[command(name = "tddforge")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a starter tddforge.toml and sandbox module
    Init {
        /// Project directory (defaults to current directory)
        #[arg(short, long)]
        path: Option<PathBuf>,

        /// Provider to configure (prompted for when omitted)
        #[arg(long, value_enum)]
        provider: Option<Provider>,
    },

    /// Generate, test and iterate until the test passes
    Run {
        /// Requirements for the function to implement
        #[arg(long)]
        spec: String,

        /// Function signature to implement
        #[arg(long)]
        sig: String,

        /// Config file (defaults to ./tddforge.toml when present)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Text-generation provider
        #[arg(long, value_enum)]
        provider: Option<Provider>,

        /// Implementation file path
        #[arg(long)]
        impl_file: Option<PathBuf>,

        /// Test file path
        #[arg(long)]
        test_file: Option<PathBuf>,

        /// Show a side-by-side diff for each new draft
        #[arg(long)]
        diff: bool,

        /// Test the code already on disk before generating
        #[arg(long)]
        iterate: bool,

        /// Stop after this many failed iterations
        #[arg(long)]
        max_iterations: Option<u32>,

        /// Override the model to use
        #[arg(long)]
        model: Option<String>,

        /// Override the generation timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Disable streaming output
        #[arg(long)]
        no_stream: bool,
    },
}

const EXIT_FATAL: u8 = 1;
const EXIT_ABORTED: u8 = 2;
const EXIT_INTERRUPTED: u8 = 130;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Logs go to stderr so stdout stays for test output and generated text
    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    tokio::select! {
        code = execute(cli.command) => code,
        _ = tokio::signal::ctrl_c() => {
            error!("Interrupted");
            // a checkpoint blocked on stdin would keep the runtime from shutting down
            std::process::exit(i32::from(EXIT_INTERRUPTED))
        }
    }
}

async fn execute(command: Commands) -> ExitCode {
    let result = match command {
        Commands::Init { path, provider } => current_dir_or(path).and_then(|root| {
            init_project(&root, provider).context("Failed to initialize project")
        }),

        Commands::Run {
            spec,
            sig,
            config,
            provider,
            impl_file,
            test_file,
            diff,
            iterate,
            max_iterations,
            model,
            timeout,
            no_stream,
        } => {
            let options = RunOptions {
                spec,
                sig,
                config,
                provider,
                impl_file,
                test_file,
                diff,
                iterate,
                max_iterations,
                model,
                timeout,
                no_stream,
            };
            match current_dir_or(None) {
                Ok(root) => match run_session(&root, options).await {
                    Ok(report) => match report.outcome {
                        SessionOutcome::Passed { .. } => Ok(()),
                        SessionOutcome::Aborted { .. } => return ExitCode::from(EXIT_ABORTED),
                    },
                    Err(e) if e.is_interrupted() => {
                        error!("Interrupted");
                        return ExitCode::from(EXIT_INTERRUPTED);
                    }
                    Err(e) => Err(anyhow::Error::new(e).context("Session failed")),
                },
                Err(e) => Err(e),
            }
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(EXIT_FATAL)
        }
    }
}

fn current_dir_or(path: Option<PathBuf>) -> anyhow::Result<PathBuf> {
    match path {
        Some(p) => Ok(p),
        None => std::env::current_dir().context("Failed to resolve current directory"),
    }
}
