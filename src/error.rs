use std::path::PathBuf;
use thiserror::Error;

use crate::models::{ConfigError, LoopState};

/// Main error type for tddforge. Every variant ends the session.
#[derive(Error, Debug)]
pub enum TddError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Generation error: {0}")]
    Generation(#[from] GenerationError),

    /// The generator replied, but not in the two-block format
    #[error("Failed to parse generated output: {reason}")]
    MalformedOutput {
        reason: ParseError,
        raw_output: String,
    },

    #[error("Sandbox error: {0}")]
    Sandbox(#[from] SandboxError),

    #[error("Failed to read operator input: {0}")]
    Checkpoint(std::io::Error),

    /// `run` was called on a runner that already left `Start`
    #[error("Session already finished in state {0}")]
    SessionFinished(LoopState),

    #[error("Invalid arguments: {0}")]
    InvalidArgs(String),

    #[error("Init failed: {0}")]
    InitError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TddError {
    /// The raw generator text, when the failure came from parsing it
    pub fn raw_output(&self) -> Option<&str> {
        match self {
            TddError::MalformedOutput { raw_output, .. } => Some(raw_output),
            _ => None,
        }
    }

    /// The operator interrupted the checkpoint prompt (Ctrl-C)
    pub fn is_interrupted(&self) -> bool {
        matches!(
            self,
            TddError::Checkpoint(e) if e.kind() == std::io::ErrorKind::Interrupted
        )
    }
}

/// Errors extracting a draft from generated text
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("test block not found")]
    TestBlockNotFound,

    #[error("implementation block not found")]
    ImplBlockNotFound,

    #[error("test block is empty")]
    EmptyTestBlock,

    #[error("implementation block is empty")]
    EmptyImplBlock,
}

/// Errors from text-generation providers
#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("Connection refused: {0}")]
    ConnectionRefused(String),

    #[error("Request timeout after {0} seconds")]
    Timeout(u64),

    #[error("HTTP error: {status} - {message}")]
    HttpError { status: u16, message: String },

    #[error("Failed to parse response: {0}")]
    ParseError(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Stream error: {0}")]
    StreamError(String),

    #[error("Provider returned no text")]
    EmptyResponse,

    #[error("No more scripted responses")]
    Exhausted,
}

impl From<reqwest::Error> for GenerationError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            GenerationError::Timeout(0)
        } else if err.is_connect() {
            GenerationError::ConnectionRefused(err.to_string())
        } else if let Some(status) = err.status() {
            GenerationError::HttpError {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else {
            GenerationError::RequestFailed(err.to_string())
        }
    }
}

/// Errors persisting artifacts or launching the toolchain
#[derive(Error, Debug)]
pub enum SandboxError {
    #[error("Failed to read artifact {0}: {1}")]
    ReadError(PathBuf, std::io::Error),

    #[error("Failed to stage artifact {0}: {1}")]
    StageError(PathBuf, std::io::Error),

    #[error("Failed to promote {from} to {to}: {source}")]
    PromoteError {
        from: PathBuf,
        to: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to run `{command}`: {source}")]
    SpawnError {
        command: String,
        source: std::io::Error,
    },

    #[error("No existing artifacts to resume from")]
    NothingToResume,
}

pub type Result<T> = std::result::Result<T, TddError>;
