//! tddforge - test-first code generation loop
//!
//! tddforge asks a text-generation model for a unit test and an implementation,
//! runs the test in a local sandbox, and feeds failures back to the model until
//! the test passes or the operator stops.
//!
//! # Architecture
//!
//! - **commands**: CLI command implementations (init, run)
//! - **core**: the runner state machine, output parser, prompts, sandbox, generators, checkpoint
//! - **models**: Data structures (config, provider, session)
//! - **templates**: starter files written by `init`
//! - **error**: Error types

pub mod commands;
pub mod core;
pub mod error;
pub mod models;
pub mod templates;

pub use error::{Result, TddError};
