//! Common test utilities

#![allow(dead_code)]

use std::path::Path;
use tempfile::TempDir;

use tddforge::core::{
    InMemorySandbox, PromptBuilder, Runner, RunnerOptions, ScriptedCheckpoint, ScriptedGenerator,
};
use tddforge::models::{SandboxConfig, Session, TestOutcome};

pub const REQUIREMENTS: &str = "Reverse a string, keeping multi-byte characters intact";
pub const SIGNATURE: &str = "func Reverse(s string) string";

pub type FakeRunner = Runner<ScriptedGenerator, InMemorySandbox, ScriptedCheckpoint>;

/// Generator reply in the two-block format
pub fn reply(test_code: &str, impl_code: &str) -> String {
    format!(
        "Here is the test.\n\n```go\n{}\n```\n\nAnd the implementation:\n\n```go\n{}\n```\n",
        test_code, impl_code
    )
}

/// Distinct reply for the n-th generation
pub fn nth_reply(n: u32) -> String {
    reply(&test_code(n), &impl_code(n))
}

pub fn test_code(n: u32) -> String {
    format!("func TestReverse{}(t *testing.T) {{}}", n)
}

pub fn impl_code(n: u32) -> String {
    format!("func Reverse(s string) string {{ return s }} // v{}", n)
}

/// Runner over fakes with the given script
pub fn fake_runner(
    replies: Vec<String>,
    outcomes: Vec<TestOutcome>,
    answers: &[&str],
    options: RunnerOptions,
) -> FakeRunner {
    fake_runner_with(
        ScriptedGenerator::new(replies),
        InMemorySandbox::new(outcomes),
        answers,
        options,
    )
}

pub fn fake_runner_with(
    generator: ScriptedGenerator,
    sandbox: InMemorySandbox,
    answers: &[&str],
    options: RunnerOptions,
) -> FakeRunner {
    Runner::new(
        generator,
        sandbox,
        ScriptedCheckpoint::new(answers.iter().copied()),
        PromptBuilder::default(),
        Session::new(REQUIREMENTS, SIGNATURE),
        options,
    )
    .expect("Failed to build runner")
}

/// Sandbox config rooted in a temp dir that runs `test_command` and nothing else
pub fn sandbox_config(root: &Path, test_command: &str) -> SandboxConfig {
    SandboxConfig {
        impl_path: root.join("sandbox/main.go"),
        test_path: root.join("sandbox/main_test.go"),
        prepare_commands: Vec::new(),
        format_commands: Vec::new(),
        test_command: test_command.to_string(),
        command_timeout_seconds: 10,
        ..SandboxConfig::default()
    }
}

pub fn temp_project() -> TempDir {
    TempDir::new().expect("Failed to create temp dir")
}
