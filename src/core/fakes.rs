//! Scripted stand-ins for the generator, sandbox and checkpoint.
//!
//! They let the loop be driven deterministically without a model, a
//! toolchain or a terminal, and record every call for later inspection.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::io;
use std::sync::{Mutex, MutexGuard};

use super::checkpoint::{interpret_response, HumanCheckpoint};
use super::generator::TextGenerator;
use super::sandbox::Sandbox;
use crate::error::{GenerationError, SandboxError};
use crate::models::{Draft, IterationDecision, TestOutcome};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// Generator that replays canned replies in order
#[derive(Debug, Default)]
pub struct ScriptedGenerator {
    responses: Mutex<VecDeque<Result<String, GenerationError>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            responses: Mutex::new(responses.into_iter().map(|r| Ok(r.into())).collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn push_response(&self, response: impl Into<String>) {
        lock(&self.responses).push_back(Ok(response.into()));
    }

    pub fn push_error(&self, error: GenerationError) {
        lock(&self.responses).push_back(Err(error));
    }

    /// Every prompt received, oldest first
    pub fn prompts(&self) -> Vec<String> {
        lock(&self.prompts).clone()
    }

    pub fn calls(&self) -> usize {
        lock(&self.prompts).len()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        lock(&self.prompts).push(prompt.to_string());
        lock(&self.responses)
            .pop_front()
            .unwrap_or(Err(GenerationError::Exhausted))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Sandbox that keeps artifacts in memory and returns scripted outcomes.
///
/// Once the script runs out every further run fails.
#[derive(Debug, Default)]
pub struct InMemorySandbox {
    outcomes: Mutex<VecDeque<Result<TestOutcome, SandboxError>>>,
    written: Mutex<Vec<Draft>>,
    existing: Mutex<Option<Draft>>,
    diff_requests: Mutex<usize>,
}

impl InMemorySandbox {
    pub fn new(outcomes: impl IntoIterator<Item = TestOutcome>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.into_iter().map(Ok).collect()),
            ..Self::default()
        }
    }

    /// Seed a previously persisted draft for resuming
    pub fn with_existing(self, draft: Draft) -> Self {
        *lock(&self.existing) = Some(draft);
        self
    }

    pub fn push_outcome(&self, outcome: TestOutcome) {
        lock(&self.outcomes).push_back(Ok(outcome));
    }

    pub fn push_error(&self, error: SandboxError) {
        lock(&self.outcomes).push_back(Err(error));
    }

    /// Drafts passed to `write_and_test`, oldest first
    pub fn written(&self) -> Vec<Draft> {
        lock(&self.written).clone()
    }

    pub fn calls(&self) -> usize {
        lock(&self.written).len()
    }

    /// How many runs asked for a diff
    pub fn diff_requests(&self) -> usize {
        *lock(&self.diff_requests)
    }

    /// The draft currently "on disk"
    pub fn current(&self) -> Option<Draft> {
        lock(&self.existing).clone()
    }
}

#[async_trait]
impl Sandbox for InMemorySandbox {
    async fn read_existing(&self) -> Result<Draft, SandboxError> {
        lock(&self.existing).clone().ok_or(SandboxError::NothingToResume)
    }

    async fn write_and_test(
        &self,
        draft: &Draft,
        show_diff: bool,
    ) -> Result<TestOutcome, SandboxError> {
        lock(&self.written).push(draft.clone());
        if show_diff {
            *lock(&self.diff_requests) += 1;
        }

        let next = lock(&self.outcomes)
            .pop_front()
            .unwrap_or_else(|| Ok(TestOutcome::failed("no scripted outcome left")));
        if next.is_ok() {
            *lock(&self.existing) = Some(draft.clone());
        }
        next
    }
}

/// Checkpoint that answers from a list of operator lines.
///
/// Lines go through the same interpretation as terminal input; an empty
/// script declines, like closed stdin.
#[derive(Debug, Default)]
pub struct ScriptedCheckpoint {
    answers: Mutex<VecDeque<String>>,
    asked: Mutex<Vec<u32>>,
}

impl ScriptedCheckpoint {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: Mutex::new(answers.into_iter().map(Into::into).collect()),
            asked: Mutex::new(Vec::new()),
        }
    }

    /// Iteration numbers the checkpoint was consulted on
    pub fn asked(&self) -> Vec<u32> {
        lock(&self.asked).clone()
    }

    pub fn calls(&self) -> usize {
        lock(&self.asked).len()
    }
}

#[async_trait]
impl HumanCheckpoint for ScriptedCheckpoint {
    async fn confirm(&self, iteration: u32) -> Result<IterationDecision, io::Error> {
        lock(&self.asked).push(iteration);
        Ok(match lock(&self.answers).pop_front() {
            Some(line) => interpret_response(&line),
            None => IterationDecision::decline(),
        })
    }
}
