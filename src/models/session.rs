use std::fmt;

/// Long-lived context for one invocation of the loop
#[derive(Debug, Clone)]
pub struct Session {
    requirements: String,
    signature: String,
    /// Prompt that will be sent on the next generation call
    pub current_prompt: String,
    iteration: u32,
}

impl Session {
    /// Create a session at iteration 1 with an empty prompt
    pub fn new(requirements: impl Into<String>, signature: impl Into<String>) -> Self {
        Self {
            requirements: requirements.into(),
            signature: signature.into(),
            current_prompt: String::new(),
            iteration: 1,
        }
    }

    pub fn requirements(&self) -> &str {
        &self.requirements
    }

    pub fn signature(&self) -> &str {
        &self.signature
    }

    /// Current iteration number (starts at 1)
    pub fn iteration(&self) -> u32 {
        self.iteration
    }

    /// Move to the next iteration. The counter only ever grows.
    pub fn advance(&mut self) -> u32 {
        self.iteration += 1;
        self.iteration
    }
}

/// One generation cycle's test and implementation pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Draft {
    pub test_code: String,
    pub impl_code: String,
}

impl Draft {
    pub fn new(test_code: impl Into<String>, impl_code: impl Into<String>) -> Self {
        Self {
            test_code: test_code.into(),
            impl_code: impl_code.into(),
        }
    }
}

/// Result of running the toolchain against a draft
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestOutcome {
    pub passed: bool,
    /// Combined stdout and stderr, verbatim
    pub raw_output: String,
}

impl TestOutcome {
    pub fn passed(raw_output: impl Into<String>) -> Self {
        Self {
            passed: true,
            raw_output: raw_output.into(),
        }
    }

    pub fn failed(raw_output: impl Into<String>) -> Self {
        Self {
            passed: false,
            raw_output: raw_output.into(),
        }
    }
}

/// Operator answer after a failed test run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IterationDecision {
    pub proceed: bool,
    /// Free-text hint for the next prompt, empty when none was given
    pub hint: String,
}

impl IterationDecision {
    pub fn proceed() -> Self {
        Self {
            proceed: true,
            hint: String::new(),
        }
    }

    pub fn proceed_with_hint(hint: impl Into<String>) -> Self {
        Self {
            proceed: true,
            hint: hint.into(),
        }
    }

    pub fn decline() -> Self {
        Self {
            proceed: false,
            hint: String::new(),
        }
    }

    pub fn has_hint(&self) -> bool {
        !self.hint.is_empty()
    }
}

/// States of the generate, test and iterate loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Start,
    /// Waiting on the text generator
    Generating,
    /// Extracting the draft from generated text
    Parsing,
    /// Sandbox is writing and testing the draft
    Testing,
    /// Test failed, waiting on the operator
    AwaitingHuman,
    /// Terminal success
    Passed,
    /// Terminal failure or abort
    Aborted,
}

impl LoopState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, LoopState::Passed | LoopState::Aborted)
    }

    /// Check whether moving from `self` to `next` is a legal transition
    pub fn can_transition_to(&self, next: LoopState) -> bool {
        use LoopState::{Aborted, AwaitingHuman, Generating, Parsing, Passed, Start, Testing};
        matches!(
            (self, next),
            (Start, Generating)
                | (Start, Testing)
                | (Generating, Parsing)
                | (Generating, Aborted)
                | (Parsing, Testing)
                | (Parsing, Aborted)
                | (Testing, Passed)
                | (Testing, AwaitingHuman)
                | (Testing, Aborted)
                | (AwaitingHuman, Generating)
                | (AwaitingHuman, Aborted)
        )
    }
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LoopState::Start => "start",
            LoopState::Generating => "generating",
            LoopState::Parsing => "parsing",
            LoopState::Testing => "testing",
            LoopState::AwaitingHuman => "awaiting_human",
            LoopState::Passed => "passed",
            LoopState::Aborted => "aborted",
        };
        write!(f, "{}", name)
    }
}

/// Why a session ended without passing (non-error endings only)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    /// The operator declined to continue after a failed test
    OperatorDeclined,
    /// The configured iteration limit was reached
    IterationLimit(u32),
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbortReason::OperatorDeclined => write!(f, "operator declined to continue"),
            AbortReason::IterationLimit(max) => {
                write!(f, "iteration limit of {} reached", max)
            }
        }
    }
}

/// How a session ended when no fatal error occurred
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    Passed { iterations: u32 },
    Aborted { reason: AbortReason },
}

impl SessionOutcome {
    pub fn is_passed(&self) -> bool {
        matches!(self, SessionOutcome::Passed { .. })
    }
}

/// Summary of a finished run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub outcome: SessionOutcome,
    /// Iteration number the session ended on
    pub iterations: u32,
    /// Number of calls made to the text generator
    pub generation_calls: usize,
    /// Every state visited, in order, starting with `Start`
    pub transitions: Vec<LoopState>,
}
