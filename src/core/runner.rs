// Core orchestration - the generate, test, iterate state machine

use tracing::{debug, error, info, warn};

use crate::core::checkpoint::HumanCheckpoint;
use crate::core::generator::TextGenerator;
use crate::core::parser::{count_lines, parse_draft};
use crate::core::prompts::{IterateRequest, PromptBuilder};
use crate::core::sandbox::Sandbox;
use crate::error::{Result, TddError};
use crate::models::{
    AbortReason, ConfigError, Draft, LoopState, RunReport, Session, SessionOutcome,
};

/// Knobs for a single session
#[derive(Debug, Clone, Copy, Default)]
pub struct RunnerOptions {
    /// Test the persisted draft first instead of generating one
    pub resume: bool,
    /// Ask the sandbox to diff old and new artifacts
    pub show_diff: bool,
    /// Give up after this many failed iterations without asking the operator
    pub max_iterations: Option<u32>,
}

/// Drives one session until it passes or is aborted
pub struct Runner<G, S, C> {
    generator: G,
    sandbox: S,
    checkpoint: C,
    prompts: PromptBuilder,
    options: RunnerOptions,
    session: Session,
    state: LoopState,
    transitions: Vec<LoopState>,
    generation_calls: usize,
}

impl<G, S, C> Runner<G, S, C>
where
    G: TextGenerator,
    S: Sandbox,
    C: HumanCheckpoint,
{
    pub fn new(
        generator: G,
        sandbox: S,
        checkpoint: C,
        prompts: PromptBuilder,
        session: Session,
        options: RunnerOptions,
    ) -> Result<Self> {
        if options.max_iterations == Some(0) {
            return Err(ConfigError::InvalidIterationLimit.into());
        }

        Ok(Self {
            generator,
            sandbox,
            checkpoint,
            prompts,
            options,
            session,
            state: LoopState::Start,
            transitions: vec![LoopState::Start],
            generation_calls: 0,
        })
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Every state visited so far, starting with `Start`
    pub fn transitions(&self) -> &[LoopState] {
        &self.transitions
    }

    pub fn generation_calls(&self) -> usize {
        self.generation_calls
    }

    pub fn generator(&self) -> &G {
        &self.generator
    }

    pub fn sandbox(&self) -> &S {
        &self.sandbox
    }

    pub fn checkpoint(&self) -> &C {
        &self.checkpoint
    }

    /// Run the loop to a terminal state.
    ///
    /// `Ok` means the session passed or was aborted for a non-error reason
    /// (operator declined, iteration limit). Generation, parse, sandbox and
    /// checkpoint failures end the session in `Aborted` and come back as `Err`.
    /// A runner can only be run once.
    pub async fn run(&mut self) -> Result<RunReport> {
        if self.state != LoopState::Start {
            return Err(TddError::SessionFinished(self.state));
        }

        let mut draft = if self.options.resume {
            info!("Resuming from the persisted draft");
            self.transition(LoopState::Testing);
            match self.sandbox.read_existing().await {
                Ok(draft) => draft,
                Err(e) => return Err(self.abort(e)),
            }
        } else {
            self.session.current_prompt = self
                .prompts
                .build_initial_prompt(self.session.requirements(), self.session.signature());
            self.generate_draft().await?
        };

        loop {
            let iteration = self.session.iteration();
            info!(
                "Iteration {}: testing draft ({} test lines, {} implementation lines)",
                iteration,
                count_lines(&draft.test_code),
                count_lines(&draft.impl_code)
            );

            let outcome = match self
                .sandbox
                .write_and_test(&draft, self.options.show_diff)
                .await
            {
                Ok(outcome) => outcome,
                Err(e) => return Err(self.abort(e)),
            };

            if outcome.passed {
                self.transition(LoopState::Passed);
                info!("Tests passed on iteration {}", iteration);
                return Ok(self.report(SessionOutcome::Passed {
                    iterations: iteration,
                }));
            }

            println!("{}", outcome.raw_output);
            warn!("Tests failed on iteration {}", iteration);

            if let Some(max) = self.options.max_iterations {
                if iteration >= max {
                    self.transition(LoopState::Aborted);
                    warn!("Giving up after {} iterations", max);
                    return Ok(self.report(SessionOutcome::Aborted {
                        reason: AbortReason::IterationLimit(max),
                    }));
                }
            }

            self.transition(LoopState::AwaitingHuman);
            let decision = match self.checkpoint.confirm(iteration).await {
                Ok(decision) => decision,
                Err(e) => return Err(self.abort(TddError::Checkpoint(e))),
            };

            if !decision.proceed {
                self.transition(LoopState::Aborted);
                info!("Operator declined to continue after iteration {}", iteration);
                return Ok(self.report(SessionOutcome::Aborted {
                    reason: AbortReason::OperatorDeclined,
                }));
            }
            if decision.has_hint() {
                debug!("Operator hint: {}", decision.hint);
            }

            self.session.current_prompt = self.prompts.build_iterate_prompt(&IterateRequest {
                requirements: self.session.requirements(),
                signature: self.session.signature(),
                prev_test: &draft.test_code,
                prev_impl: &draft.impl_code,
                prev_output: &outcome.raw_output,
                hint: &decision.hint,
            });
            self.session.advance();
            draft = self.generate_draft().await?;
        }
    }

    /// Generating then Parsing; leaves the runner in Testing on success
    async fn generate_draft(&mut self) -> Result<Draft> {
        self.transition(LoopState::Generating);
        self.generation_calls += 1;
        info!(
            "Iteration {}: generating with {}",
            self.session.iteration(),
            self.generator.name()
        );

        let text = match self.generator.generate(&self.session.current_prompt).await {
            Ok(text) => text,
            Err(e) => {
                error!("Generation failed: {}", e);
                return Err(self.abort(e));
            }
        };

        self.transition(LoopState::Parsing);
        match parse_draft(&text) {
            Ok(draft) => {
                self.transition(LoopState::Testing);
                Ok(draft)
            }
            Err(reason) => {
                error!("Could not extract a draft: {}", reason);
                println!("{}", text);
                Err(self.abort(TddError::MalformedOutput {
                    reason,
                    raw_output: text,
                }))
            }
        }
    }

    fn transition(&mut self, next: LoopState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal transition {} -> {}",
            self.state,
            next
        );
        debug!("State {} -> {}", self.state, next);
        self.state = next;
        self.transitions.push(next);
    }

    fn abort(&mut self, err: impl Into<TddError>) -> TddError {
        self.transition(LoopState::Aborted);
        err.into()
    }

    fn report(&self, outcome: SessionOutcome) -> RunReport {
        RunReport {
            outcome,
            iterations: self.session.iteration(),
            generation_calls: self.generation_calls,
            transitions: self.transitions.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fakes::{InMemorySandbox, ScriptedCheckpoint, ScriptedGenerator};
    use crate::models::{IterationDecision, TestOutcome};

    const REPLY: &str = "```go\nfunc TestX(t *testing.T) {}\n```\n```go\nfunc X() {}\n```\n";

    fn runner(
        replies: &[&str],
        outcomes: Vec<TestOutcome>,
        answers: &[&str],
        options: RunnerOptions,
    ) -> Runner<ScriptedGenerator, InMemorySandbox, ScriptedCheckpoint> {
        Runner::new(
            ScriptedGenerator::new(replies.iter().copied()),
            InMemorySandbox::new(outcomes),
            ScriptedCheckpoint::new(answers.iter().copied()),
            PromptBuilder::default(),
            Session::new("reverse a string", "func Reverse(s string) string"),
            options,
        )
        .unwrap()
    }

    #[test]
    fn test_zero_iteration_limit_is_rejected() {
        let result = Runner::new(
            ScriptedGenerator::default(),
            InMemorySandbox::default(),
            ScriptedCheckpoint::default(),
            PromptBuilder::default(),
            Session::new("r", "s"),
            RunnerOptions {
                max_iterations: Some(0),
                ..RunnerOptions::default()
            },
        );
        assert!(matches!(
            result,
            Err(TddError::Config(ConfigError::InvalidIterationLimit))
        ));
    }

    #[tokio::test]
    async fn test_first_iteration_pass_transitions() {
        let mut runner = runner(
            &[REPLY],
            vec![TestOutcome::passed("ok")],
            &[],
            RunnerOptions::default(),
        );
        let report = runner.run().await.unwrap();

        assert_eq!(report.outcome, SessionOutcome::Passed { iterations: 1 });
        assert_eq!(
            report.transitions,
            vec![
                LoopState::Start,
                LoopState::Generating,
                LoopState::Parsing,
                LoopState::Testing,
                LoopState::Passed,
            ]
        );
        assert_eq!(runner.state(), LoopState::Passed);
    }

    #[tokio::test]
    async fn test_run_twice_is_rejected() {
        let mut runner = runner(
            &[REPLY],
            vec![TestOutcome::passed("ok")],
            &[],
            RunnerOptions::default(),
        );
        runner.run().await.unwrap();

        let err = runner.run().await.unwrap_err();
        assert!(matches!(err, TddError::SessionFinished(LoopState::Passed)));
        assert_eq!(runner.generation_calls(), 1);
    }

    /// Operator hit Ctrl-C at the prompt
    struct InterruptedCheckpoint;

    #[async_trait::async_trait]
    impl HumanCheckpoint for InterruptedCheckpoint {
        async fn confirm(
            &self,
            _iteration: u32,
        ) -> std::result::Result<IterationDecision, std::io::Error> {
            Err(std::io::ErrorKind::Interrupted.into())
        }
    }

    #[tokio::test]
    async fn test_interrupted_checkpoint_aborts() {
        let mut runner = Runner::new(
            ScriptedGenerator::new([REPLY]),
            InMemorySandbox::new([TestOutcome::failed("FAIL")]),
            InterruptedCheckpoint,
            PromptBuilder::default(),
            Session::new("r", "s"),
            RunnerOptions::default(),
        )
        .unwrap();

        let err = runner.run().await.unwrap_err();
        assert!(err.is_interrupted());
        assert_eq!(runner.state(), LoopState::Aborted);
        assert_eq!(runner.generation_calls(), 1);
    }

    #[tokio::test]
    async fn test_resume_skips_generation() {
        let mut runner = Runner::new(
            ScriptedGenerator::default(),
            InMemorySandbox::new([TestOutcome::passed("ok")]).with_existing(Draft::new("t", "i")),
            ScriptedCheckpoint::default(),
            PromptBuilder::default(),
            Session::new("r", "s"),
            RunnerOptions {
                resume: true,
                ..RunnerOptions::default()
            },
        )
        .unwrap();

        let report = runner.run().await.unwrap();
        assert!(report.outcome.is_passed());
        assert_eq!(report.generation_calls, 0);
        assert_eq!(
            report.transitions,
            vec![LoopState::Start, LoopState::Testing, LoopState::Passed]
        );
    }
}
