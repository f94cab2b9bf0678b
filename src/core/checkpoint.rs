//! Operator checkpoint between a failed test run and the next generation.

use async_trait::async_trait;
use dialoguer::{theme::ColorfulTheme, Input};
use std::io::{self, BufRead, IsTerminal, Write};
use tracing::debug;

use crate::models::IterationDecision;

/// Question shown after a failed test run
pub const CHECKPOINT_PROMPT: &str =
    "Test failed, proceed to the next iteration? Perhaps give a hint (y/n/<hint>)";

/// Asks the operator whether to keep iterating after a failure
#[async_trait]
pub trait HumanCheckpoint: Send + Sync {
    async fn confirm(&self, iteration: u32) -> Result<IterationDecision, io::Error>;
}

#[async_trait]
impl<T: HumanCheckpoint + ?Sized> HumanCheckpoint for Box<T> {
    async fn confirm(&self, iteration: u32) -> Result<IterationDecision, io::Error> {
        (**self).confirm(iteration).await
    }
}

/// Turn one line of operator input into a decision.
///
/// A lone `y` or `Y` proceeds, any other single character declines, an empty
/// line proceeds without a hint, and anything longer proceeds with the line
/// as the hint.
pub fn interpret_response(line: &str) -> IterationDecision {
    let trimmed = line.trim();
    let mut chars = trimmed.chars();
    match (chars.next(), chars.next()) {
        (None, _) => IterationDecision::proceed(),
        (Some(c), None) if c.eq_ignore_ascii_case(&'y') => IterationDecision::proceed(),
        (Some(_), None) => IterationDecision::decline(),
        _ => IterationDecision::proceed_with_hint(trimmed),
    }
}

/// Checkpoint backed by the process's stdin.
///
/// Uses a dialoguer prompt on a terminal and a plain line read otherwise,
/// so piped answers work. End of input declines.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalCheckpoint;

impl TerminalCheckpoint {
    pub fn new() -> Self {
        Self
    }

    fn ask_blocking() -> Result<Option<String>, io::Error> {
        if io::stdin().is_terminal() {
            let line = Input::<String>::with_theme(&ColorfulTheme::default())
                .with_prompt(CHECKPOINT_PROMPT)
                .allow_empty(true)
                .interact_text()
                // keeps ErrorKind::Interrupted when the operator presses Ctrl-C
                .map_err(|dialoguer::Error::IO(e)| e)?;
            return Ok(Some(line));
        }

        print!("{}: ", CHECKPOINT_PROMPT);
        io::stdout().flush()?;
        read_answer(&mut io::stdin().lock())
    }
}

/// Read one answer line; `None` at end of input
fn read_answer(reader: &mut impl BufRead) -> Result<Option<String>, io::Error> {
    let mut line = String::new();
    if reader.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line))
}

#[async_trait]
impl HumanCheckpoint for TerminalCheckpoint {
    async fn confirm(&self, iteration: u32) -> Result<IterationDecision, io::Error> {
        debug!("Asking operator after failed iteration {}", iteration);
        let answer = tokio::task::spawn_blocking(Self::ask_blocking)
            .await
            .map_err(io::Error::other)??;

        Ok(match answer {
            Some(line) => interpret_response(&line),
            None => {
                debug!("Operator input closed, declining");
                IterationDecision::decline()
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_single_y_proceeds() {
        assert_eq!(interpret_response("y"), IterationDecision::proceed());
        assert_eq!(interpret_response("Y\n"), IterationDecision::proceed());
    }

    #[test]
    fn test_other_single_character_declines() {
        assert_eq!(interpret_response("n"), IterationDecision::decline());
        assert_eq!(interpret_response("N"), IterationDecision::decline());
        assert_eq!(interpret_response("q\n"), IterationDecision::decline());
    }

    #[test]
    fn test_empty_line_proceeds_without_hint() {
        assert_eq!(interpret_response(""), IterationDecision::proceed());
        assert_eq!(interpret_response("   \n"), IterationDecision::proceed());
    }

    #[test]
    fn test_longer_text_is_a_hint() {
        let decision = interpret_response("  handle empty strings\n");
        assert!(decision.proceed);
        assert_eq!(decision.hint, "handle empty strings");

        let decision = interpret_response("no");
        assert!(decision.proceed);
        assert_eq!(decision.hint, "no");
    }

    #[test]
    fn test_multibyte_single_character_declines() {
        assert_eq!(interpret_response("é"), IterationDecision::decline());
    }

    #[test]
    fn test_read_answer_eof() {
        let mut input = Cursor::new(Vec::new());
        assert_eq!(read_answer(&mut input).unwrap(), None);
    }

    #[test]
    fn test_read_answer_line() {
        let mut input = Cursor::new(b"y\nmore\n".to_vec());
        assert_eq!(read_answer(&mut input).unwrap().as_deref(), Some("y\n"));
    }
}
