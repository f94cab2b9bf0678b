//! Prompt templates for the test-first loop.
//!
//! Both templates ask for exactly two fenced code blocks, test first. The output
//! parser relies on that order and count, so any wording change here must keep it.

/// System prompt sent to chat-style providers alongside every user prompt
pub const SYSTEM_PROMPT_TDD: &str = r#"You are a software engineer practising test-driven development.
Always answer with exactly two fenced code blocks and nothing that could be mistaken for a third:
the first block is the unit test, the second block is the implementation.
Keep explanations outside the code blocks short."#;

/// Renders the initial and iterate prompts for one target language
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    language: String,
    fence_tag: String,
}

/// Everything the iterate prompt needs from the failed cycle
#[derive(Debug, Clone, Copy)]
pub struct IterateRequest<'a> {
    pub requirements: &'a str,
    pub signature: &'a str,
    pub prev_test: &'a str,
    pub prev_impl: &'a str,
    pub prev_output: &'a str,
    /// Operator hint, ignored when empty
    pub hint: &'a str,
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new("Go", "go")
    }
}

impl PromptBuilder {
    pub fn new(language: impl Into<String>, fence_tag: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            fence_tag: fence_tag.into(),
        }
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    /// Prompt for the first draft
    pub fn build_initial_prompt(&self, requirements: &str, signature: &str) -> String {
        let mut prompt = format!(
            "You are a software engineer who will work on a challenging {} function.\n",
            self.language
        );
        prompt.push_str(&format!("Requirements: {}\n", requirements));
        prompt.push_str(&format!("Function Signature: {}\n", signature));
        prompt.push_str("You should use Test-Driven Development to approach a robust solution.\n");
        prompt.push_str(
            "Write a good test first, be sure to consider as many common edge cases as you can.\n",
        );
        prompt.push_str("Then provide an implementation.\n");
        prompt.push_str(
            "This is only your first draft, so focus on breaking down the problem well and \
             designing your overall code structure, instead of trying to arrive at a perfect solution.\n",
        );
        prompt.push_str(
            "Provide your solution strictly in this format, clearly marking the 2 code blocks for parsing:\n",
        );
        prompt.push_str("== Test:\n");
        prompt.push_str(&self.fenced("// YOUR TEST CODE"));
        prompt.push_str("\n== Implementation:\n");
        prompt.push_str(&self.fenced("// YOUR IMPLEMENTATION CODE"));
        prompt
    }

    /// Prompt for a corrected draft after a failed test run
    pub fn build_iterate_prompt(&self, req: &IterateRequest<'_>) -> String {
        let mut prompt = format!(
            "You are a software engineer implementing a challenging {} function using Test-Driven Development.\n",
            self.language
        );
        prompt.push_str(&format!("Requirements: {}\n", req.requirements));
        prompt.push_str(&format!("Function Signature: {}\n", req.signature));
        prompt.push_str(
            "You've written a unit test and a draft implementation, but some tests have failed.\n",
        );
        prompt.push_str("== Previous Test:\n");
        prompt.push_str(&self.fenced(req.prev_test));
        prompt.push_str("\n== Previous Implementation:\n");
        prompt.push_str(&self.fenced(req.prev_impl));
        prompt.push_str("\n== Output:\n```\n");
        prompt.push_str(req.prev_output);
        prompt.push_str("\n```\n");
        prompt.push_str(
            "Your task is to iterate towards a correct unit test and implementation. \
             Think about why the given solution failed and how you can fix it.\n",
        );
        prompt.push_str(
            "Note that it may be the previous unit test that was incorrect (as may be the implementation), \
             so look for problems in both.\n",
        );
        if !req.hint.trim().is_empty() {
            prompt.push_str(&format!("Hint from the reviewer: {}\n", req.hint.trim()));
        }
        prompt.push_str(
            "Provide an updated version of your solution strictly in this format, clearly marking the 2 code blocks for parsing:\n",
        );
        prompt.push_str("== Updated Test:\n");
        prompt.push_str(&self.fenced("// YOUR UPDATED TEST CODE"));
        prompt.push_str("\n== Updated Implementation:\n");
        prompt.push_str(&self.fenced("// YOUR UPDATED IMPLEMENTATION CODE"));
        prompt
    }

    fn fenced(&self, body: &str) -> String {
        format!("```{}\n{}\n```", self.fence_tag, body)
    }
}
