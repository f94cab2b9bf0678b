//! Extraction of the test and implementation blocks from generated text.
//!
//! The format contract is positional: the first fenced block is the test, the
//! next fenced block after it is the implementation. Nothing between or around
//! the blocks is inspected, and malformed fences are not repaired.

use regex::Regex;
use std::sync::OnceLock;
use tracing::debug;

use crate::error::ParseError;
use crate::models::Draft;

/// Opening marker with an optional language tag, lazily matched up to the closing marker
fn fence_re() -> &'static Regex {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    FENCE.get_or_init(|| {
        Regex::new(r"```[\w+#.\-]*[ \t]*\r?\n?([\s\S]*?)```").expect("fence pattern is valid")
    })
}

/// Find the first fenced block at or after `from`.
///
/// Returns the block contents and the byte offset just past its closing marker.
pub fn find_fenced_block(text: &str, from: usize) -> Option<(String, usize)> {
    let haystack = text.get(from..)?;
    let caps = fence_re().captures(haystack)?;
    let whole = caps.get(0)?;
    let body = caps.get(1).map(|m| m.as_str()).unwrap_or("");
    Some((normalize_block(body), from + whole.end()))
}

/// Drop the line breaks hugging the fences and trailing whitespace, keep leading indentation
fn normalize_block(body: &str) -> String {
    body.trim_start_matches(|c| c == '\r' || c == '\n')
        .trim_end()
        .to_string()
}

/// Parse generated text into a draft: first block is the test, second is the implementation
pub fn parse_draft(text: &str) -> Result<Draft, ParseError> {
    let (test_code, after_test) =
        find_fenced_block(text, 0).ok_or(ParseError::TestBlockNotFound)?;
    let (impl_code, _) =
        find_fenced_block(text, after_test).ok_or(ParseError::ImplBlockNotFound)?;

    if test_code.trim().is_empty() {
        return Err(ParseError::EmptyTestBlock);
    }
    if impl_code.trim().is_empty() {
        return Err(ParseError::EmptyImplBlock);
    }

    debug!(
        "Parsed draft: {} test lines, {} implementation lines",
        count_lines(&test_code),
        count_lines(&impl_code)
    );
    Ok(Draft::new(test_code, impl_code))
}

/// Count lines in content
pub fn count_lines(content: &str) -> usize {
    content.lines().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_labelled_go_blocks() {
        let input = "== Test:\n```go\nfunc TestX(t *testing.T){}\n```\n== Implementation:\n```go\nfunc X(){}\n```";
        let draft = parse_draft(input).unwrap();
        assert_eq!(draft.test_code, "func TestX(t *testing.T){}");
        assert_eq!(draft.impl_code, "func X(){}");
    }

    #[test]
    fn test_parse_untagged_fences() {
        let input = "```\nassert ok\n```\n```\nimpl ok\n```";
        let draft = parse_draft(input).unwrap();
        assert_eq!(draft.test_code, "assert ok");
        assert_eq!(draft.impl_code, "impl ok");
    }

    #[test]
    fn test_parse_no_blocks() {
        let err = parse_draft("I could not come up with anything.").unwrap_err();
        assert_eq!(err, ParseError::TestBlockNotFound);
        assert_eq!(err.to_string(), "test block not found");
    }

    #[test]
    fn test_parse_single_block() {
        let input = "Here is the test:\n```go\nfunc TestX(t *testing.T){}\n```\nThat's all.";
        let err = parse_draft(input).unwrap_err();
        assert_eq!(err, ParseError::ImplBlockNotFound);
        assert_eq!(err.to_string(), "implementation block not found");
    }

    #[test]
    fn test_unclosed_first_fence_is_not_a_block() {
        let input = "```go\nfunc TestX(t *testing.T){}\n";
        assert_eq!(parse_draft(input).unwrap_err(), ParseError::TestBlockNotFound);
    }

    #[test]
    fn test_unclosed_second_fence_is_not_a_block() {
        let input = "```go\ntest\n```\n```go\nfunc X(){}\n";
        assert_eq!(parse_draft(input).unwrap_err(), ParseError::ImplBlockNotFound);
    }

    #[test]
    fn test_commentary_between_blocks_is_ignored() {
        let plain = "```go\nT\n```\n```go\nI\n```";
        let chatty = "```go\nT\n```\nNow, the implementation. Note `backticks` and ``pairs``\nare fine here.\n\n```go\nI\n```";
        assert_eq!(parse_draft(plain).unwrap(), parse_draft(chatty).unwrap());
    }

    #[test]
    fn test_extra_blocks_after_second_are_ignored() {
        let input = "```go\nT\n```\n```go\nI\n```\n```bash\ngo test ./...\n```";
        let draft = parse_draft(input).unwrap();
        assert_eq!(draft.test_code, "T");
        assert_eq!(draft.impl_code, "I");
    }

    #[test]
    fn test_order_is_positional_not_semantic() {
        let input = "```go\nfunc X(){}\n```\n```go\nfunc TestX(t *testing.T){}\n```";
        let draft = parse_draft(input).unwrap();
        assert_eq!(draft.test_code, "func X(){}");
        assert_eq!(draft.impl_code, "func TestX(t *testing.T){}");
    }

    #[test]
    fn test_multiline_block_keeps_inner_formatting() {
        let input = "```go\npackage main\n\nfunc X() {\n\treturn\n}\n```\n```go\n    indented\n```";
        let draft = parse_draft(input).unwrap();
        assert_eq!(draft.test_code, "package main\n\nfunc X() {\n\treturn\n}");
        assert_eq!(draft.impl_code, "    indented");
    }

    #[test]
    fn test_crlf_line_endings() {
        let input = "```go\r\nT\r\n```\r\n```go\r\nI\r\n```";
        let draft = parse_draft(input).unwrap();
        assert_eq!(draft.test_code, "T");
        assert_eq!(draft.impl_code, "I");
    }

    #[test]
    fn test_empty_blocks_are_rejected() {
        assert_eq!(
            parse_draft("```go\n\n```\n```go\nI\n```").unwrap_err(),
            ParseError::EmptyTestBlock
        );
        assert_eq!(
            parse_draft("```go\nT\n```\n```go\n   \n```").unwrap_err(),
            ParseError::EmptyImplBlock
        );
    }

    #[test]
    fn test_find_fenced_block_offsets() {
        let text = "x```go\nA\n```y```go\nB\n```";
        let (first, end) = find_fenced_block(text, 0).unwrap();
        assert_eq!(first, "A");
        assert_eq!(&text[end..end + 1], "y");
        let (second, _) = find_fenced_block(text, end).unwrap();
        assert_eq!(second, "B");
        assert!(find_fenced_block(text, text.len()).is_none());
    }

    #[test]
    fn test_count_lines() {
        assert_eq!(count_lines(""), 0);
        assert_eq!(count_lines("a\nb\nc"), 3);
    }
}
