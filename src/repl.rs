//! Line editor pieces for the interactive prompt.

use std::borrow::Cow;

use reedline::{PromptEditMode, PromptHistorySearch, ValidationResult};

use rox::error::LoxError;
use rox::scanner::Scanner;
use rox::token::TokenType;

pub struct Prompt;

impl reedline::Prompt for Prompt {
    fn render_prompt_left(&self) -> Cow<str> {
        Cow::Borrowed("> ")
    }

    fn render_prompt_right(&self) -> Cow<str> {
        Cow::Borrowed("")
    }

    fn render_prompt_indicator(&self, _: PromptEditMode) -> Cow<str> {
        Cow::Borrowed("")
    }

    fn render_prompt_multiline_indicator(&self) -> Cow<str> {
        Cow::Borrowed("... ")
    }

    fn render_prompt_history_search_indicator(&self, _: PromptHistorySearch) -> Cow<str> {
        Cow::Borrowed("")
    }
}

/// Keeps the editor open while a block, call or string is still unclosed.
pub struct Validator;

impl reedline::Validator for Validator {
    fn validate(&self, line: &str) -> ValidationResult {
        if is_complete(line) {
            ValidationResult::Complete
        } else {
            ValidationResult::Incomplete
        }
    }
}

/// Whether every `(`, `{` and string in `source` has been closed.
pub fn is_complete(source: &str) -> bool {
    let mut depth: i64 = 0;

    for item in Scanner::new(source.as_bytes()) {
        match item {
            Ok(token) => match token.token_type {
                TokenType::LEFT_PAREN | TokenType::LEFT_BRACE => depth += 1,
                TokenType::RIGHT_PAREN | TokenType::RIGHT_BRACE => depth -= 1,
                _ => {}
            },

            Err(LoxError::Lex { message, .. }) if message == "Unterminated string." => {
                return false;
            }

            Err(_) => {}
        }
    }

    depth <= 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use reedline::Prompt as _;

    #[test]
    fn open_blocks_and_strings_continue_the_line() {
        assert!(is_complete("print 1;"));
        assert!(is_complete(""));
        assert!(!is_complete("fun f() {"));
        assert!(!is_complete("print (1 +"));
        assert!(!is_complete("print \"abc"));
        assert!(is_complete("fun f() {\n  print \"a\";\n}"));
    }

    // Stray closers are left for the parser to report.
    #[test]
    fn unbalanced_closers_are_complete() {
        assert!(is_complete("}"));
        assert!(is_complete("print 1; // {"));
    }

    #[test]
    fn prompt_renders_continuation_marker() {
        assert_eq!(Prompt.render_prompt_left(), "> ");
        assert_eq!(Prompt.render_prompt_multiline_indicator(), "... ");
    }
}
