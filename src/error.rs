//! Centralised error hierarchy for the **Lox interpreter**.
//!
//! All subsystems (scanner, parser, resolver, runtime, CLI) convert their
//! internal failure modes into one of the variants defined here.  Static
//! errors (lex, parse, resolve) are collected and reported in bulk; a runtime
//! error aborts the current top‑level unit.
//!
//! The module **does not** print diagnostics itself; see [`ErrorReporter`].

use std::io::{self, Write};
use thiserror::Error;

use log::info;

use crate::token::{Token, TokenType};

/// Canonical error type used throughout the interpreter.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LoxError {
    /// Lexical (scanner) error with source line information.
    #[error("[line {line}] Error: {message}")]
    Lex {
        /// Human‑readable description.
        message: String,

        /// 1‑based line where the error occurred.
        line: usize,
    },

    /// Syntactic (parser) error.  `location` is ` at 'lexeme'` or ` at end`.
    #[error("[line {line}] Error{location}: {message}")]
    Parse {
        message: String,
        location: String,
        line: usize,
    },

    /// Static‑analysis or resolution failure (e.g. early‑binding errors).
    #[error("[line {line}] Error{location}: {message}")]
    Resolve {
        message: String,
        location: String,
        line: usize,
    },

    /// Runtime evaluation error, reported against the offending token's line.
    #[error("{message}\n[line {line}]")]
    Runtime { message: String, line: usize },

    /// Wrapper around `std::io::Error` (transparent).  Enables `?` on I/O ops.
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl LoxError {
    /// Helper constructor for the **scanner**.
    pub fn lex<S: Into<String>>(line: usize, msg: S) -> Self {
        let message: String = msg.into();

        info!("Creating Lex error: line={}, msg={}", line, message);

        LoxError::Lex { message, line }
    }

    /// Helper constructor for the **parser**.
    pub fn parse<S: Into<String>>(token: &Token, msg: S) -> Self {
        let message: String = msg.into();

        info!("Creating Parse error: line={}, msg={}", token.line, message);

        LoxError::Parse {
            message,
            location: location_of(token),
            line: token.line,
        }
    }

    /// Helper constructor for the **resolver**.
    pub fn resolve<S: Into<String>>(token: &Token, msg: S) -> Self {
        let message: String = msg.into();

        info!("Creating Resolve error: line={}, msg={}", token.line, message);

        LoxError::Resolve {
            message,
            location: location_of(token),
            line: token.line,
        }
    }

    /// Helper constructor for the **interpreter**.
    pub fn runtime<S: Into<String>>(token: &Token, msg: S) -> Self {
        let message: String = msg.into();

        info!("Creating Runtime error: line={}, msg={}", token.line, message);

        LoxError::Runtime {
            message,
            line: token.line,
        }
    }

    /// Source line the error points at, if it has one.
    pub fn line(&self) -> Option<usize> {
        match self {
            LoxError::Lex { line, .. }
            | LoxError::Parse { line, .. }
            | LoxError::Resolve { line, .. }
            | LoxError::Runtime { line, .. } => Some(*line),
            LoxError::Io(_) => None,
        }
    }

    /// Process exit status conventionally associated with this error class.
    pub fn exit_code(&self) -> i32 {
        match self {
            LoxError::Lex { .. } | LoxError::Parse { .. } | LoxError::Resolve { .. } => 65,
            LoxError::Runtime { .. } => 70,
            LoxError::Io(_) => 74,
        }
    }
}

fn location_of(token: &Token) -> String {
    if token.token_type == TokenType::EOF {
        " at end".to_string()
    } else {
        format!(" at '{}'", token.lexeme)
    }
}

/// Hook through which the driver surfaces diagnostics.
pub trait ErrorReporter {
    fn report(&mut self, error: &LoxError);
}

/// Collects errors in memory (tests, embedding hosts).
impl ErrorReporter for Vec<String> {
    fn report(&mut self, error: &LoxError) {
        self.push(error.to_string());
    }
}

/// Writes each error on its own line to standard error.
#[derive(Debug, Default)]
pub struct StderrReporter;

impl ErrorReporter for StderrReporter {
    fn report(&mut self, error: &LoxError) {
        let stderr = io::stderr();
        let mut handle = stderr.lock();

        // Nothing sensible to do if stderr itself is gone.
        let _ = writeln!(handle, "{}", error);
    }
}

/// Crate‑wide `Result` alias.
pub type Result<T> = std::result::Result<T, LoxError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::Token;

    #[test]
    fn parse_error_points_at_lexeme_or_end() {
        let semi = Token::new(TokenType::SEMICOLON, ";", None, 3);
        let eof = Token::new(TokenType::EOF, "", None, 7);

        assert_eq!(
            LoxError::parse(&semi, "Expect expression.").to_string(),
            "[line 3] Error at ';': Expect expression."
        );
        assert_eq!(
            LoxError::parse(&eof, "Expect '}' after block.").to_string(),
            "[line 7] Error at end: Expect '}' after block."
        );
    }

    #[test]
    fn runtime_error_puts_line_last() {
        let plus = Token::new(TokenType::PLUS, "+", None, 2);
        let err = LoxError::runtime(&plus, "Operands must be two numbers or two strings.");

        assert_eq!(
            err.to_string(),
            "Operands must be two numbers or two strings.\n[line 2]"
        );
        assert_eq!(err.exit_code(), 70);
        assert_eq!(err.line(), Some(2));
    }

    #[test]
    fn io_errors_have_no_line_and_exit_74() {
        let err = LoxError::from(io::Error::new(io::ErrorKind::NotFound, "missing.lox"));

        assert_eq!(err.to_string(), "missing.lox");
        assert_eq!(err.line(), None);
        assert_eq!(err.exit_code(), 74);
    }
}
