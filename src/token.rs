use log::debug;
use serde::Serialize;
use std::fmt;

/// Token categories, named as they are printed by `tokenize`.
///
/// Variants are pure tags; literal payloads travel separately in
/// [`Token::literal`].
#[allow(non_camel_case_types)]
#[rustfmt::skip]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TokenType {
    // Single-character punctuation.
    LEFT_PAREN, RIGHT_PAREN, LEFT_BRACE, RIGHT_BRACE,
    COMMA, DOT, MINUS, PLUS, SEMICOLON, SLASH, STAR,

    // One or two character operators.
    BANG, BANG_EQUAL,
    EQUAL, EQUAL_EQUAL,
    GREATER, GREATER_EQUAL,
    LESS, LESS_EQUAL,

    // Literals.
    IDENTIFIER, STRING, NUMBER,

    // Reserved words.
    AND, CLASS, ELSE, FALSE, FUN, FOR, IF, NIL, OR,
    PRINT, RETURN, SUPER, THIS, TRUE, VAR, WHILE,

    EOF,
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Variant names are the printed form.
        fmt::Debug::fmt(self, f)
    }
}

/// Literal value carried by `STRING` and `NUMBER` tokens.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Literal {
    /// Numeric literal, always an IEEE‑754 double.
    Number(f64),

    /// String contents without the surrounding quotes.
    Str(String),
}

/// A scanned token, including its type, the original lexeme, an optional
/// literal value and the line number where it was found.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Token {
    pub token_type: TokenType,

    /// Source text of the token, quotes included for strings.
    pub lexeme: String,

    /// Parsed value for string and number literals.
    pub literal: Option<Literal>,

    /// Line the token starts on, counting from 1.
    pub line: usize,
}

impl Token {
    pub fn new<S: Into<String>>(
        token_type: TokenType,
        lexeme: S,
        literal: Option<Literal>,
        line: usize,
    ) -> Self {
        let lexeme: String = lexeme.into();

        debug!("Token {:?} '{}' on line {}", token_type, lexeme, line);

        Self {
            token_type,
            lexeme,
            literal,
            line,
        }
    }

    /// Synthetic identifier token, used for names like `this` that the
    /// interpreter binds without a source occurrence.
    pub fn synthetic(name: &str, line: usize) -> Self {
        Self::new(TokenType::IDENTIFIER, name, None, line)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} ", self.token_type, self.lexeme)?;

        match &self.literal {
            Some(Literal::Str(s)) => write!(f, "{}", s),

            // 3 → "3.0", 3.14 → "3.14"
            Some(Literal::Number(n)) if n.fract() == 0.0 && n.abs() < i64::MAX as f64 => {
                let mut digits = itoa::Buffer::new();
                write!(f, "{}.0", digits.format(*n as i64))
            }

            Some(Literal::Number(n)) => write!(f, "{}", n),

            None => write!(f, "null"),
        }
    }
}
