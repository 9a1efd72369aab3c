//! Streaming lexer: `&[u8]` in, [`Token`]s out.
//!
//! [`Scanner`] is a `FusedIterator` of `Result<Token>`.  A lexical error is
//! yielded in place of a token and scanning resumes after the offending
//! character, so one pass reports every bad character.  The stream always ends
//! with exactly one `EOF` token.
//!
//! `//` comments produce no token and are skipped with `memchr`; a lone `/`
//! is `SLASH`.  Strings may span lines.  Numbers are `digits ('.' digits)?`.
//! Keywords come from a compile-time `phf` map.

use crate::error::{LoxError, Result};
use crate::token::{Literal, Token, TokenType};
use log::{debug, info};
use memchr::memchr;
use phf::phf_map;
use std::iter::FusedIterator;

static KEYWORDS: phf::Map<&'static [u8], TokenType> = phf_map! {
    b"and"    => TokenType::AND,
    b"class"  => TokenType::CLASS,
    b"else"   => TokenType::ELSE,
    b"false"  => TokenType::FALSE,
    b"fun"    => TokenType::FUN,
    b"for"    => TokenType::FOR,
    b"if"     => TokenType::IF,
    b"nil"    => TokenType::NIL,
    b"or"     => TokenType::OR,
    b"print"  => TokenType::PRINT,
    b"return" => TokenType::RETURN,
    b"super"  => TokenType::SUPER,
    b"this"   => TokenType::THIS,
    b"true"   => TokenType::TRUE,
    b"var"    => TokenType::VAR,
    b"while"  => TokenType::WHILE,
};

pub struct Scanner<'a> {
    src: &'a [u8],
    start: usize,                                // first byte of the current lexeme
    curr: usize,                                 // one past the last byte examined
    line: usize,                                 // 1‑based
    pending: Option<(TokenType, Option<Literal>)>, // recognised token waiting to be emitted
}

impl<'a> Scanner<'a> {
    #[inline]
    pub fn new(src: &'a [u8]) -> Self {
        info!("Scanner created over {} bytes", src.len());

        Self {
            src,
            start: 0,
            curr: 0,
            line: 1,
            pending: None,
        }
    }

    #[inline(always)]
    const fn len(&self) -> usize {
        self.src.len()
    }

    #[inline(always)]
    fn is_at_end(&self) -> bool {
        self.curr >= self.len()
    }

    /// Advance one byte and return it. Callers guard with [`Self::is_at_end`].
    #[inline(always)]
    fn advance(&mut self) -> u8 {
        let b = self.src[self.curr];
        self.curr += 1;
        b
    }

    /// Current byte, or `0` past EOF.
    #[inline(always)]
    fn peek(&self) -> u8 {
        if self.is_at_end() {
            0
        } else {
            self.src[self.curr]
        }
    }

    #[inline(always)]
    fn peek_next(&self) -> u8 {
        if self.curr + 1 >= self.len() {
            0
        } else {
            self.src[self.curr + 1]
        }
    }

    #[inline(always)]
    fn match_byte(&mut self, expected: u8) -> bool {
        if !self.is_at_end() && self.peek() == expected {
            self.advance();
            true
        } else {
            false
        }
    }

    #[inline(always)]
    fn emit(&mut self, token_type: TokenType) {
        self.pending = Some((token_type, None));
    }

    /// Pick between a one‑ and two‑byte operator depending on a trailing `=`.
    #[inline(always)]
    fn emit_with_equal(&mut self, with: TokenType, without: TokenType) {
        let tt = if self.match_byte(b'=') { with } else { without };
        self.emit(tt);
    }

    fn lexeme(&self) -> String {
        String::from_utf8_lossy(&self.src[self.start..self.curr]).into_owned()
    }

    /// Scan a *single* lexeme starting at `self.curr`.  Whitespace and comments
    /// leave `pending` empty.
    fn scan_token(&mut self) -> Result<()> {
        let b = self.advance();

        match b {
            b'(' => self.emit(TokenType::LEFT_PAREN),
            b')' => self.emit(TokenType::RIGHT_PAREN),
            b'{' => self.emit(TokenType::LEFT_BRACE),
            b'}' => self.emit(TokenType::RIGHT_BRACE),
            b',' => self.emit(TokenType::COMMA),
            b'.' => self.emit(TokenType::DOT),
            b'-' => self.emit(TokenType::MINUS),
            b'+' => self.emit(TokenType::PLUS),
            b';' => self.emit(TokenType::SEMICOLON),
            b'*' => self.emit(TokenType::STAR),

            b'!' => self.emit_with_equal(TokenType::BANG_EQUAL, TokenType::BANG),
            b'=' => self.emit_with_equal(TokenType::EQUAL_EQUAL, TokenType::EQUAL),
            b'<' => self.emit_with_equal(TokenType::LESS_EQUAL, TokenType::LESS),
            b'>' => self.emit_with_equal(TokenType::GREATER_EQUAL, TokenType::GREATER),

            b'/' => {
                if !self.match_byte(b'/') {
                    self.emit(TokenType::SLASH);
                    return Ok(());
                }

                // Comment: stop *at* the newline so the line counter sees it.
                match memchr(b'\n', &self.src[self.curr..]) {
                    Some(pos) => self.curr += pos,
                    None => self.curr = self.len(),
                }
            }

            b' ' | b'\r' | b'\t' => {}

            b'\n' => self.line += 1,

            b'"' => return self.string(),

            b'0'..=b'9' => self.number(),

            b'a'..=b'z' | b'A'..=b'Z' | b'_' => self.identifier(),

            _ => {
                // Swallow UTF‑8 continuation bytes so one character ⇒ one error.
                if b >= 0x80 {
                    while (0x80..0xC0).contains(&self.peek()) {
                        self.advance();
                    }
                }

                return Err(LoxError::lex(
                    self.line,
                    format!("Unexpected character: {}", self.lexeme()),
                ));
            }
        }

        Ok(())
    }

    /// Double‑quoted string literal. On return `self.curr` is past the closing `"`.
    fn string(&mut self) -> Result<()> {
        while !self.is_at_end() && self.peek() != b'"' {
            if self.advance() == b'\n' {
                self.line += 1;
            }
        }

        if self.is_at_end() {
            return Err(LoxError::lex(self.line, "Unterminated string."));
        }

        self.advance(); // closing quote

        let contents = &self.src[self.start + 1..self.curr - 1];
        let value = String::from_utf8_lossy(contents).into_owned();

        self.pending = Some((TokenType::STRING, Some(Literal::Str(value))));

        Ok(())
    }

    /// Numeric literal (`123`, `3.14`).  A trailing `.` is not part of the number.
    fn number(&mut self) {
        while self.peek().is_ascii_digit() {
            self.advance();
        }

        if self.peek() == b'.' && self.peek_next().is_ascii_digit() {
            self.advance();

            while self.peek().is_ascii_digit() {
                self.advance();
            }
        }

        // Only ASCII digits and '.' were consumed, so parsing cannot fail.
        let n: f64 = self.lexeme().parse::<f64>().unwrap_or(0.0);

        self.pending = Some((TokenType::NUMBER, Some(Literal::Number(n))));
    }

    fn identifier(&mut self) {
        while matches!(self.peek(), b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'_') {
            self.advance();
        }

        let word = &self.src[self.start..self.curr];
        let keyword = KEYWORDS.get(word).copied();

        self.emit(keyword.unwrap_or(TokenType::IDENTIFIER));
    }
}

impl<'a> Iterator for Scanner<'a> {
    type Item = Result<Token>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.curr > self.len() {
                return None;
            }

            if self.curr == self.len() {
                self.curr += 1; // past EOF, the iterator stays exhausted
                return Some(Ok(Token::new(TokenType::EOF, "", None, self.line)));
            }

            self.start = self.curr;
            self.pending = None;

            if let Err(e) = self.scan_token() {
                return Some(Err(e));
            }

            if let Some((tt, literal)) = self.pending.take() {
                debug!("Scanned token ({:?}) on line {}", tt, self.line);

                return Some(Ok(Token::new(tt, self.lexeme(), literal, self.line)));
            }
        }
    }
}

impl<'a> FusedIterator for Scanner<'a> {}

/// Scan a whole buffer, splitting tokens from lexical errors.
pub fn scan_all(src: &[u8]) -> (Vec<Token>, Vec<LoxError>) {
    let mut tokens = Vec::new();
    let mut errors = Vec::new();

    for item in Scanner::new(src) {
        match item {
            Ok(token) => tokens.push(token),
            Err(e) => errors.push(e),
        }
    }

    info!(
        "Scanned {} tokens with {} error(s)",
        tokens.len(),
        errors.len()
    );

    (tokens, errors)
}
