//! Byte-stream to token-stream scanner (§4.1).
//!
//! Ported in spirit from `original_source/src/scanner.c`: a pure function over
//! `{source, start, current, line}` state. The character-level details are an
//! external-collaborator concern (spec.md §1); this module exists only so the
//! parser has a token stream to consume.

use crate::token::{Token, TokenKind};

pub struct Scanner<'src> {
    source: &'src str,
    bytes: &'src [u8],
    start: usize,
    current: usize,
    line: u32,
}

impl<'src> Scanner<'src> {
    pub fn new(source: &'src str) -> Self {
        Self { source, bytes: source.as_bytes(), start: 0, current: 0, line: 1 }
    }

    pub fn line(&self) -> u32 {
        self.line
    }

    fn is_at_end(&self) -> bool {
        self.current >= self.bytes.len()
    }

    fn advance(&mut self) -> u8 {
        let c = self.bytes[self.current];
        self.current += 1;
        c
    }

    fn peek(&self) -> u8 {
        if self.is_at_end() { 0 } else { self.bytes[self.current] }
    }

    fn peek_next(&self) -> u8 {
        if self.current + 1 >= self.bytes.len() { 0 } else { self.bytes[self.current + 1] }
    }

    fn matches(&mut self, expected: u8) -> bool {
        if self.is_at_end() || self.bytes[self.current] != expected {
            return false;
        }
        self.current += 1;
        true
    }

    fn make(&self, kind: TokenKind) -> Token<'src> {
        Token::new(kind, &self.source[self.start..self.current], self.line)
    }

    fn error(&self, message: &'static str) -> Token<'src> {
        Token::new(TokenKind::Error, message, self.line)
    }

    fn skip_whitespace(&mut self) {
        loop {
            match self.peek() {
                b' ' | b'\r' | b'\t' => {
                    self.advance();
                }
                b'\n' => {
                    self.line += 1;
                    self.advance();
                }
                b'/' if self.peek_next() == b'/' => {
                    while self.peek() != b'\n' && !self.is_at_end() {
                        self.advance();
                    }
                }
                _ => return,
            }
        }
    }

    fn string(&mut self) -> Token<'src> {
        while self.peek() != b'"' && !self.is_at_end() {
            if self.peek() == b'\n' {
                self.line += 1;
            }
            self.advance();
        }
        if self.is_at_end() {
            return self.error("Unterminated string.");
        }
        self.advance(); // closing quote
        self.make(TokenKind::String)
    }

    fn number(&mut self) -> Token<'src> {
        while self.peek().is_ascii_digit() {
            self.advance();
        }
        if self.peek() == b'.' && self.peek_next().is_ascii_digit() {
            self.advance();
            while self.peek().is_ascii_digit() {
                self.advance();
            }
        }
        self.make(TokenKind::Number)
    }

    fn atom(&mut self) -> Token<'src> {
        while is_ident_continue(self.peek()) {
            self.advance();
        }
        self.make(TokenKind::Atom)
    }

    fn identifier(&mut self) -> Token<'src> {
        while is_ident_continue(self.peek()) {
            self.advance();
        }
        // identifiers may end with `?` or `!` per spec.md §4.1
        if matches!(self.peek(), b'?' | b'!') {
            self.advance();
        }
        let text = &self.source[self.start..self.current];
        let kind = TokenKind::keyword(text).unwrap_or(TokenKind::Identifier);
        self.make(kind)
    }

    pub fn next_token(&mut self) -> Token<'src> {
        self.skip_whitespace();
        self.start = self.current;
        if self.is_at_end() {
            return self.make(TokenKind::Eof);
        }

        let c = self.advance();
        if c == b':' {
            return self.atom_or_colon();
        }
        if is_ident_start(c) {
            return self.identifier();
        }
        if c.is_ascii_digit() {
            return self.number();
        }

        match c {
            b'(' => self.make(TokenKind::LeftParen),
            b')' => self.make(TokenKind::RightParen),
            b'{' => self.make(TokenKind::LeftBrace),
            b'}' => self.make(TokenKind::RightBrace),
            b'[' => self.make(TokenKind::LeftBracket),
            b']' => self.make(TokenKind::RightBracket),
            b',' => self.make(TokenKind::Comma),
            b'.' => self.make(TokenKind::Dot),
            b'-' => self.make(TokenKind::Minus),
            b'+' => self.make(TokenKind::Plus),
            b';' => self.make(TokenKind::Semicolon),
            b'*' => self.make(TokenKind::Star),
            b'/' => self.make(TokenKind::Slash),
            b'!' => {
                let kind = if self.matches(b'=') { TokenKind::BangEqual } else { TokenKind::Bang };
                self.make(kind)
            }
            b'=' => {
                let kind = if self.matches(b'=') {
                    TokenKind::EqualEqual
                } else if self.matches(b'>') {
                    TokenKind::Arrow
                } else {
                    TokenKind::Equal
                };
                self.make(kind)
            }
            b'<' => {
                let kind = if self.matches(b'=') { TokenKind::LessEqual } else { TokenKind::Less };
                self.make(kind)
            }
            b'>' => {
                let kind = if self.matches(b'=') { TokenKind::GreaterEqual } else { TokenKind::Greater };
                self.make(kind)
            }
            b'"' => self.string(),
            b'|' => {
                let kind = if self.matches(b'>') { TokenKind::Pipe } else { TokenKind::BitwiseOr };
                self.make(kind)
            }
            _ => self.error("Unexpected character."),
        }
    }

    fn atom_or_colon(&mut self) -> Token<'src> {
        if is_ident_start(self.peek()) {
            self.atom()
        } else {
            self.make(TokenKind::Colon)
        }
    }
}

fn is_ident_start(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'_'
}

fn is_ident_continue(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'_'
}

/// Scans the entire source into a token array up front, the way the parser consumes it.
pub fn tokenize(source: &str) -> Vec<Token<'_>> {
    let mut scanner = Scanner::new(source);
    let mut tokens = Vec::new();
    loop {
        let token = scanner.next_token();
        let done = token.kind == TokenKind::Eof;
        tokens.push(token);
        if done {
            break;
        }
    }
    tokens
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn scans_arrow_and_pipe_distinctly() {
        let tokens = tokenize("=> |> |");
        assert_eq!(tokens[0].kind, TokenKind::Arrow);
        assert_eq!(tokens[1].kind, TokenKind::Pipe);
        assert_eq!(tokens[2].kind, TokenKind::BitwiseOr);
    }

    #[test]
    fn scans_atom_literal() {
        let tokens = tokenize(":sleep");
        assert_eq!(tokens[0].kind, TokenKind::Atom);
        assert_eq!(tokens[0].lexeme, ":sleep");
    }

    #[test]
    fn identifier_may_end_with_bang_or_question() {
        let tokens = tokenize("ready? done!");
        assert_eq!(tokens[0].lexeme, "ready?");
        assert_eq!(tokens[1].lexeme, "done!");
    }

    #[test]
    fn unterminated_string_is_an_error_token() {
        let tokens = tokenize("\"abc");
        assert_eq!(tokens[0].kind, TokenKind::Error);
    }

    #[test]
    fn line_comments_are_skipped() {
        let tokens = tokenize("1 // comment\n2");
        assert_eq!(tokens[0].kind, TokenKind::Number);
        assert_eq!(tokens[1].kind, TokenKind::Number);
        assert_eq!(tokens[1].line, 2);
    }
}
