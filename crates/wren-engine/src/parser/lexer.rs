//! Lexer for the Wren programming language.
//!
//! Tokens are produced on demand. Fixed tokens and names are matched by a
//! logos-generated scanner; whitespace, comments, newlines, numbers and
//! strings are handled by hand because they carry state the scanner cannot
//! see: the current line, nested block comments and the paren depth of each
//! open string interpolation.

use logos::Logos;
use thiserror::Error;

use crate::parser::token::{Literal, Span, Token, TokenKind};
use crate::vm::defaults::MAX_INTERPOLATION_NESTING;

/// Logos-based token enum for the context-free part of the grammar.
///
/// Converted to [`TokenKind`] right after matching.
#[derive(Logos, Debug, Clone, Copy, PartialEq)]
enum LogosToken {
    #[token("[")]
    LeftBracket,
    #[token("]")]
    RightBracket,
    #[token("{")]
    LeftBrace,
    #[token("}")]
    RightBrace,
    #[token(":")]
    Colon,
    #[token(".")]
    Dot,
    #[token("..")]
    DotDot,
    #[token("...")]
    DotDotDot,
    #[token(",")]
    Comma,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("#")]
    Hash,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("<<")]
    LtLt,
    #[token(">>")]
    GtGt,
    #[token("|")]
    Pipe,
    #[token("||")]
    PipePipe,
    #[token("^")]
    Caret,
    #[token("&")]
    Amp,
    #[token("&&")]
    AmpAmp,
    #[token("!")]
    Bang,
    #[token("~")]
    Tilde,
    #[token("?")]
    Question,
    #[token("=")]
    Eq,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,
    #[token("<=")]
    LtEq,
    #[token(">=")]
    GtEq,
    #[token("==")]
    EqEq,
    #[token("!=")]
    BangEq,

    // Keywords are split out of names after matching
    #[regex(r"[a-zA-Z][a-zA-Z0-9_]*")]
    Name,

    // `_name` and `__name`, told apart after matching
    #[regex(r"_[a-zA-Z0-9_]*")]
    Field,
}

/// Lexer error
#[derive(Debug, Clone, PartialEq, Error)]
#[error("[line {line}] {message}")]
pub struct LexError {
    /// Line the error was found on
    pub line: u32,
    /// Description
    pub message: String,
}

/// On-demand lexer over a source string
pub struct Lexer<'a> {
    source: &'a str,
    pos: usize,
    line: u32,
    /// Unmatched `(` count for each string interpolation still open
    interpolations: Vec<usize>,
    errors: Vec<LexError>,
}

impl<'a> Lexer<'a> {
    /// Create a new lexer for the given source
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            pos: 0,
            line: 1,
            interpolations: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Lex the whole source, ending with an `Eof` token
    pub fn tokenize(mut self) -> (Vec<Token>, Vec<LexError>) {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token();
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                break;
            }
        }
        (tokens, self.errors)
    }

    /// Errors found since the last call
    pub fn take_errors(&mut self) -> Vec<LexError> {
        std::mem::take(&mut self.errors)
    }

    /// Current line number
    pub fn line(&self) -> u32 {
        self.line
    }

    /// Produce the next token. Returns `Eof` forever once input runs out.
    pub fn next_token(&mut self) -> Token {
        self.skip_trivia();

        let start = self.pos;
        let line = self.line;
        let Some(&c) = self.bytes().get(start) else {
            return Token::new(TokenKind::Eof, Span::new(start, start, line));
        };

        match c {
            b'\n' => {
                self.pos += 1;
                self.line += 1;
                Token::new(TokenKind::Line, Span::new(start, start + 1, line))
            }
            b'(' => {
                if let Some(depth) = self.interpolations.last_mut() {
                    *depth += 1;
                }
                self.pos += 1;
                Token::new(TokenKind::LeftParen, Span::new(start, start + 1, line))
            }
            b')' => {
                self.pos += 1;
                if let Some(depth) = self.interpolations.last_mut() {
                    *depth -= 1;
                    if *depth == 0 {
                        // This paren closes the interpolated expression, so
                        // the rest of the string literal follows.
                        self.interpolations.pop();
                        return self.read_string(start, line);
                    }
                }
                Token::new(TokenKind::RightParen, Span::new(start, start + 1, line))
            }
            b'"' => {
                if self.source[start..].starts_with("\"\"\"") {
                    self.read_raw_string(start, line)
                } else {
                    self.pos += 1;
                    self.read_string(start, line)
                }
            }
            b'#' if line == 1 && self.source[start..].starts_with("#!/") => {
                self.skip_line_comment();
                self.next_token()
            }
            b'0'..=b'9' => self.read_number(start, line),
            _ => self.scan(start, line),
        }
    }

    #[inline]
    fn bytes(&self) -> &'a [u8] {
        self.source.as_bytes()
    }

    #[inline]
    fn peek(&self) -> u8 {
        self.bytes().get(self.pos).copied().unwrap_or(0)
    }

    #[inline]
    fn peek_next(&self) -> u8 {
        self.bytes().get(self.pos + 1).copied().unwrap_or(0)
    }

    fn error(&mut self, message: impl Into<String>) {
        self.errors.push(LexError {
            line: self.line,
            message: message.into(),
        });
    }

    /// Skip spaces, tabs, carriage returns and comments. Newlines are tokens.
    fn skip_trivia(&mut self) {
        loop {
            match (self.peek(), self.peek_next()) {
                (b' ' | b'\t' | b'\r', _) => self.pos += 1,
                (b'/', b'/') => self.skip_line_comment(),
                (b'/', b'*') => self.skip_block_comment(),
                _ => break,
            }
        }
    }

    fn skip_line_comment(&mut self) {
        while self.pos < self.source.len() && self.peek() != b'\n' {
            self.pos += 1;
        }
    }

    /// Block comments nest
    fn skip_block_comment(&mut self) {
        self.pos += 2;
        let mut nesting = 1;
        while nesting > 0 {
            match (self.peek(), self.peek_next()) {
                (0, _) if self.pos >= self.source.len() => {
                    self.error("Unterminated block comment.");
                    return;
                }
                (b'/', b'*') => {
                    self.pos += 2;
                    nesting += 1;
                }
                (b'*', b'/') => {
                    self.pos += 2;
                    nesting -= 1;
                }
                (b'\n', _) => {
                    self.pos += 1;
                    self.line += 1;
                }
                _ => self.pos += 1,
            }
        }
    }

    /// Match a fixed token or name with the generated scanner
    fn scan(&mut self, start: usize, line: u32) -> Token {
        let mut lex = LogosToken::lexer(&self.source[start..]);
        let matched = lex.next();
        let len = lex.span().end;

        let Some(Ok(logos_token)) = matched else {
            let ch = self.source[start..].chars().next().unwrap_or('\0');
            self.pos = start + ch.len_utf8();
            self.error(format!("Invalid character '{}'.", ch));
            return Token::new(TokenKind::Error, Span::new(start, self.pos, line));
        };

        self.pos = start + len;
        let span = Span::new(start, self.pos, line);
        let text = &self.source[start..self.pos];

        let kind = match logos_token {
            LogosToken::LeftBracket => TokenKind::LeftBracket,
            LogosToken::RightBracket => TokenKind::RightBracket,
            LogosToken::LeftBrace => TokenKind::LeftBrace,
            LogosToken::RightBrace => TokenKind::RightBrace,
            LogosToken::Colon => TokenKind::Colon,
            LogosToken::Dot => TokenKind::Dot,
            LogosToken::DotDot => TokenKind::DotDot,
            LogosToken::DotDotDot => TokenKind::DotDotDot,
            LogosToken::Comma => TokenKind::Comma,
            LogosToken::Star => TokenKind::Star,
            LogosToken::Slash => TokenKind::Slash,
            LogosToken::Percent => TokenKind::Percent,
            LogosToken::Hash => TokenKind::Hash,
            LogosToken::Plus => TokenKind::Plus,
            LogosToken::Minus => TokenKind::Minus,
            LogosToken::LtLt => TokenKind::LtLt,
            LogosToken::GtGt => TokenKind::GtGt,
            LogosToken::Pipe => TokenKind::Pipe,
            LogosToken::PipePipe => TokenKind::PipePipe,
            LogosToken::Caret => TokenKind::Caret,
            LogosToken::Amp => TokenKind::Amp,
            LogosToken::AmpAmp => TokenKind::AmpAmp,
            LogosToken::Bang => TokenKind::Bang,
            LogosToken::Tilde => TokenKind::Tilde,
            LogosToken::Question => TokenKind::Question,
            LogosToken::Eq => TokenKind::Eq,
            LogosToken::Lt => TokenKind::Lt,
            LogosToken::Gt => TokenKind::Gt,
            LogosToken::LtEq => TokenKind::LtEq,
            LogosToken::GtEq => TokenKind::GtEq,
            LogosToken::EqEq => TokenKind::EqEq,
            LogosToken::BangEq => TokenKind::BangEq,
            LogosToken::Name => TokenKind::keyword(text).unwrap_or(TokenKind::Name),
            LogosToken::Field if text.starts_with("__") => TokenKind::StaticField,
            LogosToken::Field => TokenKind::Field,
        };
        Token::new(kind, span)
    }

    /// Numbers are scanned by hand: `1.abs` and `1..2` need the dot left
    /// alone when no digit follows it.
    fn read_number(&mut self, start: usize, line: u32) -> Token {
        if self.peek() == b'0' && self.peek_next() == b'x' {
            self.pos += 2;
            while self.peek().is_ascii_hexdigit() {
                self.pos += 1;
            }
            let digits = &self.source[start + 2..self.pos];
            let value = u64::from_str_radix(digits, 16)
                .map(|n| n as f64)
                .unwrap_or(f64::INFINITY);
            return self.number(Span::new(start, self.pos, line), value);
        }

        while self.peek().is_ascii_digit() {
            self.pos += 1;
        }
        if self.peek() == b'.' && self.peek_next().is_ascii_digit() {
            self.pos += 1;
            while self.peek().is_ascii_digit() {
                self.pos += 1;
            }
        }
        if matches!(self.peek(), b'e' | b'E') {
            self.pos += 1;
            if matches!(self.peek(), b'+' | b'-') {
                self.pos += 1;
            }
            if !self.peek().is_ascii_digit() {
                self.error("Unterminated scientific notation.");
            }
            while self.peek().is_ascii_digit() {
                self.pos += 1;
            }
        }

        let value = self.source[start..self.pos].parse::<f64>().unwrap_or(0.0);
        self.number(Span::new(start, self.pos, line), value)
    }

    fn number(&mut self, span: Span, value: f64) -> Token {
        if value.is_infinite() {
            self.error("Number literal was too large.");
        }
        Token {
            kind: TokenKind::Number,
            span,
            literal: Literal::Num(if value.is_infinite() { 0.0 } else { value }),
        }
    }

    /// Read string contents after the opening quote (or closing paren of an
    /// interpolation) up to the closing quote or the next `%(`.
    fn read_string(&mut self, start: usize, line: u32) -> Token {
        let mut kind = TokenKind::String;
        let mut bytes = Vec::new();

        loop {
            if self.pos >= self.source.len() {
                self.error("Unterminated string.");
                break;
            }
            let c = self.peek();
            self.pos += 1;

            match c {
                b'"' => break,
                b'\r' => {}
                b'\n' => {
                    self.line += 1;
                    bytes.push(c);
                }
                b'%' if self.interpolations.len() < MAX_INTERPOLATION_NESTING => {
                    if self.peek() == b'(' {
                        self.pos += 1;
                    } else {
                        self.error("Expect '(' after '%'.");
                    }
                    self.interpolations.push(1);
                    kind = TokenKind::Interpolation;
                    break;
                }
                b'%' => {
                    self.error(format!(
                        "Interpolation may only nest {} levels deep.",
                        MAX_INTERPOLATION_NESTING
                    ));
                    bytes.push(c);
                }
                b'\\' => self.read_escape(&mut bytes),
                _ => bytes.push(c),
            }
        }

        Token {
            kind,
            span: Span::new(start, self.pos, line),
            literal: Literal::Str(bytes),
        }
    }

    fn read_escape(&mut self, bytes: &mut Vec<u8>) {
        let c = self.peek();
        if self.pos >= self.source.len() {
            return;
        }
        self.pos += 1;

        let escaped = match c {
            b'"' => b'"',
            b'\\' => b'\\',
            b'%' => b'%',
            b'0' => 0,
            b'a' => 0x07,
            b'b' => 0x08,
            b'e' => 0x1b,
            b'f' => 0x0c,
            b'n' => b'\n',
            b'r' => b'\r',
            b't' => b'\t',
            b'v' => 0x0b,
            b'x' => {
                if let Some(byte) = self.read_hex_escape(2, "byte") {
                    bytes.push(byte as u8);
                }
                return;
            }
            b'u' | b'U' => {
                let digits = if c == b'u' { 4 } else { 8 };
                if let Some(code) = self.read_hex_escape(digits, "Unicode") {
                    if let Some(ch) = char::from_u32(code) {
                        let mut buf = [0u8; 4];
                        bytes.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
                    }
                }
                return;
            }
            other => {
                let ch = self.source[self.pos - 1..]
                    .chars()
                    .next()
                    .unwrap_or(other as char);
                self.error(format!("Invalid escape character '{}'.", ch));
                return;
            }
        };
        bytes.push(escaped);
    }

    fn read_hex_escape(&mut self, digits: usize, description: &str) -> Option<u32> {
        let mut value: u32 = 0;
        for _ in 0..digits {
            let c = self.peek();
            if c == b'"' || self.pos >= self.source.len() {
                self.error(format!("Incomplete {} escape sequence.", description));
                return None;
            }
            let Some(digit) = (c as char).to_digit(16) else {
                self.error(format!("Invalid {} escape sequence.", description));
                return None;
            };
            self.pos += 1;
            value = value.wrapping_mul(16) | digit;
        }
        Some(value)
    }

    /// `"""raw"""` strings: no escapes, no interpolation. A first or last
    /// line holding only whitespace is dropped.
    fn read_raw_string(&mut self, start: usize, line: u32) -> Token {
        self.pos += 3;
        let body_start = self.pos;

        let body_end = match self.source[body_start..].find("\"\"\"") {
            Some(offset) => {
                self.pos = body_start + offset + 3;
                body_start + offset
            }
            None => {
                self.pos = self.source.len();
                self.error("Unterminated raw string.");
                self.source.len()
            }
        };

        let body: Vec<u8> = self.source.as_bytes()[body_start..body_end]
            .iter()
            .copied()
            .filter(|&b| b != b'\r')
            .collect();
        self.line += body.iter().filter(|&&b| b == b'\n').count() as u32;

        let mut contents: &[u8] = &body;
        let is_blank = |part: &[u8]| part.iter().all(|&b| b == b' ' || b == b'\t');
        if let Some(first) = contents.iter().position(|&b| b == b'\n') {
            if is_blank(&contents[..first]) {
                contents = &contents[first + 1..];
            }
        }
        if let Some(last) = contents.iter().rposition(|&b| b == b'\n') {
            if is_blank(&contents[last + 1..]) {
                contents = &contents[..last];
            }
        } else if contents.len() < body.len() && is_blank(contents) {
            contents = &[];
        }

        Token {
            kind: TokenKind::String,
            span: Span::new(start, self.pos, line),
            literal: Literal::Str(contents.to_vec()),
        }
    }
}
