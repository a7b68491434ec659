//! Token definitions for the Wren language.
//!
//! This module defines every token kind that can appear in Wren source,
//! including keywords, operators, literals, and the significant newline.

use std::fmt;

/// Kind of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    // Punctuation
    /// `(`
    LeftParen,
    /// `)`
    RightParen,
    /// `[`
    LeftBracket,
    /// `]`
    RightBracket,
    /// `{`
    LeftBrace,
    /// `}`
    RightBrace,
    /// `:`
    Colon,
    /// `.`
    Dot,
    /// `..`
    DotDot,
    /// `...`
    DotDotDot,
    /// `,`
    Comma,
    /// `*`
    Star,
    /// `/`
    Slash,
    /// `%`
    Percent,
    /// `#`
    Hash,
    /// `+`
    Plus,
    /// `-`
    Minus,
    /// `<<`
    LtLt,
    /// `>>`
    GtGt,
    /// `|`
    Pipe,
    /// `||`
    PipePipe,
    /// `^`
    Caret,
    /// `&`
    Amp,
    /// `&&`
    AmpAmp,
    /// `!`
    Bang,
    /// `~`
    Tilde,
    /// `?`
    Question,
    /// `=`
    Eq,
    /// `<`
    Lt,
    /// `>`
    Gt,
    /// `<=`
    LtEq,
    /// `>=`
    GtEq,
    /// `==`
    EqEq,
    /// `!=`
    BangEq,

    // Keywords
    /// `as`
    As,
    /// `break`
    Break,
    /// `class`
    Class,
    /// `construct`
    Construct,
    /// `continue`
    Continue,
    /// `else`
    Else,
    /// `false`
    False,
    /// `for`
    For,
    /// `foreign`
    Foreign,
    /// `if`
    If,
    /// `import`
    Import,
    /// `in`
    In,
    /// `is`
    Is,
    /// `null`
    Null,
    /// `return`
    Return,
    /// `static`
    Static,
    /// `super`
    Super,
    /// `this`
    This,
    /// `true`
    True,
    /// `var`
    Var,
    /// `while`
    While,

    // Names and literals
    /// `_name`
    Field,
    /// `__name`
    StaticField,
    /// Identifier
    Name,
    /// Number literal
    Number,
    /// String literal, or the last part of an interpolated string
    String,
    /// A string part ending in `%(`
    Interpolation,

    // Structure
    /// Significant newline
    Line,
    /// Lexing failed; the lexer has already reported why
    Error,
    /// End of input
    Eof,
}

impl TokenKind {
    /// Keyword for an identifier, if it is one
    pub fn keyword(text: &str) -> Option<TokenKind> {
        let kind = match text {
            "as" => TokenKind::As,
            "break" => TokenKind::Break,
            "class" => TokenKind::Class,
            "construct" => TokenKind::Construct,
            "continue" => TokenKind::Continue,
            "else" => TokenKind::Else,
            "false" => TokenKind::False,
            "for" => TokenKind::For,
            "foreign" => TokenKind::Foreign,
            "if" => TokenKind::If,
            "import" => TokenKind::Import,
            "in" => TokenKind::In,
            "is" => TokenKind::Is,
            "null" => TokenKind::Null,
            "return" => TokenKind::Return,
            "static" => TokenKind::Static,
            "super" => TokenKind::Super,
            "this" => TokenKind::This,
            "true" => TokenKind::True,
            "var" => TokenKind::Var,
            "while" => TokenKind::While,
            _ => return None,
        };
        Some(kind)
    }

    /// Check if this kind is a keyword
    pub fn is_keyword(&self) -> bool {
        matches!(
            self,
            TokenKind::As
                | TokenKind::Break
                | TokenKind::Class
                | TokenKind::Construct
                | TokenKind::Continue
                | TokenKind::Else
                | TokenKind::False
                | TokenKind::For
                | TokenKind::Foreign
                | TokenKind::If
                | TokenKind::Import
                | TokenKind::In
                | TokenKind::Is
                | TokenKind::Null
                | TokenKind::Return
                | TokenKind::Static
                | TokenKind::Super
                | TokenKind::This
                | TokenKind::True
                | TokenKind::Var
                | TokenKind::While
        )
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            TokenKind::LeftParen => "(",
            TokenKind::RightParen => ")",
            TokenKind::LeftBracket => "[",
            TokenKind::RightBracket => "]",
            TokenKind::LeftBrace => "{",
            TokenKind::RightBrace => "}",
            TokenKind::Colon => ":",
            TokenKind::Dot => ".",
            TokenKind::DotDot => "..",
            TokenKind::DotDotDot => "...",
            TokenKind::Comma => ",",
            TokenKind::Star => "*",
            TokenKind::Slash => "/",
            TokenKind::Percent => "%",
            TokenKind::Hash => "#",
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::LtLt => "<<",
            TokenKind::GtGt => ">>",
            TokenKind::Pipe => "|",
            TokenKind::PipePipe => "||",
            TokenKind::Caret => "^",
            TokenKind::Amp => "&",
            TokenKind::AmpAmp => "&&",
            TokenKind::Bang => "!",
            TokenKind::Tilde => "~",
            TokenKind::Question => "?",
            TokenKind::Eq => "=",
            TokenKind::Lt => "<",
            TokenKind::Gt => ">",
            TokenKind::LtEq => "<=",
            TokenKind::GtEq => ">=",
            TokenKind::EqEq => "==",
            TokenKind::BangEq => "!=",
            TokenKind::As => "as",
            TokenKind::Break => "break",
            TokenKind::Class => "class",
            TokenKind::Construct => "construct",
            TokenKind::Continue => "continue",
            TokenKind::Else => "else",
            TokenKind::False => "false",
            TokenKind::For => "for",
            TokenKind::Foreign => "foreign",
            TokenKind::If => "if",
            TokenKind::Import => "import",
            TokenKind::In => "in",
            TokenKind::Is => "is",
            TokenKind::Null => "null",
            TokenKind::Return => "return",
            TokenKind::Static => "static",
            TokenKind::Super => "super",
            TokenKind::This => "this",
            TokenKind::True => "true",
            TokenKind::Var => "var",
            TokenKind::While => "while",
            TokenKind::Field => "field",
            TokenKind::StaticField => "static field",
            TokenKind::Name => "name",
            TokenKind::Number => "number",
            TokenKind::String => "string",
            TokenKind::Interpolation => "interpolation",
            TokenKind::Line => "newline",
            TokenKind::Error => "error",
            TokenKind::Eof => "end of file",
        };
        f.write_str(text)
    }
}

/// Source location of a token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    /// Start byte offset
    pub start: usize,
    /// End byte offset (exclusive)
    pub end: usize,
    /// Line number (1-indexed)
    pub line: u32,
}

impl Span {
    /// Create a span
    pub fn new(start: usize, end: usize, line: u32) -> Self {
        Self { start, end, line }
    }
}

/// Value carried by a literal token
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Literal {
    /// Not a literal
    #[default]
    None,
    /// Number value
    Num(f64),
    /// Unescaped string bytes (may be invalid UTF-8 after `\x` escapes)
    Str(Vec<u8>),
}

/// A lexed token
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    /// Token kind
    pub kind: TokenKind,
    /// Location in the source
    pub span: Span,
    /// Literal value for numbers and strings
    pub literal: Literal,
}

impl Token {
    /// Create a token without a literal value
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self {
            kind,
            span,
            literal: Literal::None,
        }
    }

    /// Source text of the token
    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        source.get(self.span.start..self.span.end).unwrap_or("")
    }

    /// Line the token starts on
    #[inline]
    pub fn line(&self) -> u32 {
        self.span.line
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_lookup() {
        assert_eq!(TokenKind::keyword("class"), Some(TokenKind::Class));
        assert_eq!(TokenKind::keyword("construct"), Some(TokenKind::Construct));
        assert_eq!(TokenKind::keyword("klass"), None);
        assert!(TokenKind::While.is_keyword());
        assert!(!TokenKind::Name.is_keyword());
    }

    #[test]
    fn test_token_text() {
        let source = "var answer = 42";
        let token = Token::new(TokenKind::Name, Span::new(4, 10, 1));
        assert_eq!(token.text(source), "answer");
        assert_eq!(token.line(), 1);
    }

    #[test]
    fn test_display() {
        assert_eq!(TokenKind::DotDotDot.to_string(), "...");
        assert_eq!(TokenKind::Line.to_string(), "newline");
    }
}
