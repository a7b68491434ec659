//! Compile error type

use std::fmt;

use thiserror::Error;

/// A single compile error, already formatted with its location label
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("[{module} line {line}] {message}")]
pub struct CompileError {
    /// Name of the module being compiled
    pub module: String,

    /// Line the error was reported on
    pub line: u32,

    /// Message including the `Error at '...':` label
    pub message: String,
}

/// Where in the token stream an error was detected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ErrorLabel<'a> {
    /// A lexer error: no token to point at
    Lexer,
    /// A newline token
    Newline,
    /// End of input
    EndOfFile,
    /// Any other token, by its (possibly truncated) text
    Token(&'a str),
}

impl fmt::Display for ErrorLabel<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorLabel::Lexer => write!(f, "Error"),
            ErrorLabel::Newline => write!(f, "Error at newline"),
            ErrorLabel::EndOfFile => write!(f, "Error at end of file"),
            ErrorLabel::Token(text) => write!(f, "Error at '{}'", text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels() {
        assert_eq!(ErrorLabel::Lexer.to_string(), "Error");
        assert_eq!(ErrorLabel::Newline.to_string(), "Error at newline");
        assert_eq!(ErrorLabel::EndOfFile.to_string(), "Error at end of file");
        assert_eq!(ErrorLabel::Token("foo").to_string(), "Error at 'foo'");
    }

    #[test]
    fn test_display() {
        let error = CompileError {
            module: "main".to_string(),
            line: 3,
            message: "Error at 'x': Expect expression.".to_string(),
        };
        assert_eq!(error.to_string(), "[main line 3] Error at 'x': Expect expression.");
    }
}
