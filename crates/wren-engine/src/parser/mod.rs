//! Wren lexer
//!
//! The compiler pulls tokens one at a time with [`Lexer::next_token`];
//! there is no separate syntax tree.

pub mod lexer;
pub mod token;

pub use lexer::{LexError, Lexer};
pub use token::{Literal, Span, Token, TokenKind};
