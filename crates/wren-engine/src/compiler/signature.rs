//! Method signatures
//!
//! Methods are looked up by signature string, not by name alone: `foo`,
//! `foo()`, `foo(_)` and `foo=(_)` are four different methods. This module
//! defines the signature type, its canonical string form, and the grammar for
//! the signature part of a method definition.

use std::fmt;

use super::compiler::Compiler;
use crate::parser::TokenKind;
use crate::vm::defaults::{MAX_METHOD_NAME, MAX_PARAMETERS};

/// Shape of a method signature
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SignatureKind {
    /// `name(a, b)`
    Method,
    /// `name`
    Getter,
    /// `name=(v)`
    Setter,
    /// `[a, b]`
    Subscript,
    /// `[a, b]=(v)`
    SubscriptSetter,
    /// `construct name(a, b)`
    Initializer,
}

/// A method name plus its shape and arity
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Signature {
    pub name: String,
    pub kind: SignatureKind,
    pub arity: usize,
}

impl Signature {
    pub fn new(name: impl Into<String>, kind: SignatureKind, arity: usize) -> Self {
        Self {
            name: name.into(),
            kind,
            arity,
        }
    }
}

fn write_params(f: &mut fmt::Formatter<'_>, arity: usize) -> fmt::Result {
    for i in 0..arity {
        if i > 0 {
            f.write_str(",")?;
        }
        f.write_str("_")?;
    }
    Ok(())
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            SignatureKind::Method => {
                write!(f, "{}(", self.name)?;
                write_params(f, self.arity)?;
                f.write_str(")")
            }
            SignatureKind::Getter => f.write_str(&self.name),
            SignatureKind::Setter => write!(f, "{}=(_)", self.name),
            SignatureKind::Subscript => {
                f.write_str("[")?;
                write_params(f, self.arity)?;
                f.write_str("]")
            }
            SignatureKind::SubscriptSetter => {
                f.write_str("[")?;
                write_params(f, self.arity.saturating_sub(1))?;
                f.write_str("]=(_)")
            }
            SignatureKind::Initializer => {
                write!(f, "init {}(", self.name)?;
                write_params(f, self.arity)?;
                f.write_str(")")
            }
        }
    }
}

/// How the rest of a method signature is parsed, chosen by its first token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum SignatureRule {
    /// Getter, setter or method with a parameter list
    Named,
    /// `[a, b]` with an optional setter part
    Subscript,
    /// Binary operator taking one parameter
    Infix,
    /// Prefix operator without parameters
    Unary,
    /// `-`: unary without a parameter, binary with one
    Mixed,
    /// `construct name(...)`
    Constructor,
}

/// Signature rule for a token starting a method definition
pub(super) fn signature_rule(kind: TokenKind) -> Option<SignatureRule> {
    use TokenKind::*;

    let rule = match kind {
        Name => SignatureRule::Named,
        LeftBracket => SignatureRule::Subscript,
        Construct => SignatureRule::Constructor,
        Minus => SignatureRule::Mixed,
        Bang | Tilde => SignatureRule::Unary,
        DotDot | DotDotDot | Star | Slash | Percent | Plus | LtLt | GtGt | Pipe | Caret | Amp | Lt | Gt | LtEq
        | GtEq | EqEq | BangEq | Is => SignatureRule::Infix,
        _ => return None,
    };
    Some(rule)
}

impl Compiler<'_, '_> {
    /// Signature named after the previous token
    pub(super) fn signature_from_token(&mut self, kind: SignatureKind) -> Signature {
        let name = self.previous_text();
        if name.len() > MAX_METHOD_NAME {
            self.error(&format!(
                "Method names cannot be longer than {} characters.",
                MAX_METHOD_NAME
            ));
        }
        Signature::new(name, kind, 0)
    }

    /// Report an error once a parameter or argument list grows too long
    pub(super) fn validate_num_parameters(&mut self, count: usize) {
        if count == MAX_PARAMETERS + 1 {
            self.error(&format!("Methods cannot have more than {} parameters.", MAX_PARAMETERS));
        }
    }

    /// Declare one parameter of the function being compiled
    fn declare_parameter(&mut self) {
        self.declare_named_variable();
        let top = self.top();
        self.adjust_slots(top, 1);
    }

    /// Comma-separated parameter names, after the opening delimiter
    pub(super) fn finish_parameter_list(&mut self, signature: &mut Signature) {
        loop {
            self.ignore_newlines();
            signature.arity += 1;
            self.validate_num_parameters(signature.arity);
            self.declare_parameter();
            if !self.match_token(TokenKind::Comma) {
                break;
            }
        }
    }

    /// Optional `(a, b)` after a method name
    fn parameter_list(&mut self, signature: &mut Signature) {
        if !self.match_token(TokenKind::LeftParen) {
            return;
        }
        signature.kind = SignatureKind::Method;

        self.ignore_newlines();
        if self.match_token(TokenKind::RightParen) {
            return;
        }
        self.finish_parameter_list(signature);
        self.consume(TokenKind::RightParen, "Expect ')' after parameters.");
    }

    /// Optional `=(value)` turning a getter or subscript into a setter
    fn maybe_setter(&mut self, signature: &mut Signature) -> bool {
        if !self.match_token(TokenKind::Eq) {
            return false;
        }
        signature.kind = if signature.kind == SignatureKind::Subscript {
            SignatureKind::SubscriptSetter
        } else {
            SignatureKind::Setter
        };

        self.consume(TokenKind::LeftParen, "Expect '(' after '='.");
        self.declare_parameter();
        self.consume(TokenKind::RightParen, "Expect ')' after parameter name.");
        signature.arity += 1;
        true
    }

    /// Parse the rest of a method signature. Parameters are declared as
    /// locals of the innermost function, which must be the method's.
    pub(super) fn parse_signature(&mut self, rule: SignatureRule, signature: &mut Signature) {
        match rule {
            SignatureRule::Named => {
                signature.kind = SignatureKind::Getter;
                if !self.maybe_setter(signature) {
                    self.parameter_list(signature);
                }
            }
            SignatureRule::Subscript => {
                signature.kind = SignatureKind::Subscript;
                signature.name.clear();
                self.finish_parameter_list(signature);
                self.consume(TokenKind::RightBracket, "Expect ']' after parameters.");
                self.maybe_setter(signature);
            }
            SignatureRule::Infix => {
                signature.kind = SignatureKind::Method;
                signature.arity = 1;
                self.consume(TokenKind::LeftParen, "Expect '(' after operator name.");
                self.declare_parameter();
                self.consume(TokenKind::RightParen, "Expect ')' after parameter name.");
            }
            SignatureRule::Unary => {
                signature.kind = SignatureKind::Getter;
            }
            SignatureRule::Mixed => {
                signature.kind = SignatureKind::Getter;
                if self.match_token(TokenKind::LeftParen) {
                    signature.kind = SignatureKind::Method;
                    signature.arity = 1;
                    self.declare_parameter();
                    self.consume(TokenKind::RightParen, "Expect ')' after parameter name.");
                }
            }
            SignatureRule::Constructor => {
                self.consume(TokenKind::Name, "Expect constructor name after 'construct'.");
                *signature = self.signature_from_token(SignatureKind::Initializer);

                if self.match_token(TokenKind::Eq) {
                    self.error("A constructor cannot be a setter.");
                }
                if !self.match_token(TokenKind::LeftParen) {
                    self.error("A constructor cannot be a getter.");
                    return;
                }
                if self.match_token(TokenKind::RightParen) {
                    return;
                }
                self.finish_parameter_list(signature);
                self.consume(TokenKind::RightParen, "Expect ')' after parameters.");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_strings() {
        assert_eq!(Signature::new("foo", SignatureKind::Getter, 0).to_string(), "foo");
        assert_eq!(Signature::new("foo", SignatureKind::Method, 0).to_string(), "foo()");
        assert_eq!(Signature::new("foo", SignatureKind::Method, 3).to_string(), "foo(_,_,_)");
        assert_eq!(Signature::new("foo", SignatureKind::Setter, 1).to_string(), "foo=(_)");
        assert_eq!(Signature::new("", SignatureKind::Subscript, 2).to_string(), "[_,_]");
        assert_eq!(Signature::new("", SignatureKind::SubscriptSetter, 2).to_string(), "[_]=(_)");
        assert_eq!(Signature::new("new", SignatureKind::Initializer, 1).to_string(), "init new(_)");
        assert_eq!(Signature::new("+", SignatureKind::Method, 1).to_string(), "+(_)");
    }

    #[test]
    fn test_signature_rules() {
        assert_eq!(signature_rule(TokenKind::Name), Some(SignatureRule::Named));
        assert_eq!(signature_rule(TokenKind::Minus), Some(SignatureRule::Mixed));
        assert_eq!(signature_rule(TokenKind::Is), Some(SignatureRule::Infix));
        assert_eq!(signature_rule(TokenKind::Bang), Some(SignatureRule::Unary));
        assert_eq!(signature_rule(TokenKind::AmpAmp), None);
        assert_eq!(signature_rule(TokenKind::Var), None);
    }
}
