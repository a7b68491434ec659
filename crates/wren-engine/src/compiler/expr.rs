//! Expression grammar
//!
//! A Pratt parser: every token kind has an optional prefix rule, an optional
//! infix rule and a binding precedence. Operators compile to ordinary method
//! calls on their left operand, so `a + b` is `a.+(b)`.

use super::bytecode::Opcode;
use super::compiler::{is_local_name, Compiler, Variable};
use super::signature::{Signature, SignatureKind};
use crate::parser::{Literal, TokenKind};
use crate::vm::defaults::MAX_FIELDS;

/// Binding power, loosest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(super) enum Precedence {
    None,
    Lowest,
    /// `=`
    Assignment,
    /// `?:`
    Conditional,
    /// `||`
    LogicalOr,
    /// `&&`
    LogicalAnd,
    /// `== !=`
    Equality,
    /// `is`
    Is,
    /// `< > <= >=`
    Comparison,
    /// `|`
    BitwiseOr,
    /// `^`
    BitwiseXor,
    /// `&`
    BitwiseAnd,
    /// `<< >>`
    BitwiseShift,
    /// `.. ...`
    Range,
    /// `+ -`
    Term,
    /// `* / %`
    Factor,
    /// `- ! ~`
    Unary,
    /// `. () []`
    Call,
    Primary,
}

impl Precedence {
    /// The next tighter level
    fn next(self) -> Precedence {
        use Precedence::*;
        match self {
            None => Lowest,
            Lowest => Assignment,
            Assignment => Conditional,
            Conditional => LogicalOr,
            LogicalOr => LogicalAnd,
            LogicalAnd => Equality,
            Equality => Is,
            Is => Comparison,
            Comparison => BitwiseOr,
            BitwiseOr => BitwiseXor,
            BitwiseXor => BitwiseAnd,
            BitwiseAnd => BitwiseShift,
            BitwiseShift => Range,
            Range => Term,
            Term => Factor,
            Factor => Unary,
            Unary => Call,
            Call | Primary => Primary,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Prefix {
    Grouping,
    List,
    Map,
    UnaryOp,
    Boolean,
    Null,
    Super,
    This,
    Field,
    StaticField,
    Name,
    Literal,
    Interpolation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Infix {
    Subscript,
    Call,
    Operator,
    And,
    Or,
    Conditional,
}

#[derive(Debug, Clone, Copy)]
struct Rule {
    prefix: Option<Prefix>,
    infix: Option<Infix>,
    precedence: Precedence,
    /// Method name for operator tokens
    name: &'static str,
}

const UNUSED: Rule = Rule {
    prefix: None,
    infix: None,
    precedence: Precedence::None,
    name: "",
};

const fn prefix(prefix: Prefix) -> Rule {
    Rule {
        prefix: Some(prefix),
        ..UNUSED
    }
}

const fn infix_operator(precedence: Precedence, name: &'static str) -> Rule {
    Rule {
        prefix: None,
        infix: Some(Infix::Operator),
        precedence,
        name,
    }
}

const fn prefix_operator(name: &'static str) -> Rule {
    Rule {
        prefix: Some(Prefix::UnaryOp),
        infix: None,
        precedence: Precedence::None,
        name,
    }
}

fn rule(kind: TokenKind) -> Rule {
    use Precedence as P;
    use TokenKind::*;

    match kind {
        LeftParen => prefix(Prefix::Grouping),
        LeftBracket => Rule {
            prefix: Some(Prefix::List),
            infix: Some(Infix::Subscript),
            precedence: P::Call,
            name: "",
        },
        LeftBrace => prefix(Prefix::Map),
        Dot => Rule {
            infix: Some(Infix::Call),
            precedence: P::Call,
            ..UNUSED
        },
        DotDot => infix_operator(P::Range, ".."),
        DotDotDot => infix_operator(P::Range, "..."),
        Star => infix_operator(P::Factor, "*"),
        Slash => infix_operator(P::Factor, "/"),
        Percent => infix_operator(P::Factor, "%"),
        Plus => infix_operator(P::Term, "+"),
        Minus => Rule {
            prefix: Some(Prefix::UnaryOp),
            infix: Some(Infix::Operator),
            precedence: P::Term,
            name: "-",
        },
        LtLt => infix_operator(P::BitwiseShift, "<<"),
        GtGt => infix_operator(P::BitwiseShift, ">>"),
        Pipe => infix_operator(P::BitwiseOr, "|"),
        PipePipe => Rule {
            infix: Some(Infix::Or),
            precedence: P::LogicalOr,
            ..UNUSED
        },
        Caret => infix_operator(P::BitwiseXor, "^"),
        Amp => infix_operator(P::BitwiseAnd, "&"),
        AmpAmp => Rule {
            infix: Some(Infix::And),
            precedence: P::LogicalAnd,
            ..UNUSED
        },
        Bang => prefix_operator("!"),
        Tilde => prefix_operator("~"),
        Question => Rule {
            infix: Some(Infix::Conditional),
            precedence: P::Assignment,
            ..UNUSED
        },
        Lt => infix_operator(P::Comparison, "<"),
        Gt => infix_operator(P::Comparison, ">"),
        LtEq => infix_operator(P::Comparison, "<="),
        GtEq => infix_operator(P::Comparison, ">="),
        EqEq => infix_operator(P::Equality, "=="),
        BangEq => infix_operator(P::Equality, "!="),
        Is => infix_operator(P::Is, "is"),
        False | True => prefix(Prefix::Boolean),
        Null => prefix(Prefix::Null),
        Super => prefix(Prefix::Super),
        This => prefix(Prefix::This),
        Field => prefix(Prefix::Field),
        StaticField => prefix(Prefix::StaticField),
        Name => prefix(Prefix::Name),
        Number | String => prefix(Prefix::Literal),
        Interpolation => prefix(Prefix::Interpolation),
        _ => UNUSED,
    }
}

impl Compiler<'_, '_> {
    /// Compile an expression at the loosest precedence
    pub(super) fn expression(&mut self) {
        self.parse_precedence(Precedence::Lowest);
    }

    /// Compile an expression binding at least as tightly as `precedence`
    pub(super) fn parse_precedence(&mut self, precedence: Precedence) {
        self.advance();
        let Some(prefix) = rule(self.previous.kind).prefix else {
            self.error("Expected expression.");
            return;
        };

        // Only a loose enough context may contain an assignment. Each rule
        // that can be an assignment target checks this before taking `=`.
        let can_assign = precedence <= Precedence::Conditional;
        self.prefix(prefix, can_assign);

        while precedence <= rule(self.peek()).precedence {
            self.advance();
            if let Some(infix) = rule(self.previous.kind).infix {
                self.infix(infix, can_assign);
            }
        }
    }

    fn prefix(&mut self, prefix: Prefix, can_assign: bool) {
        match prefix {
            Prefix::Grouping => {
                self.expression();
                self.consume(TokenKind::RightParen, "Expect ')' after expression.");
            }
            Prefix::List => self.list(),
            Prefix::Map => self.map(),
            Prefix::UnaryOp => self.unary_op(),
            Prefix::Boolean => {
                let op = if self.previous.kind == TokenKind::True {
                    Opcode::True
                } else {
                    Opcode::False
                };
                self.emit_op(op);
            }
            Prefix::Null => {
                self.emit_op(Opcode::Null);
            }
            Prefix::Super => self.super_(can_assign),
            Prefix::This => self.this(),
            Prefix::Field => self.field(can_assign),
            Prefix::StaticField => self.static_field(can_assign),
            Prefix::Name => self.name(can_assign),
            Prefix::Literal => self.literal(),
            Prefix::Interpolation => self.interpolation(),
        }
    }

    fn infix(&mut self, infix: Infix, can_assign: bool) {
        match infix {
            Infix::Subscript => self.subscript(can_assign),
            Infix::Call => {
                self.ignore_newlines();
                self.consume(TokenKind::Name, "Expect method name after '.'.");
                self.named_call(can_assign, Opcode::Call);
            }
            Infix::Operator => self.infix_op(),
            Infix::And => {
                self.ignore_newlines();
                let jump = self.emit_jump(Opcode::And);
                self.parse_precedence(Precedence::LogicalAnd);
                self.patch_jump(jump);
            }
            Infix::Or => {
                self.ignore_newlines();
                let jump = self.emit_jump(Opcode::Or);
                self.parse_precedence(Precedence::LogicalOr);
                self.patch_jump(jump);
            }
            Infix::Conditional => self.conditional(),
        }
    }

    // ========================================================================
    // Literals
    // ========================================================================

    /// Push the number or string carried by the previous token
    fn literal(&mut self) {
        let constant = match std::mem::take(&mut self.previous.literal) {
            Literal::Num(n) => self.num_constant(n),
            Literal::Str(bytes) => self.string_constant(&bytes),
            Literal::None => return,
        };
        self.emit_constant(constant);
    }

    /// `[a, b, c]` compiles to `List.new()` plus one `addCore_` per element
    fn list(&mut self) {
        self.load_core_variable("List");
        self.call_method(0, "new()");

        loop {
            self.ignore_newlines();
            if self.peek() == TokenKind::RightBracket {
                break;
            }
            self.expression();
            self.call_method(1, "addCore_(_)");
            if !self.match_token(TokenKind::Comma) {
                break;
            }
        }

        self.ignore_newlines();
        self.consume(TokenKind::RightBracket, "Expect ']' after list elements.");
    }

    /// `{k: v}` compiles to `Map.new()` plus one `addCore_` per entry
    fn map(&mut self) {
        self.load_core_variable("Map");
        self.call_method(0, "new()");

        loop {
            self.ignore_newlines();
            if self.peek() == TokenKind::RightBrace {
                break;
            }

            self.parse_precedence(Precedence::Unary);
            self.consume(TokenKind::Colon, "Expect ':' after map key.");
            self.ignore_newlines();

            self.expression();
            self.call_method(2, "addCore_(_,_)");
            if !self.match_token(TokenKind::Comma) {
                break;
            }
        }

        self.ignore_newlines();
        self.consume(TokenKind::RightBrace, "Expect '}' after map entries.");
    }

    /// `"a %(b) c"` builds a list of the parts and joins it
    fn interpolation(&mut self) {
        self.load_core_variable("List");
        self.call_method(0, "new()");

        loop {
            // The string part before `%(`.
            self.literal();
            self.call_method(1, "addCore_(_)");

            self.ignore_newlines();
            self.expression();
            self.call_method(1, "addCore_(_)");
            self.ignore_newlines();

            if !self.match_token(TokenKind::Interpolation) {
                break;
            }
        }

        self.consume(TokenKind::String, "Expect end of string interpolation.");
        self.literal();
        self.call_method(1, "addCore_(_)");

        self.call_method(0, "join()");
    }

    // ========================================================================
    // Operators
    // ========================================================================

    fn unary_op(&mut self) {
        let name = rule(self.previous.kind).name;
        self.ignore_newlines();
        self.parse_precedence(Precedence::Unary.next());
        self.call_method(0, name);
    }

    fn infix_op(&mut self) {
        let rule = rule(self.previous.kind);

        // An operator cannot end an expression.
        self.ignore_newlines();
        self.parse_precedence(rule.precedence.next());

        let signature = Signature::new(rule.name, SignatureKind::Method, 1);
        self.call_signature(Opcode::Call, &signature);
    }

    fn conditional(&mut self) {
        self.ignore_newlines();
        let if_jump = self.emit_jump(Opcode::JumpIf);

        self.ignore_newlines();
        self.parse_precedence(Precedence::Conditional);
        self.ignore_newlines();
        self.consume(
            TokenKind::Colon,
            "Expect ':' after then branch of conditional operator.",
        );
        self.ignore_newlines();
        let else_jump = self.emit_jump(Opcode::Jump);

        self.patch_jump(if_jump);
        self.parse_precedence(Precedence::Assignment);
        self.patch_jump(else_jump);
    }

    // ========================================================================
    // Calls
    // ========================================================================

    /// Comma-separated arguments, after the opening delimiter
    fn finish_argument_list(&mut self, signature: &mut Signature) {
        loop {
            self.ignore_newlines();
            signature.arity += 1;
            self.validate_num_parameters(signature.arity);
            self.expression();
            if !self.match_token(TokenKind::Comma) {
                break;
            }
        }
        self.ignore_newlines();
    }

    /// `receiver[args]` or `receiver[args] = value`
    fn subscript(&mut self, can_assign: bool) {
        let mut signature = Signature::new("", SignatureKind::Subscript, 0);
        self.finish_argument_list(&mut signature);
        self.consume(TokenKind::RightBracket, "Expect ']' after arguments.");
        self.allow_line_before_dot();

        if can_assign && self.match_token(TokenKind::Eq) {
            signature.kind = SignatureKind::SubscriptSetter;
            signature.arity += 1;
            self.validate_num_parameters(signature.arity);
            self.expression();
        }

        self.call_signature(Opcode::Call, &signature);
    }

    /// Arguments and an optional block argument for a call to `signature`'s name
    pub(super) fn method_call(&mut self, op: Opcode, signature: &Signature) {
        let mut called = Signature::new(signature.name.clone(), SignatureKind::Getter, 0);

        if self.match_token(TokenKind::LeftParen) {
            called.kind = SignatureKind::Method;
            self.ignore_newlines();
            if self.peek() != TokenKind::RightParen {
                self.finish_argument_list(&mut called);
            }
            self.consume(TokenKind::RightParen, "Expect ')' after arguments.");
        }

        // A trailing block is one more argument: a function literal.
        if self.match_token(TokenKind::LeftBrace) {
            called.kind = SignatureKind::Method;
            called.arity += 1;

            self.push_frame(false);
            let mut parameters = Signature::new("", SignatureKind::Method, 0);
            if self.match_token(TokenKind::Pipe) {
                self.finish_parameter_list(&mut parameters);
                self.consume(TokenKind::Pipe, "Expect '|' after function parameters.");
            }
            self.frame_mut().arity = parameters.arity;

            self.finish_body();
            self.end_compiler(&format!("{} block argument", called));
        }

        if signature.kind == SignatureKind::Initializer {
            if called.kind != SignatureKind::Method {
                self.error("A superclass constructor must have an argument list.");
            }
            called.kind = SignatureKind::Initializer;
        }

        self.call_signature(op, &called);
    }

    /// Call the method named by the previous token, or assign through its setter
    pub(super) fn named_call(&mut self, can_assign: bool, op: Opcode) {
        let mut signature = self.signature_from_token(SignatureKind::Getter);

        if can_assign && self.match_token(TokenKind::Eq) {
            self.ignore_newlines();
            signature.kind = SignatureKind::Setter;
            signature.arity = 1;
            self.expression();
            self.call_signature(op, &signature);
        } else {
            self.method_call(op, &signature);
            self.allow_line_before_dot();
        }
    }

    // ========================================================================
    // Names
    // ========================================================================

    fn this(&mut self) {
        if self.enclosing_class_frame().is_none() {
            self.error("Cannot use 'this' outside of a method.");
            return;
        }
        self.load_this();
    }

    fn super_(&mut self, can_assign: bool) {
        let class_frame = self.enclosing_class_frame();
        if class_frame.is_none() {
            self.error("Cannot use 'super' outside of a method.");
        }

        self.load_this();

        if self.match_token(TokenKind::Dot) {
            self.consume(TokenKind::Name, "Expect method name after 'super.'.");
            self.named_call(can_assign, Opcode::Super);
        } else if let Some(class_frame) = class_frame {
            // Unnamed: call the superclass method with the enclosing one's name.
            let enclosing = self.frames[class_frame]
                .class
                .as_ref()
                .and_then(|class| class.signature.clone());
            if let Some(signature) = enclosing {
                self.method_call(Opcode::Super, &signature);
            }
        }
    }

    /// Load or assign a resolved variable
    fn bare_name(&mut self, can_assign: bool, variable: Variable) {
        if can_assign && self.match_token(TokenKind::Eq) {
            self.expression();
            match variable {
                Variable::Local(slot) => {
                    self.emit_byte_arg(Opcode::StoreLocal, slot as u8);
                }
                Variable::Upvalue(index) => {
                    self.emit_byte_arg(Opcode::StoreUpvalue, index as u8);
                }
                Variable::Module(symbol) => self.emit_short_arg(Opcode::StoreModuleVar, symbol),
            }
            return;
        }

        self.load_variable(variable);
        self.allow_line_before_dot();
    }

    fn name(&mut self, can_assign: bool) {
        let name = self.previous_text();
        let line = self.previous.line();

        if let Some(variable) = self.resolve_nonmodule(name) {
            self.bare_name(can_assign, variable);
            return;
        }

        // Inside a class, an unknown lowercase name is a method on `this`.
        if is_local_name(name) && self.enclosing_class_frame().is_some() {
            self.load_this();
            self.named_call(can_assign, Opcode::Call);
            return;
        }

        let symbol = match self.module_variable(name) {
            Some(symbol) => symbol,
            None => self.declare_implicit(name, line),
        };
        self.bare_name(can_assign, Variable::Module(symbol));
    }

    fn field(&mut self, can_assign: bool) {
        let name = self.previous_text();
        let class_frame = self.enclosing_class_frame();

        let mut field = MAX_FIELDS;
        let problem = match class_frame.and_then(|frame| self.frames[frame].class.as_mut()) {
            None => Some("Cannot reference a field outside of a class definition."),
            Some(class) if class.is_foreign => Some("Cannot define fields in a foreign class."),
            Some(class) if class.in_static => Some("Cannot use an instance field in a static method."),
            Some(class) => {
                field = class.fields.ensure(name);
                None
            }
        };
        if let Some(problem) = problem {
            self.error(problem);
        } else if field >= MAX_FIELDS {
            self.error(&format!("A class can only have {} fields.", MAX_FIELDS));
        }
        let field = field.min(MAX_FIELDS) as u8;

        let mut is_load = true;
        if can_assign && self.match_token(TokenKind::Eq) {
            self.expression();
            is_load = false;
        }

        // Directly inside a method the receiver is already in slot 0.
        let top = self.top();
        if class_frame.is_some() && top > 0 && class_frame == Some(top - 1) {
            let op = if is_load { Opcode::LoadFieldThis } else { Opcode::StoreFieldThis };
            self.emit_byte_arg(op, field);
        } else {
            self.load_this();
            let op = if is_load { Opcode::LoadField } else { Opcode::StoreField };
            self.emit_byte_arg(op, field);
        }

        self.allow_line_before_dot();
    }

    /// `__name`: a local of the class body, captured by the methods using it
    fn static_field(&mut self, can_assign: bool) {
        let Some(class_frame) = self.enclosing_class_frame() else {
            self.error("Cannot use a static field outside of a class definition.");
            return;
        };
        let name = self.previous_text();

        if self.resolve_local(class_frame, name).is_none() {
            let symbol = self.declare_variable(class_frame, name);
            self.emit_op_to(class_frame, Opcode::Null);
            self.define_variable(class_frame, symbol);
        }

        // Resolve again: the method reaches it as an upvalue.
        if let Some(variable) = self.resolve_nonmodule(name) {
            self.bare_name(can_assign, variable);
        }
    }
}
